//! Follow-up question generation.
//!
//! Deterministically derives a deduplicated, prioritized question list
//! from missing fields and unresolved chain links. Only
//! `not_stated` gaps produce questions; a `not_applicable` field never
//! does. Candidates that failed type resolution get one clarifying
//! question each so nothing silently disappears.

use sowtrace_kb::KnowledgeBase;
use sowtrace_shared::{FieldValue, MissingReason, SourceRecord, SourceType};

use crate::pipeline::UnresolvedCandidate;

// ---------------------------------------------------------------------------
// Template table
// ---------------------------------------------------------------------------

/// Question templates per (source type, field name). `{entity}` is the
/// record's best identifying value, `{party}` the originating party of
/// a chain field.
const TEMPLATES: &[(SourceType, &str, &str)] = &[
    (SourceType::EmploymentIncome, "employer_name", "Who was the client's employer for the stated employment income?"),
    (SourceType::EmploymentIncome, "occupation", "What was the client's occupation at {entity}?"),
    (SourceType::EmploymentIncome, "annual_income", "What was the client's approximate annual income from their employment at {entity}?"),
    (SourceType::EmploymentIncome, "employment_start_year", "In which year did the client's employment at {entity} begin?"),
    (SourceType::BusinessIncome, "business_name", "What is the name of the business generating the stated business income?"),
    (SourceType::BusinessIncome, "nature_of_business", "What is the nature of the business of {entity}?"),
    (SourceType::BusinessIncome, "ownership_percentage", "What percentage of {entity} does the client own?"),
    (SourceType::BusinessIncome, "annual_income", "What is the client's approximate annual income from {entity}?"),
    (SourceType::BusinessDividends, "business_name", "Which company pays the stated dividends?"),
    (SourceType::BusinessDividends, "ownership_percentage", "What percentage of {entity} does the client own?"),
    (SourceType::BusinessDividends, "dividend_amount", "What is the approximate dividend amount the client receives from {entity}?"),
    (SourceType::SaleOfBusiness, "sale_amount", "What was the sale amount for the disposal of {entity}?"),
    (SourceType::SaleOfBusiness, "sale_year", "In which year was {entity} sold?"),
    (SourceType::SaleOfBusiness, "buyer", "Who was the buyer of {entity}?"),
    (SourceType::SaleOfAsset, "buyer", "Who was the buyer of the asset ({entity})?"),
    (SourceType::SaleOfAsset, "sale_amount", "What was the sale amount for the asset ({entity})?"),
    (SourceType::SaleOfProperty, "buyer", "Who was the buyer of the property at {entity}?"),
    (SourceType::SaleOfProperty, "sale_amount", "What was the sale amount for the property at {entity}?"),
    (SourceType::SaleOfProperty, "sale_date", "When was the property at {entity} sold?"),
    (SourceType::Inheritance, "deceased_name", "From whom did the client receive the stated inheritance?"),
    (SourceType::Inheritance, "relationship", "What was the client's relationship to {party}?"),
    (SourceType::Inheritance, "amount", "What was the approximate value of the inheritance received from {party}?"),
    (SourceType::Inheritance, "year_received", "In which year was the inheritance from {party} received?"),
    (SourceType::Inheritance, "deceased_original_source", "What was the original source of wealth of {party}, from whom the inheritance was received?"),
    (SourceType::Gift, "donor_name", "Who was the donor of the stated gift?"),
    (SourceType::Gift, "relationship", "What is the client's relationship to {party}?"),
    (SourceType::Gift, "amount", "What was the approximate value of the gift received from {party}?"),
    (SourceType::Gift, "year_received", "In which year was the gift from {party} received?"),
    (SourceType::Gift, "donor_original_source", "What was the original source of wealth of {party}, the donor of the gift?"),
    (SourceType::DivorceSettlement, "former_spouse_name", "What is the name of the former spouse from whom the settlement was received?"),
    (SourceType::DivorceSettlement, "amount", "What was the approximate value of the divorce settlement?"),
    (SourceType::DivorceSettlement, "settlement_year", "In which year was the divorce settlement received?"),
    (SourceType::DivorceSettlement, "spouse_original_source", "What was the original source of wealth of {party}, the client's former spouse?"),
    (SourceType::LotteryWinnings, "amount", "What was the amount of the stated lottery winnings?"),
    (SourceType::LotteryWinnings, "win_date", "When were the lottery winnings received?"),
    (SourceType::InsurancePayout, "amount", "What was the amount of the stated insurance payout?"),
    (SourceType::InsurancePayout, "payout_date", "When was the insurance payout received?"),
    (SourceType::InsurancePayout, "policy_type", "What type of insurance policy produced the stated payout?"),
];

fn template_for(source_type: SourceType, field: &str) -> Option<&'static str> {
    TEMPLATES
        .iter()
        .find(|(t, f, _)| *t == source_type && *f == field)
        .map(|(_, _, template)| *template)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// The record's best identifying value, for question context.
fn entity_context(record: &SourceRecord, kb: &KnowledgeBase) -> Option<String> {
    let def = kb.definition(record.source_type);
    def.identifying_fields
        .iter()
        .find_map(|f| record.extracted_fields.get(f))
        .map(FieldValue::render)
}

/// The originating party named by the record's chain state.
fn party_context(record: &SourceRecord, kb: &KnowledgeBase) -> Option<String> {
    let def = kb.definition(record.source_type);
    let chain = def.chain.as_ref()?;
    if let Some(value) = record.extracted_fields.get(&chain.party_field) {
        return Some(value.render());
    }
    match &record.derived_from {
        Some(sowtrace_shared::ChainLink::ExternalUnresolved { party }) => party.clone(),
        _ => None,
    }
}

fn render_question(record: &SourceRecord, kb: &KnowledgeBase, field: &str) -> String {
    let entity = entity_context(record, kb);
    let party = party_context(record, kb);

    if let Some(template) = template_for(record.source_type, field) {
        // Templates with a placeholder fall back to generic phrasing
        // when the context they need is not available.
        let needs_entity = template.contains("{entity}");
        let needs_party = template.contains("{party}");
        if (!needs_entity || entity.is_some()) && (!needs_party || party.is_some()) {
            let mut rendered = template.to_string();
            if let Some(e) = &entity {
                rendered = rendered.replace("{entity}", e);
            }
            if let Some(p) = &party {
                rendered = rendered.replace("{party}", p);
            }
            return rendered;
        }
    }

    let label = record.source_type.label();
    match entity {
        Some(e) => format!("Please provide the {field} for the {label} source relating to {e}."),
        None => format!("Please provide the {field} for the stated {label} source."),
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate the ordered, deduplicated follow-up question list.
///
/// Priority: sources with lower completeness score first, then
/// chain-unresolved fields, then alphabetical by field name; ties
/// break by source insertion order. Unresolved candidates (unknown
/// type) append after all scored sources, in input order.
pub fn generate_questions(
    records: &[SourceRecord],
    unresolved: &[UnresolvedCandidate],
    kb: &KnowledgeBase,
) -> Vec<String> {
    struct Item {
        score: f64,
        is_chain_field: bool,
        field_name: String,
        source_index: usize,
        text: String,
    }

    let mut items = Vec::new();
    for (source_index, record) in records.iter().enumerate() {
        let def = kb.definition(record.source_type);
        let link_field = def.chain.as_ref().map(|c| c.link_field.as_str());
        for missing in &record.missing_fields {
            if missing.reason != MissingReason::NotStated {
                continue;
            }
            items.push(Item {
                score: record.completeness_score,
                is_chain_field: link_field == Some(missing.field_name.as_str()),
                field_name: missing.field_name.clone(),
                source_index,
                text: render_question(record, kb, &missing.field_name),
            });
        }
    }

    items.sort_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then_with(|| b.is_chain_field.cmp(&a.is_chain_field))
            .then_with(|| a.field_name.cmp(&b.field_name))
            .then_with(|| a.source_index.cmp(&b.source_index))
    });

    let mut seen = std::collections::HashSet::new();
    let mut questions: Vec<String> = items
        .into_iter()
        .filter(|i| seen.insert(i.text.clone()))
        .map(|i| i.text)
        .collect();

    for candidate in unresolved {
        let q = format!(
            "The narrative mentions a source of wealth described as '{}' which could not be \
             classified; please clarify its nature.",
            candidate.proposed_type
        );
        if seen.insert(q.clone()) {
            questions.push(q);
        }
    }

    questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use sowtrace_kb::builtin_kb;
    use sowtrace_shared::{ChainLink, MissingField, SourceId};

    fn record(source_type: SourceType, n: u32, score: f64) -> SourceRecord {
        let mut r = SourceRecord::skeleton(SourceId::new(source_type, n), source_type);
        r.completeness_score = score;
        r
    }

    fn missing(record: &mut SourceRecord, field: &str, reason: MissingReason) {
        record.missing_fields.push(MissingField {
            field_name: field.into(),
            reason,
        });
    }

    #[test]
    fn not_applicable_fields_never_generate_questions() {
        let kb = builtin_kb();
        let mut r = record(SourceType::SaleOfProperty, 1, 1.0);
        missing(&mut r, "buyer", MissingReason::NotApplicable);
        assert!(generate_questions(&[r], &[], kb).is_empty());
    }

    #[test]
    fn lower_scored_sources_come_first() {
        let kb = builtin_kb();
        let mut nearly_complete = record(SourceType::EmploymentIncome, 1, 0.75);
        missing(&mut nearly_complete, "annual_income", MissingReason::NotStated);
        let mut sparse = record(SourceType::LotteryWinnings, 1, 0.33);
        missing(&mut sparse, "amount", MissingReason::NotStated);

        let questions = generate_questions(&[nearly_complete, sparse], &[], kb);
        assert_eq!(questions.len(), 2);
        assert!(questions[0].contains("lottery winnings"));
    }

    #[test]
    fn chain_fields_outrank_ordinary_fields_at_equal_score() {
        let kb = builtin_kb();
        let mut gift = record(SourceType::Gift, 1, 0.5);
        gift.extracted_fields.insert(
            "donor_name".into(),
            FieldValue::Text("John Smith".into()),
        );
        gift.derived_from = Some(ChainLink::ExternalUnresolved {
            party: Some("John Smith".into()),
        });
        // "amount" sorts before "donor_original_source" alphabetically,
        // but the chain field takes priority.
        missing(&mut gift, "amount", MissingReason::NotStated);
        missing(&mut gift, "donor_original_source", MissingReason::NotStated);

        let questions = generate_questions(&[gift], &[], kb);
        assert_eq!(questions.len(), 2);
        assert!(questions[0].contains("original source of wealth of John Smith"));
    }

    #[test]
    fn duplicate_rendered_text_is_emitted_once() {
        let kb = builtin_kb();
        let mut a = record(SourceType::LotteryWinnings, 1, 0.5);
        missing(&mut a, "amount", MissingReason::NotStated);
        let mut b = record(SourceType::LotteryWinnings, 2, 0.5);
        missing(&mut b, "amount", MissingReason::NotStated);

        let questions = generate_questions(&[a, b], &[], kb);
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn unresolved_candidates_get_a_clarifying_question() {
        let kb = builtin_kb();
        let unresolved = vec![UnresolvedCandidate {
            proposed_type: "crypto windfall".into(),
            closest: None,
            description: None,
        }];
        let questions = generate_questions(&[], &unresolved, kb);
        assert_eq!(questions.len(), 1);
        assert!(questions[0].contains("crypto windfall"));
    }

    #[test]
    fn generic_phrasing_without_entity_context() {
        let kb = builtin_kb();
        let mut r = record(SourceType::EmploymentIncome, 1, 0.0);
        missing(&mut r, "occupation", MissingReason::NotStated);
        let questions = generate_questions(&[r], &[], kb);
        // The occupation template needs {entity}; with no employer
        // captured it falls back to generic phrasing.
        assert_eq!(
            questions[0],
            "Please provide the occupation for the stated employment income source."
        );
    }
}
