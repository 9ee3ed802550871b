//! Completeness scoring: missing-field classification and the 0–1
//! per-source score.
//!
//! The score is a pure function of the extracted fields, the missing
//! fields, and the knowledge base — never of narrative text. An
//! inapplicable field is excluded from both numerator and denominator;
//! it is reported with reason `not_applicable` but never penalizes the
//! score and never generates a question.

use sowtrace_kb::{KnowledgeBase, SourceTypeDefinition};
use sowtrace_shared::{FieldValue, MissingField, MissingReason, SourceRecord};

/// Score every record in place.
pub fn score_records(records: &mut [SourceRecord], kb: &KnowledgeBase) {
    for record in records {
        let def = kb.definition(record.source_type);
        score_record(record, def);
    }
}

/// Classify missing fields and compute the completeness score for one
/// record.
pub fn score_record(record: &mut SourceRecord, def: &SourceTypeDefinition) {
    record.missing_fields.clear();

    // An unresolved chain makes the link field itself count as not
    // stated, whatever text the extractor captured for it: a phrase
    // like "his business" is not a resolved originating source.
    let unresolved_link = def
        .chain
        .as_ref()
        .filter(|_| record.chain_unresolved())
        .map(|c| c.link_field.clone());
    if let Some(link_field) = &unresolved_link {
        if let Some(stated) = record.extracted_fields.remove(link_field) {
            record.provenance.push(format!(
                "unverified originating source statement for '{link_field}': {}",
                stated.render()
            ));
        }
    }

    let mut applicable_required = 0usize;
    let mut applicable_present = 0usize;

    for spec in &def.required {
        if !is_applicable(record, def, &spec.name) {
            // Excluded from the score entirely; surfaced for the
            // reviewer unless a value was extracted anyway.
            if !record.extracted_fields.contains_key(&spec.name) {
                record.missing_fields.push(MissingField {
                    field_name: spec.name.clone(),
                    reason: MissingReason::NotApplicable,
                });
            }
            continue;
        }

        applicable_required += 1;
        if record.extracted_fields.contains_key(&spec.name) {
            applicable_present += 1;
        } else {
            record.missing_fields.push(MissingField {
                field_name: spec.name.clone(),
                reason: MissingReason::NotStated,
            });
        }
    }

    // Optional fields never affect the score; absent ones are only
    // informative.
    for spec in &def.optional {
        if !record.extracted_fields.contains_key(&spec.name) {
            tracing::debug!(
                source_id = %record.source_id,
                field = %spec.name,
                "optional field not captured"
            );
        }
    }

    record.completeness_score = if applicable_required == 0 {
        1.0
    } else {
        applicable_present as f64 / applicable_required as f64
    };
}

/// Evaluate a field's applicability predicates against the record's
/// known context. A field is inapplicable when any rule's condition
/// holds.
fn is_applicable(record: &SourceRecord, def: &SourceTypeDefinition, field: &str) -> bool {
    !def.rules_for(field).any(|rule| {
        record
            .extracted_fields
            .get(&rule.when_field)
            .map(FieldValue::render)
            .is_some_and(|v| v.eq_ignore_ascii_case(&rule.equals))
    })
}
