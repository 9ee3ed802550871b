//! Deduplication: merge records that describe the same underlying
//! entity but were split into multiple candidates by the extractor.
//!
//! Ambiguity resolves toward *not* merging: a reviewer can manually
//! merge two visible sources but cannot un-merge a hidden one.

use std::sync::LazyLock;

use regex::Regex;
use sowtrace_kb::{KnowledgeBase, SourceTypeDefinition};
use sowtrace_shared::{FieldConflict, FieldValue, SourceRecord, SourceType};

/// Cross-type pairs that are dedup-eligible. Same type is always
/// eligible; anything else never merges (inheritance ↔ gift stays
/// two sources no matter how similar the parties look).
const FAMILIES: &[(SourceType, SourceType)] = &[
    (SourceType::BusinessIncome, SourceType::BusinessDividends),
    (SourceType::SaleOfAsset, SourceType::SaleOfProperty),
];

/// Whether two source types may describe the same entity.
pub fn compatible(a: SourceType, b: SourceType) -> bool {
    a == b || FAMILIES.iter().any(|(x, y)| (*x == a && *y == b) || (*x == b && *y == a))
}

// ---------------------------------------------------------------------------
// Identity normalization
// ---------------------------------------------------------------------------

/// Normalize an identifying value for comparison: case-fold,
/// whitespace-fold, strip trailing legal suffixes ("Acme Ltd" ==
/// "ACME LIMITED").
pub fn normalize_identity(value: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)[\s,.]+(ltd|limited|inc|incorporated|llc|llp|plc|gmbh|corp|corporation|co|sa|ag|pty)\.?$",
        )
        .expect("valid regex")
    });

    let lower = value.to_lowercase();
    let folded = WS_RE.replace_all(lower.trim(), " ").to_string();
    let mut stripped = folded;
    // Peel stacked suffixes ("Acme Holdings Pty Ltd").
    loop {
        let next = SUFFIX_RE.replace(&stripped, "").to_string();
        if next == stripped {
            break;
        }
        stripped = next;
    }
    stripped
}

fn comparison_form(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => normalize_identity(s),
        other => other.render(),
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Whether two records describe the same entity: every identifying
/// field present in both must agree after normalization, and at least
/// one must be comparable. Records attributed to different holders
/// never merge.
pub fn same_entity(
    a: &SourceRecord,
    def_a: &SourceTypeDefinition,
    b: &SourceRecord,
    def_b: &SourceTypeDefinition,
) -> bool {
    if !compatible(a.source_type, b.source_type) {
        return false;
    }
    if let (Some(pa), Some(pb)) = (&a.origin_party, &b.origin_party) {
        if normalize_identity(pa) != normalize_identity(pb) {
            return false;
        }
    }

    let mut comparable = 0;
    for field in &def_a.identifying_fields {
        if !def_b.identifying_fields.contains(field) {
            continue;
        }
        let (Some(va), Some(vb)) = (a.extracted_fields.get(field), b.extracted_fields.get(field))
        else {
            continue;
        };
        if comparison_form(va) != comparison_form(vb) {
            return false;
        }
        comparable += 1;
    }

    comparable > 0
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge `other` into `target` (the survivor, owning the
/// lexicographically-first source id). Field union with deterministic
/// precedence; genuine conflicts are withdrawn from the field map and
/// retained dually on the conflict list, never overwritten.
fn merge_into(target: &mut SourceRecord, other: SourceRecord) {
    let other_id = other.source_id.clone();

    for (name, value) in other.extracted_fields {
        match target.extracted_fields.get(&name) {
            None => {
                target.extracted_fields.insert(name, value);
            }
            Some(existing) if *existing == value => {}
            Some(existing) => {
                // Same identity spelled differently is not a conflict;
                // the more specific (longer) spelling wins.
                if let (FieldValue::Text(a), FieldValue::Text(b)) = (existing, &value) {
                    if normalize_identity(a) == normalize_identity(b) {
                        if b.len() > a.len() {
                            target.extracted_fields.insert(name, value);
                        }
                        continue;
                    }
                }
                if let Some(existing) = target.extracted_fields.remove(&name) {
                    target.conflicts.push(FieldConflict {
                        field_name: name,
                        values: vec![existing, value],
                    });
                }
            }
        }
    }

    match (&target.description, other.description) {
        (None, Some(d)) => target.description = Some(d),
        (Some(existing), Some(d)) if !existing.contains(&d) => {
            target.description = Some(format!("{existing}; {d}"));
        }
        _ => {}
    }
    if target.origin_party.is_none() {
        target.origin_party = other.origin_party;
    }

    target.conflicts.extend(other.conflicts);
    target.provenance.extend(other.provenance);
    target
        .provenance
        .push(format!("merged {other_id} into {}", target.source_id));
}

/// Deduplicate a record list to fixpoint. Idempotent: a second pass
/// over the output finds nothing further to merge.
pub fn dedup(mut records: Vec<SourceRecord>, kb: &KnowledgeBase) -> Vec<SourceRecord> {
    loop {
        let mut merge_pair: Option<(usize, usize)> = None;

        'outer: for i in 0..records.len() {
            for j in (i + 1)..records.len() {
                let def_i = kb.definition(records[i].source_type);
                let def_j = kb.definition(records[j].source_type);
                if same_entity(&records[i], def_i, &records[j], def_j) {
                    merge_pair = Some((i, j));
                    break 'outer;
                }
            }
        }

        let Some((i, j)) = merge_pair else {
            break;
        };

        // Survivor keeps the lexicographically-first source id and the
        // earlier list position.
        let absorbed = records.remove(j);
        if absorbed.source_id < records[i].source_id {
            let displaced = std::mem::replace(&mut records[i], absorbed);
            tracing::info!(
                kept = %records[i].source_id,
                absorbed = %displaced.source_id,
                "merged duplicate source records"
            );
            merge_into(&mut records[i], displaced);
        } else {
            tracing::info!(
                kept = %records[i].source_id,
                absorbed = %absorbed.source_id,
                "merged duplicate source records"
            );
            merge_into(&mut records[i], absorbed);
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use sowtrace_kb::builtin_kb;
    use sowtrace_shared::SourceId;

    fn record(source_type: SourceType, n: u32, fields: &[(&str, FieldValue)]) -> SourceRecord {
        let mut r = SourceRecord::skeleton(SourceId::new(source_type, n), source_type);
        for (name, value) in fields {
            r.extracted_fields.insert((*name).into(), value.clone());
        }
        r
    }

    #[test]
    fn identity_normalization_strips_legal_suffixes() {
        assert_eq!(normalize_identity("Acme Ltd"), "acme");
        assert_eq!(normalize_identity("ACME  LIMITED"), "acme");
        assert_eq!(normalize_identity("Acme Holdings Pty Ltd"), "acme holdings");
        assert_ne!(normalize_identity("Acme Ltd"), normalize_identity("Apex Ltd"));
    }

    #[test]
    fn compatibility_table_is_conservative() {
        assert!(compatible(SourceType::BusinessIncome, SourceType::BusinessDividends));
        assert!(compatible(SourceType::Gift, SourceType::Gift));
        assert!(!compatible(SourceType::Inheritance, SourceType::Gift));
        assert!(!compatible(SourceType::EmploymentIncome, SourceType::BusinessIncome));
    }

    #[test]
    fn business_income_and_dividends_merge_with_both_amounts() {
        let kb = builtin_kb();
        let records = vec![
            record(
                SourceType::BusinessIncome,
                1,
                &[
                    ("business_name", FieldValue::Text("Acme Ltd".into())),
                    ("annual_income", FieldValue::Number(50000.0)),
                ],
            ),
            record(
                SourceType::BusinessDividends,
                1,
                &[
                    ("business_name", FieldValue::Text("ACME LIMITED".into())),
                    ("dividend_amount", FieldValue::Number(12000.0)),
                ],
            ),
        ];

        let out = dedup(records, kb);
        assert_eq!(out.len(), 1);
        let merged = &out[0];
        // BIZ-1 < DIV-1 lexicographically.
        assert_eq!(merged.source_id.as_str(), "BIZ-1");
        assert_eq!(
            merged.extracted_fields.get("annual_income"),
            Some(&FieldValue::Number(50000.0))
        );
        assert_eq!(
            merged.extracted_fields.get("dividend_amount"),
            Some(&FieldValue::Number(12000.0))
        );
        assert!(merged.provenance.iter().any(|p| p.contains("DIV-1")));
    }

    #[test]
    fn no_comparable_identifying_field_means_no_merge() {
        let kb = builtin_kb();
        let records = vec![
            record(SourceType::BusinessIncome, 1, &[("annual_income", FieldValue::Number(1.0))]),
            record(SourceType::BusinessDividends, 1, &[("dividend_amount", FieldValue::Number(2.0))]),
        ];
        assert_eq!(dedup(records, kb).len(), 2);
    }

    #[test]
    fn disagreeing_identity_means_no_merge() {
        let kb = builtin_kb();
        let records = vec![
            record(
                SourceType::EmploymentIncome,
                1,
                &[("employer_name", FieldValue::Text("Initech".into()))],
            ),
            record(
                SourceType::EmploymentIncome,
                2,
                &[("employer_name", FieldValue::Text("Initrode".into()))],
            ),
        ];
        assert_eq!(dedup(records, kb).len(), 2);
    }

    #[test]
    fn conflicting_values_are_retained_dually_not_overwritten() {
        let kb = builtin_kb();
        let records = vec![
            record(
                SourceType::BusinessIncome,
                1,
                &[
                    ("business_name", FieldValue::Text("Acme Ltd".into())),
                    ("ownership_percentage", FieldValue::Number(100.0)),
                ],
            ),
            record(
                SourceType::BusinessIncome,
                2,
                &[
                    ("business_name", FieldValue::Text("Acme Ltd".into())),
                    ("ownership_percentage", FieldValue::Number(50.0)),
                ],
            ),
        ];
        let out = dedup(records, kb);
        assert_eq!(out.len(), 1);
        let merged = &out[0];
        assert!(!merged.extracted_fields.contains_key("ownership_percentage"));
        assert_eq!(merged.conflicts.len(), 1);
        assert_eq!(merged.conflicts[0].field_name, "ownership_percentage");
        assert_eq!(merged.conflicts[0].values.len(), 2);
    }

    #[test]
    fn different_holders_never_merge() {
        let kb = builtin_kb();
        let mut a = record(
            SourceType::BusinessIncome,
            1,
            &[("business_name", FieldValue::Text("Acme Ltd".into()))],
        );
        a.origin_party = Some("Jane Doe".into());
        let mut b = record(
            SourceType::BusinessDividends,
            1,
            &[("business_name", FieldValue::Text("Acme Ltd".into()))],
        );
        b.origin_party = Some("John Doe".into());
        assert_eq!(dedup(vec![a, b], kb).len(), 2);
    }

    #[test]
    fn dedup_is_idempotent() {
        let kb = builtin_kb();
        let records = vec![
            record(
                SourceType::BusinessIncome,
                1,
                &[("business_name", FieldValue::Text("Acme Ltd".into()))],
            ),
            record(
                SourceType::BusinessDividends,
                1,
                &[("business_name", FieldValue::Text("Acme Limited".into()))],
            ),
            record(
                SourceType::EmploymentIncome,
                1,
                &[("employer_name", FieldValue::Text("Initech".into()))],
            ),
        ];
        let once = dedup(records, kb);
        let twice = dedup(once.clone(), kb);
        assert_eq!(once.len(), twice.len());
        assert_eq!(
            once.iter().map(|r| r.source_id.clone()).collect::<Vec<_>>(),
            twice.iter().map(|r| r.source_id.clone()).collect::<Vec<_>>()
        );
    }
}
