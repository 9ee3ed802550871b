//! Candidate normalization: raw extractor output → typed record
//! skeletons.
//!
//! Upstream text extraction is inherently noisy, so coercion never
//! raises: a value that fails to coerce is simply absent and gets
//! classified later by the scorer. Only an unresolvable type label is
//! an error, and that error is recovered further up by surfacing the
//! candidate unresolved.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::Value;
use sowtrace_kb::{FieldType, KnowledgeBase, resolve_type_label};
use sowtrace_shared::{FieldValue, RawCandidate, Result, SourceId, SourceRecord, SourceType};

// ---------------------------------------------------------------------------
// Id allocation
// ---------------------------------------------------------------------------

/// Monotonic per-run, per-type source id allocator (`EMP-1`, `EMP-2`,
/// `GFT-1`, ...).
#[derive(Debug, Default)]
pub struct IdAllocator {
    counters: BTreeMap<SourceType, u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, source_type: SourceType) -> SourceId {
        let counter = self.counters.entry(source_type).or_insert(0);
        *counter += 1;
        SourceId::new(source_type, *counter)
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize one raw candidate into a [`SourceRecord`] skeleton.
///
/// Fails only with `UnknownSourceType`; the caller surfaces such
/// candidates unresolved rather than dropping them.
pub fn normalize_candidate(
    candidate: &RawCandidate,
    kb: &KnowledgeBase,
    similarity_threshold: f64,
    ids: &mut IdAllocator,
) -> Result<SourceRecord> {
    let source_type = resolve_type_label(&candidate.proposed_type, similarity_threshold)?;
    let def = kb.definition(source_type);

    let mut record = SourceRecord::skeleton(ids.next(source_type), source_type);
    record.description = candidate.description.clone();
    record.origin_party = candidate.origin_party.clone();

    for (name, raw) in &candidate.fields {
        let Some(spec) = def.field_spec(name) else {
            tracing::debug!(
                source_id = %record.source_id,
                field = %name,
                "dropping field not declared for this source type"
            );
            continue;
        };
        match coerce(raw, &spec.field_type) {
            Some(value) => {
                record.extracted_fields.insert(name.clone(), value);
            }
            None => {
                tracing::debug!(
                    source_id = %record.source_id,
                    field = %name,
                    raw = %raw,
                    "field value failed coercion, treating as absent"
                );
            }
        }
    }

    Ok(record)
}

/// Coerce a raw JSON value to a declared field type. `None` means the
/// value does not fit and the field is treated as absent.
pub fn coerce(raw: &Value, field_type: &FieldType) -> Option<FieldValue> {
    match field_type {
        FieldType::Text => match raw {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| FieldValue::Text(trimmed.to_string()))
            }
            _ => None,
        },
        FieldType::Number => coerce_number(raw).map(FieldValue::Number),
        FieldType::Date => coerce_date(raw).map(FieldValue::Date),
        FieldType::Choice { options } => match raw {
            Value::String(s) => {
                let trimmed = s.trim();
                options
                    .iter()
                    .find(|o| o.eq_ignore_ascii_case(trimmed))
                    .map(|o| FieldValue::Choice(o.clone()))
            }
            _ => None,
        },
    }
}

fn coerce_number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            // Extractors often hand back formatted amounts ("£1,200,000",
            // "USD 50 000").
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse().ok()
        }
        _ => None,
    }
}

fn coerce_date(raw: &Value) -> Option<NaiveDate> {
    let s = match raw {
        Value::String(s) => s.trim(),
        // A bare year is a legitimate extraction for older events.
        Value::Number(n) => {
            return n
                .as_i64()
                .filter(|y| (1000..=9999).contains(y))
                .and_then(|y| NaiveDate::from_ymd_opt(y as i32, 1, 1));
        }
        _ => return None,
    };

    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d %B %Y", "%B %d, %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return Some(d);
        }
    }

    // Bare year as text.
    if s.len() == 4 {
        if let Ok(y) = s.parse::<i32>() {
            return NaiveDate::from_ymd_opt(y, 1, 1);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sowtrace_kb::builtin_kb;

    const THRESHOLD: f64 = 0.72;

    fn candidate(proposed_type: &str, fields: Value) -> RawCandidate {
        RawCandidate {
            proposed_type: proposed_type.into(),
            fields: serde_json::from_value(fields).unwrap(),
            description: Some("narrative excerpt".into()),
            narrative_span: None,
            origin_party: None,
        }
    }

    #[test]
    fn assigns_type_prefixed_monotonic_ids() {
        let kb = builtin_kb();
        let mut ids = IdAllocator::new();
        let c = candidate("employment_income", json!({"employer_name": "Initech"}));
        let first = normalize_candidate(&c, kb, THRESHOLD, &mut ids).unwrap();
        let second = normalize_candidate(&c, kb, THRESHOLD, &mut ids).unwrap();
        assert_eq!(first.source_id.as_str(), "EMP-1");
        assert_eq!(second.source_id.as_str(), "EMP-2");
        assert!(first.missing_fields.is_empty());
        assert_eq!(first.completeness_score, 0.0);
    }

    #[test]
    fn drops_undeclared_fields() {
        let kb = builtin_kb();
        let mut ids = IdAllocator::new();
        let c = candidate(
            "employment_income",
            json!({"employer_name": "Initech", "favourite_colour": "green"}),
        );
        let record = normalize_candidate(&c, kb, THRESHOLD, &mut ids).unwrap();
        assert!(record.extracted_fields.contains_key("employer_name"));
        assert!(!record.extracted_fields.contains_key("favourite_colour"));
    }

    #[test]
    fn failed_coercion_means_absent_not_error() {
        let kb = builtin_kb();
        let mut ids = IdAllocator::new();
        let c = candidate(
            "employment_income",
            json!({"employer_name": "Initech", "annual_income": "undisclosed"}),
        );
        let record = normalize_candidate(&c, kb, THRESHOLD, &mut ids).unwrap();
        assert!(!record.extracted_fields.contains_key("annual_income"));
    }

    #[test]
    fn unknown_type_label_errors() {
        let kb = builtin_kb();
        let mut ids = IdAllocator::new();
        let c = candidate("crypto windfall", json!({}));
        assert!(normalize_candidate(&c, kb, THRESHOLD, &mut ids).is_err());
    }

    #[test]
    fn number_coercion_strips_formatting() {
        assert_eq!(
            coerce(&json!("£1,200,000"), &FieldType::Number),
            Some(FieldValue::Number(1200000.0))
        );
        assert_eq!(coerce(&json!(50000), &FieldType::Number), Some(FieldValue::Number(50000.0)));
        assert_eq!(coerce(&json!("n/a"), &FieldType::Number), None);
    }

    #[test]
    fn date_coercion_accepts_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2019, 6, 30).unwrap();
        for raw in [json!("2019-06-30"), json!("30/06/2019"), json!("30 June 2019")] {
            assert_eq!(coerce(&raw, &FieldType::Date), Some(FieldValue::Date(expected)));
        }
        assert_eq!(
            coerce(&json!("2019"), &FieldType::Date),
            Some(FieldValue::Date(NaiveDate::from_ymd_opt(2019, 1, 1).unwrap()))
        );
    }

    #[test]
    fn choice_coercion_is_case_insensitive() {
        let options = FieldType::Choice {
            options: vec!["completed".into(), "pending".into()],
        };
        assert_eq!(
            coerce(&json!("Pending"), &options),
            Some(FieldValue::Choice("pending".into()))
        );
        assert_eq!(coerce(&json!("abandoned"), &options), None);
    }
}
