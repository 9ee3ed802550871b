//! Document-level summary: a pure reduction over the final record
//! list. No failure modes.

use serde::Serialize;
use sowtrace_shared::SourceRecord;

/// The report's `summary` block. Exact output contract shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_sources_identified: usize,
    pub fully_complete_sources: usize,
    pub sources_with_missing_fields: usize,
    pub overall_completeness_score: f64,
}

/// Compute the summary. The overall score is the arithmetic mean of
/// per-source scores, 0.0 for an empty list (never a division by
/// zero).
pub fn summarize(records: &[SourceRecord]) -> ReportSummary {
    let total = records.len();
    let fully_complete = records
        .iter()
        .filter(|r| r.completeness_score >= 1.0)
        .count();
    let with_missing = records
        .iter()
        .filter(|r| !r.missing_fields.is_empty())
        .count();
    let overall = if total == 0 {
        0.0
    } else {
        records.iter().map(|r| r.completeness_score).sum::<f64>() / total as f64
    };

    ReportSummary {
        total_sources_identified: total,
        fully_complete_sources: fully_complete,
        sources_with_missing_fields: with_missing,
        overall_completeness_score: overall,
    }
}
