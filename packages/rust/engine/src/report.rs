//! Assembly of the structured report — the exact shape consumed by the
//! export/UI layer. Field names, nesting, and the `reason` enum are a
//! hard contract; engine-internal data (chain links, conflicts,
//! provenance) stays off this surface.

use std::collections::BTreeMap;

use serde::Serialize;
use sowtrace_shared::{CaseMetadata, FieldValue, HolderType, MissingField, SourceRecord};

use crate::summary::ReportSummary;

/// Top-level structured output for one narrative.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredReport {
    pub metadata: ReportMetadata,
    pub sources_of_wealth: Vec<SourceEntry>,
    pub summary: ReportSummary,
    pub recommended_follow_up_questions: Vec<String>,
}

/// The report's `metadata` block, passed through from the caller
/// unmodified.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub case_id: String,
    pub account_holder: ReportAccountHolder,
    pub total_stated_net_worth: Option<f64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportAccountHolder {
    pub name: String,
    #[serde(rename = "type")]
    pub holder_type: HolderType,
}

/// One entry of `sources_of_wealth`.
#[derive(Debug, Clone, Serialize)]
pub struct SourceEntry {
    pub source_type: String,
    pub source_id: String,
    pub description: String,
    pub extracted_fields: BTreeMap<String, FieldValue>,
    pub missing_fields: Vec<MissingField>,
    pub completeness_score: f64,
}

/// Assemble the final report from scored records.
pub fn assemble(
    metadata: &CaseMetadata,
    records: &[SourceRecord],
    summary: ReportSummary,
    questions: Vec<String>,
) -> StructuredReport {
    let sources_of_wealth = records
        .iter()
        .map(|r| SourceEntry {
            source_type: r.source_type.name().to_string(),
            source_id: r.source_id.to_string(),
            description: r.description.clone().unwrap_or_default(),
            extracted_fields: r.extracted_fields.clone(),
            missing_fields: r.missing_fields.clone(),
            completeness_score: r.completeness_score,
        })
        .collect();

    StructuredReport {
        metadata: ReportMetadata {
            case_id: metadata.case_id.clone(),
            account_holder: ReportAccountHolder {
                name: metadata.account_holder.name.clone(),
                holder_type: metadata.account_holder.holder_type,
            },
            total_stated_net_worth: metadata.total_stated_net_worth,
            currency: metadata.currency.clone(),
        },
        sources_of_wealth,
        summary,
        recommended_follow_up_questions: questions,
    }
}
