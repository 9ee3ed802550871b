//! End-to-end structuring run: candidates → normalize → dedup → chain
//! → score → summary → questions → report.
//!
//! The run is pure and synchronous. No candidate-level failure aborts
//! it: an unresolvable type label surfaces the candidate on
//! [`RunOutcome::unresolved`] and the rest of the run proceeds.

use sowtrace_kb::KnowledgeBase;
use sowtrace_shared::{CaseMetadata, EngineConfig, RawCandidate, SourceRecord, SowTraceError};
use tracing::{info, instrument, warn};

use crate::normalize::{IdAllocator, normalize_candidate};
use crate::report::{StructuredReport, assemble};
use crate::{chain, dedup, questions, score, summary};

/// A candidate whose proposed type label could not be resolved.
/// Surfaced for human review instead of being dropped or given a
/// fabricated type.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UnresolvedCandidate {
    pub proposed_type: String,
    /// Closest defined type name, when the fuzzy fallback had one.
    pub closest: Option<String>,
    pub description: Option<String>,
}

/// Everything one run produces: the contract report plus the
/// engine-internal record list and the unresolved candidates.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: StructuredReport,
    pub records: Vec<SourceRecord>,
    pub unresolved: Vec<UnresolvedCandidate>,
}

/// Run the full structuring pipeline over one narrative's candidates.
#[instrument(skip_all, fields(case_id = %metadata.case_id, candidates = candidates.len()))]
pub fn run(
    candidates: &[RawCandidate],
    metadata: &CaseMetadata,
    kb: &KnowledgeBase,
    config: &EngineConfig,
) -> RunOutcome {
    let run_id = uuid::Uuid::now_v7();
    info!(%run_id, "starting structuring run");

    // --- Stage 1: normalize ---
    let mut ids = IdAllocator::new();
    let mut records = Vec::with_capacity(candidates.len());
    let mut unresolved = Vec::new();
    for candidate in candidates {
        match normalize_candidate(candidate, kb, config.type_similarity_threshold, &mut ids) {
            Ok(record) => records.push(record),
            Err(SowTraceError::UnknownSourceType { label, closest }) => {
                warn!(%label, ?closest, "candidate type label unresolved, surfacing for review");
                unresolved.push(UnresolvedCandidate {
                    proposed_type: label,
                    closest,
                    description: candidate.description.clone(),
                });
            }
            Err(other) => {
                // Normalization has no other failure mode today; keep
                // the run alive regardless.
                warn!(error = %other, "unexpected normalization failure, skipping candidate");
            }
        }
    }
    info!(records = records.len(), unresolved = unresolved.len(), "normalized candidates");

    // --- Stage 2: dedup ---
    let before = records.len();
    let mut records = dedup::dedup(records, kb);
    if records.len() < before {
        info!(merged = before - records.len(), "deduplicated source records");
    }

    // --- Stage 3: chain resolution ---
    chain::resolve_chains(&mut records, kb);

    // --- Stage 4: completeness scoring ---
    score::score_records(&mut records, kb);

    // --- Stage 5: summary ---
    let summary = summary::summarize(&records);
    info!(
        total = summary.total_sources_identified,
        overall_score = summary.overall_completeness_score,
        "scored run"
    );

    // --- Stages 6–7: questions and report assembly ---
    let questions = questions::generate_questions(&records, &unresolved, kb);
    let report = assemble(metadata, &records, summary, questions);

    RunOutcome {
        report,
        records,
        unresolved,
    }
}
