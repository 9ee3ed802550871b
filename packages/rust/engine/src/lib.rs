//! The SowTrace structuring engine.
//!
//! A pure, single-pass, synchronous pipeline over one narrative's
//! candidate list:
//!
//! 1. [`normalize`] — raw candidates → typed [`SourceRecord`] skeletons
//! 2. [`dedup`] — merge records describing the same real-world entity
//! 3. [`chain`] — link derived sources (inheritance, gift, divorce)
//! 4. [`score`] — missing-field classification and completeness scores
//! 5. [`summary`] — document-level rollup
//! 6. [`questions`] — deterministic follow-up question list
//! 7. [`report`] — assembly of the exact output contract
//!
//! [`pipeline::run`] orchestrates the stages. The engine performs no
//! I/O and holds no shared mutable state; independent runs may execute
//! in parallel against one read-only [`sowtrace_kb::KnowledgeBase`].
//!
//! [`SourceRecord`]: sowtrace_shared::SourceRecord

pub mod chain;
pub mod dedup;
pub mod normalize;
pub mod pipeline;
pub mod questions;
pub mod report;
pub mod score;
pub mod summary;

pub use pipeline::{RunOutcome, UnresolvedCandidate, run};
pub use report::StructuredReport;
pub use summary::ReportSummary;
