//! Knowledge base for SowTrace: the static schema describing, per
//! source type, required fields, optional fields, applicability
//! predicates, and field data types.
//!
//! Loaded once at process start, validated fail-fast, and never
//! mutated afterwards — safe to share by reference across parallel
//! runs.

pub mod builtin;
pub mod document;
pub mod resolve;
pub mod schema;

pub use builtin::builtin_kb;
pub use document::{load_kb_from_path, parse_kb_document};
pub use resolve::{resolve_type_label, similarity};
pub use schema::{
    ApplicabilityRule, ChainRequirement, FieldSpec, FieldType, KnowledgeBase,
    SourceTypeDefinition,
};
