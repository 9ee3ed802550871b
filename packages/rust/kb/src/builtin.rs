//! Built-in default knowledge base.
//!
//! The default document covering all 11 source types ships embedded in
//! the crate and is used whenever no override path is configured. It
//! goes through the same parse + validation path as an external
//! document.

use std::sync::LazyLock;

use crate::document::parse_kb_document;
use crate::schema::KnowledgeBase;

/// Embedded default KB document.
const DEFAULT_KB_JSON: &str = include_str!("../assets/default_kb.json");

static BUILTIN: LazyLock<KnowledgeBase> = LazyLock::new(|| {
    parse_kb_document(DEFAULT_KB_JSON).expect("embedded default KB document is valid")
});

/// The built-in knowledge base, parsed and validated once per process.
pub fn builtin_kb() -> &'static KnowledgeBase {
    &BUILTIN
}
