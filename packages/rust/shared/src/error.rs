//! Error types for SowTrace.
//!
//! Library crates use [`SowTraceError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SowTrace operations.
#[derive(Debug, thiserror::Error)]
pub enum SowTraceError {
    /// The knowledge base document failed validation. Fatal at startup:
    /// without a valid schema no scoring is meaningful.
    #[error("invalid knowledge base: {message}")]
    InvalidKnowledgeBase { message: String },

    /// A candidate's proposed type label matched none of the defined
    /// source types within the similarity threshold. Recovered per
    /// candidate: the candidate is surfaced unresolved, never dropped.
    #[error("unknown source type '{label}'")]
    UnknownSourceType {
        label: String,
        /// Closest defined type name, for the human reviewer.
        closest: Option<String>,
    },

    /// Committing a derived_from edge would close a cycle. Recovered
    /// per edge: the chain is left unresolved.
    #[error("chain cycle detected: {source_id} already appears in the chain of {target_id}")]
    ChainCycleDetected { source_id: String, target_id: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Malformed input document (case file, KB document, etc.).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SowTraceError>;

impl SowTraceError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create an invalid-knowledge-base error from any displayable message.
    pub fn invalid_kb(msg: impl Into<String>) -> Self {
        Self::InvalidKnowledgeBase {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
