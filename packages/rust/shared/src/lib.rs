//! Shared types, error model, and configuration for SowTrace.
//!
//! This crate is the foundation depended on by all other SowTrace crates.
//! It provides:
//! - [`SowTraceError`] — the unified error type
//! - Domain types ([`SourceRecord`], [`RawCandidate`], [`SourceType`], [`SourceId`])
//! - Configuration ([`AppConfig`], [`EngineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, EngineConfig, EngineTuningConfig, config_dir, config_file_path,
    expand_tilde, init_config, load_config, load_config_from,
};
pub use error::{Result, SowTraceError};
pub use types::{
    AccountHolder, CaseMetadata, ChainLink, FieldConflict, FieldValue, HolderType, MissingField,
    MissingReason, NarrativeSpan, RawCandidate, SourceId, SourceRecord, SourceType,
};
