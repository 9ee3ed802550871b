//! Application configuration for SowTrace.
//!
//! User config lives at `~/.sowtrace/sowtrace.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SowTraceError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sowtrace.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sowtrace";

// ---------------------------------------------------------------------------
// Config structs (matching sowtrace.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Structuring-engine tuning.
    #[serde(default)]
    pub engine: EngineTuningConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default report output directory for batch runs. Unset means
    /// reports land next to their case files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// Optional path to a knowledge base document overriding the
    /// built-in definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kb_path: Option<String>,

    /// Default parallel jobs for batch processing.
    #[serde(default = "default_batch_jobs")]
    pub batch_jobs: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            kb_path: None,
            batch_jobs: default_batch_jobs(),
        }
    }
}

fn default_batch_jobs() -> u32 {
    4
}

/// `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineTuningConfig {
    /// Minimum normalized similarity for the fuzzy type-label fallback.
    /// Below this a candidate surfaces as `UnknownSourceType`.
    #[serde(default = "default_type_similarity")]
    pub type_similarity_threshold: f64,
}

impl Default for EngineTuningConfig {
    fn default() -> Self {
        Self {
            type_similarity_threshold: default_type_similarity(),
        }
    }
}

fn default_type_similarity() -> f64 {
    0.72
}

// ---------------------------------------------------------------------------
// Runtime engine config (merged from config file + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime engine configuration handed into a structuring run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum normalized similarity for fuzzy type-label resolution.
    pub type_similarity_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            type_similarity_threshold: default_type_similarity(),
        }
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            type_similarity_threshold: config.engine.type_similarity_threshold,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sowtrace/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SowTraceError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sowtrace/sowtrace.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expand a leading `~/` in a configured path to the user's home
/// directory. Anything else passes through unchanged.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SowTraceError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SowTraceError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SowTraceError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SowTraceError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SowTraceError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("batch_jobs"));
        assert!(toml_str.contains("type_similarity_threshold"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.batch_jobs, 4);
        assert!((parsed.engine.type_similarity_threshold - 0.72).abs() < 1e-9);
    }

    #[test]
    fn engine_config_from_app_config() {
        let toml_str = r#"
[engine]
type_similarity_threshold = 0.9
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let engine = EngineConfig::from(&config);
        assert!((engine.type_similarity_threshold - 0.9).abs() < 1e-9);
    }

    #[test]
    fn output_dir_parses_and_defaults_to_none() {
        let toml_str = r#"
[defaults]
output_dir = "~/sowtrace-reports"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.output_dir.as_deref(), Some("~/sowtrace-reports"));
        assert_eq!(AppConfig::default().defaults.output_dir, None);
    }

    #[test]
    fn tilde_expansion_leaves_plain_paths_alone() {
        assert_eq!(expand_tilde("/var/reports"), PathBuf::from("/var/reports"));
        assert_eq!(expand_tilde("relative/dir"), PathBuf::from("relative/dir"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/reports"), home.join("reports"));
        }
    }

    #[test]
    fn kb_path_override_parses() {
        let toml_str = r#"
[defaults]
kb_path = "/etc/sowtrace/kb.json"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.kb_path.as_deref(), Some("/etc/sowtrace/kb.json"));
    }
}
