//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use sowtrace_engine::RunOutcome;
use sowtrace_kb::{KnowledgeBase, builtin_kb, load_kb_from_path};
use sowtrace_shared::{
    AppConfig, CaseMetadata, EngineConfig, RawCandidate, expand_tilde, init_config, load_config,
};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SowTrace — structure source-of-wealth narratives for review.
#[derive(Parser)]
#[command(
    name = "sowtrace",
    version,
    about = "Turn extracted source-of-wealth candidates into auditable structured reports.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Structure one case file (metadata + extracted candidates).
    Run {
        /// Path to the case JSON file.
        input: PathBuf,

        /// Write the report here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Knowledge base document overriding the built-in one.
        #[arg(long)]
        kb: Option<PathBuf>,

        /// Pretty-print the report JSON.
        #[arg(long)]
        pretty: bool,
    },

    /// Structure every case file in a directory, in parallel.
    Batch {
        /// Directory containing case JSON files.
        dir: PathBuf,

        /// Output directory for reports (defaults to the configured
        /// output_dir, then the input dir).
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Parallel jobs (defaults to the configured value).
        #[arg(short, long)]
        jobs: Option<u32>,

        /// Knowledge base document overriding the built-in one.
        #[arg(long)]
        kb: Option<PathBuf>,
    },

    /// Knowledge base management.
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Knowledge base subcommands.
#[derive(Subcommand)]
pub(crate) enum KbAction {
    /// Validate a knowledge base document (or the built-in one).
    Validate {
        /// Path to the KB document; omit to validate the built-in KB.
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print a summary of the resolved knowledge base.
    Show,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sowtrace=info",
        1 => "sowtrace=debug",
        _ => "sowtrace=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            input,
            out,
            kb,
            pretty,
        } => cmd_run(&input, out.as_deref(), kb.as_deref(), pretty).await,
        Command::Batch {
            dir,
            out_dir,
            jobs,
            kb,
        } => cmd_batch(&dir, out_dir.as_deref(), jobs, kb.as_deref()).await,
        Command::Kb { action } => match action {
            KbAction::Validate { path } => cmd_kb_validate(path.as_deref()),
            KbAction::Show => cmd_kb_show(),
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Case files
// ---------------------------------------------------------------------------

/// On-disk case file: the report metadata plus the upstream
/// extractor's candidate list.
#[derive(Debug, Deserialize)]
struct CaseFile {
    #[serde(flatten)]
    metadata: CaseMetadata,
    #[serde(default)]
    candidates: Vec<RawCandidate>,
}

fn read_case_file(path: &Path) -> Result<CaseFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| eyre!("cannot read case file '{}': {e}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| eyre!("malformed case file '{}': {e}", path.display()))
}

/// Resolve the knowledge base: explicit CLI path, then config
/// override, then the built-in definitions.
fn resolve_kb(config: &AppConfig, cli_path: Option<&Path>) -> Result<KnowledgeBase> {
    if let Some(path) = cli_path {
        return Ok(load_kb_from_path(path)?);
    }
    if let Some(path) = &config.defaults.kb_path {
        return Ok(load_kb_from_path(Path::new(path))?);
    }
    Ok(builtin_kb().clone())
}

fn report_unresolved(outcome: &RunOutcome) {
    for candidate in &outcome.unresolved {
        match &candidate.closest {
            Some(closest) => warn!(
                label = %candidate.proposed_type,
                %closest,
                "candidate type could not be resolved; flagged for review"
            ),
            None => warn!(
                label = %candidate.proposed_type,
                "candidate type could not be resolved; flagged for review"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    input: &Path,
    out: Option<&Path>,
    kb_path: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    let config = load_config()?;
    let kb = resolve_kb(&config, kb_path)?;
    let engine_config = EngineConfig::from(&config);

    let case = read_case_file(input)?;
    info!(
        case_id = %case.metadata.case_id,
        candidates = case.candidates.len(),
        "structuring case"
    );

    let outcome = sowtrace_engine::run(&case.candidates, &case.metadata, &kb, &engine_config);
    report_unresolved(&outcome);

    let json = if pretty {
        serde_json::to_string_pretty(&outcome.report)?
    } else {
        serde_json::to_string(&outcome.report)?
    };

    match out {
        Some(path) => {
            std::fs::write(path, &json)
                .map_err(|e| eyre!("cannot write report '{}': {e}", path.display()))?;
            println!();
            println!("  Report written to {}", path.display());
            println!(
                "  Sources: {} ({} fully complete)",
                outcome.report.summary.total_sources_identified,
                outcome.report.summary.fully_complete_sources
            );
            println!(
                "  Overall completeness: {:.2}",
                outcome.report.summary.overall_completeness_score
            );
            if !outcome.unresolved.is_empty() {
                println!(
                    "  Unresolved candidates: {} (see log)",
                    outcome.unresolved.len()
                );
            }
            println!();
        }
        None => println!("{json}"),
    }

    Ok(())
}

async fn cmd_batch(
    dir: &Path,
    out_dir: Option<&Path>,
    jobs: Option<u32>,
    kb_path: Option<&Path>,
) -> Result<()> {
    let config = load_config()?;
    let kb = Arc::new(resolve_kb(&config, kb_path)?);
    let engine_config = EngineConfig::from(&config);
    let jobs = jobs.unwrap_or(config.defaults.batch_jobs).max(1) as usize;

    let out_dir = match out_dir {
        Some(p) => p.to_path_buf(),
        None => match &config.defaults.output_dir {
            Some(configured) => expand_tilde(configured),
            None => dir.to_path_buf(),
        },
    };
    std::fs::create_dir_all(&out_dir)
        .map_err(|e| eyre!("cannot create output directory '{}': {e}", out_dir.display()))?;

    let mut inputs: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| eyre!("cannot read directory '{}': {e}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "json")
                && !p
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().ends_with(".report.json"))
        })
        .collect();
    inputs.sort();

    if inputs.is_empty() {
        return Err(eyre!("no case files found in '{}'", dir.display()));
    }

    info!(cases = inputs.len(), jobs, "starting batch run");
    let bar = ProgressBar::new(inputs.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .expect("valid template"),
    );

    // Runs are independent: no shared mutable state beyond the
    // read-only knowledge base.
    let semaphore = Arc::new(tokio::sync::Semaphore::new(jobs));
    let mut handles = Vec::with_capacity(inputs.len());
    for input in inputs {
        let kb = Arc::clone(&kb);
        let engine_config = engine_config.clone();
        let out_path = out_dir.join(report_file_name(&input));
        let permit = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = permit.acquire_owned().await.expect("semaphore open");
            tokio::task::spawn_blocking(move || -> Result<(PathBuf, usize)> {
                let case = read_case_file(&input)?;
                let outcome =
                    sowtrace_engine::run(&case.candidates, &case.metadata, &kb, &engine_config);
                report_unresolved(&outcome);
                let json = serde_json::to_string_pretty(&outcome.report)?;
                std::fs::write(&out_path, json)
                    .map_err(|e| eyre!("cannot write report '{}': {e}", out_path.display()))?;
                Ok((input, outcome.unresolved.len()))
            })
            .await
            .map_err(|e| eyre!("batch worker panicked: {e}"))?
        }));
    }

    let mut failures = 0usize;
    for handle in handles {
        match handle.await.map_err(|e| eyre!("join error: {e}"))? {
            Ok((input, unresolved)) => {
                bar.set_message(input.display().to_string());
                if unresolved > 0 {
                    warn!(case = %input.display(), unresolved, "case finished with unresolved candidates");
                }
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, "case failed");
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!();
    println!("  Batch complete ({failures} failures)");
    println!("  Reports in {}", out_dir.display());
    println!();

    if failures > 0 {
        return Err(eyre!("{failures} case(s) failed"));
    }
    Ok(())
}

fn report_file_name(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "case".to_string());
    PathBuf::from(format!("{stem}.report.json"))
}

fn cmd_kb_validate(path: Option<&Path>) -> Result<()> {
    let kb = match path {
        Some(p) => load_kb_from_path(p)?,
        None => builtin_kb().clone(),
    };
    println!("knowledge base is valid ({} source types)", kb.definitions().count());
    Ok(())
}

fn cmd_kb_show() -> Result<()> {
    let config = load_config()?;
    let kb = resolve_kb(&config, None)?;
    for def in kb.definitions() {
        println!(
            "{:<20} required: {:<2} optional: {:<2} rules: {:<2} chain: {}",
            def.source_type.name(),
            def.required.len(),
            def.optional.len(),
            def.applicability.len(),
            def.chain
                .as_ref()
                .map(|c| c.link_field.as_str())
                .unwrap_or("-"),
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("created {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn case_file_parses_metadata_and_candidates() {
        let raw = json!({
            "case_id": "CASE-7",
            "account_holder": {"name": "Jane Doe", "type": "individual"},
            "total_stated_net_worth": 2000000.0,
            "currency": "GBP",
            "candidates": [
                {"proposed_type": "gift", "fields": {"donor_name": "John Smith"}}
            ]
        })
        .to_string();

        let case: CaseFile = serde_json::from_str(&raw).expect("parse case file");
        assert_eq!(case.metadata.case_id, "CASE-7");
        assert_eq!(case.candidates.len(), 1);
        assert_eq!(case.candidates[0].proposed_type, "gift");
    }

    #[test]
    fn report_file_name_appends_suffix() {
        assert_eq!(
            report_file_name(Path::new("/tmp/cases/jane.json")),
            PathBuf::from("jane.report.json")
        );
    }

    #[test]
    fn end_to_end_case_file_run() {
        let raw = json!({
            "case_id": "CASE-8",
            "account_holder": {"name": "Jane Doe", "type": "individual"},
            "candidates": [
                {"proposed_type": "salary",
                 "fields": {"employer_name": "Initech", "occupation": "engineer",
                            "annual_income": "£85,000", "employment_start_year": 2012}}
            ]
        })
        .to_string();
        let case: CaseFile = serde_json::from_str(&raw).unwrap();
        let outcome = sowtrace_engine::run(
            &case.candidates,
            &case.metadata,
            builtin_kb(),
            &EngineConfig::default(),
        );
        assert_eq!(outcome.report.summary.fully_complete_sources, 1);
        assert_eq!(outcome.report.sources_of_wealth[0].source_id, "EMP-1");
    }
}
