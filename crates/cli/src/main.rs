//! ShipSync command-line tool.
//!
//! Imports pull requests from the public mirror into the canonical
//! repository, exports canonical commits to the mirror, and generates /
//! validates configuration files.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use shipsync_core::config::{AppConfig, SAMPLE_CONFIG};
use shipsync_core::phase::{ExportSyncPhase, ImportSyncPhase, PhaseReport, Pipeline, PushPhase};
use shipsync_core::sync_config::{export_branch_name, import_branch_name, GITHUB_PR_KIND};
use shipsync_core::SyncError;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// ShipSync command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "shipsync",
    version,
    about = "Replay commits between a canonical repository and its public mirror"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "./shipsync.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides `[logging] level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import a mirror pull request into the canonical repository.
    Import {
        /// Pull request number on the mirror.
        #[arg(long)]
        pr: u64,

        /// Push the import branch to the canonical remote afterwards.
        #[arg(long)]
        push: bool,

        /// Print phase reports as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export canonical commits made since the last sync to the mirror.
    Export {
        /// Push the export branch to the mirror remote afterwards.
        #[arg(long)]
        push: bool,

        /// Print phase reports as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./shipsync.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Print the branch name a sync would create.
    BranchName {
        #[command(subcommand)]
        kind: BranchKind,
    },
}

#[derive(Subcommand, Debug)]
enum BranchKind {
    /// Branch created when importing pull request `pr`.
    Import { pr: u64 },
    /// Branch created when exporting the source branch.
    Export,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `--log-level`, else `[logging] level` from the config file, else `info`.
fn log_level(cli: &Cli) -> String {
    if let Some(level) = &cli.log_level {
        return level.clone();
    }
    AppConfig::load_from_file(&cli.config)
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "info".into())
}

fn init_logging(cli: &Cli) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level(cli)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        Commands::Import { pr, push, json } => {
            let config = load_config(&cli.config)?;
            cmd_import(&config, pr, push, json)
        }
        Commands::Export { push, json } => {
            let config = load_config(&cli.config)?;
            cmd_export(&config, push, json)
        }
        Commands::BranchName { kind } => {
            let config = load_config(&cli.config)?;
            println!("{}", branch_name(&config, &kind));
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_validate(path).context("failed to load configuration file")
}

fn branch_name(config: &AppConfig, kind: &BranchKind) -> String {
    match kind {
        BranchKind::Import { pr } => {
            import_branch_name(&config.branches.prefix, GITHUB_PR_KIND, &pr.to_string())
        }
        BranchKind::Export => export_branch_name(&config.branches.prefix, &config.source.branch),
    }
}

// ---------------------------------------------------------------------------
// Sync commands
// ---------------------------------------------------------------------------

fn cmd_import(config: &AppConfig, pr: u64, push: bool, json: bool) -> Result<()> {
    let sync = config
        .import_config(pr)
        .context("failed to prepare import")?;
    let branch = sync.branch_name();
    let push_writer = sync.writer.clone();

    let mut pipeline = Pipeline::new().with_phase(ImportSyncPhase::new(sync));
    if push {
        pipeline = pipeline.with_phase(PushPhase::new(
            push_writer,
            config.source.remote.clone(),
            branch,
        ));
    }
    debug!(phases = pipeline.len(), "running import pipeline");
    finish(pipeline.run(), json)
}

fn cmd_export(config: &AppConfig, push: bool, json: bool) -> Result<()> {
    let sync = config
        .export_config()
        .context("failed to prepare export")?;
    let branch = sync.branch_name();
    let push_writer = sync.writer.clone();

    let mut pipeline = Pipeline::new().with_phase(ExportSyncPhase::new(sync));
    if push {
        pipeline = pipeline.with_phase(PushPhase::new(
            push_writer,
            config.destination.remote.clone(),
            branch,
        ));
    }
    debug!(phases = pipeline.len(), "running export pipeline");
    finish(pipeline.run(), json)
}

/// Print the outcome of a pipeline run and turn a sync failure into the
/// command's error.
fn finish(result: Result<Vec<PhaseReport>, SyncError>, json: bool) -> Result<()> {
    match result {
        Ok(reports) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    print_report(report);
                }
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let value = serde_json::json!({
                    "error": e.to_string(),
                    "applied": e.applied(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else if !e.applied().is_empty() {
                println!(
                    "{}",
                    style::warn(&format!(
                        "{} commit(s) were applied before the failure and left in place",
                        e.applied().len()
                    ))
                );
            }
            Err(anyhow::Error::new(e).context("sync failed"))
        }
    }
}

fn print_report(report: &PhaseReport) {
    println!();
    println!("{}", style::title(&report.phase));
    println!("  State  : {}", report.state);
    if let Some(branch) = &report.branch {
        println!("  Branch : {}", branch);
    }

    if report.applied.is_empty() {
        println!("  {}", style::dim("no commits applied"));
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Source", "New", "Subject"]);
        for commit in &report.applied {
            table.add_row(vec![
                Cell::new(style::abbrev(&commit.source_id)),
                Cell::new(style::abbrev(&commit.new_id)),
                Cell::new(&commit.subject),
            ]);
        }
        println!("{}", table);
        println!(
            "{}",
            style::success(&format!("{} commit(s) applied", report.applied.len()))
        );
    }

    for id in &report.skipped_empty {
        println!("  {} {}", style::dim("skipped (empty after filtering):"), style::short_id(id));
    }
    for id in &report.skipped_unresolved {
        println!("{}", style::warn(&format!("could not resolve revision {}", id)));
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, SAMPLE_CONFIG).context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!("Default configuration written to {}", output.display()))
    );
    println!();
    println!("Next steps:");
    println!("  1. Point [source] and [destination] at local checkouts");
    println!("  2. Adjust [mapping] directories and strip_paths");
    println!(
        "  3. Validate with: shipsync validate --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  {}", style::success("TOML structure is valid"));

    if let Err(e) = config.validate() {
        println!("  {}", style::error(&format!("Validation error: {}", e)));
        anyhow::bail!("configuration validation failed");
    }
    println!("  {}", style::success("All required fields are valid"));

    for (label, path) in [
        ("source", &config.source.path),
        ("destination", &config.destination.path),
    ] {
        if !path.is_dir() {
            println!(
                "  {}",
                style::warn(&format!("{} path {} does not exist", label, path.display()))
            );
        }
    }

    println!();
    println!("{}", style::title("Configuration summary"));
    println!(
        "  Source        : {} ({} @ {})",
        config.source.path.display(),
        config.source.remote,
        config.source.branch
    );
    println!(
        "  Destination   : {} ({} @ {})",
        config.destination.path.display(),
        config.destination.remote,
        config.destination.branch
    );
    println!("  Pull refs     : {}", config.destination.pull_ref_template);
    println!("  Directories   : {}", config.mapping.directories.len());
    println!("  Strip paths   : {}", config.mapping.strip_paths.len());
    println!("  Redact rules  : {}", config.redact.len());
    println!("  Trailer       : {}", config.mapping.tracking_trailer);
    println!("  Branch prefix : {}", config.branches.prefix);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_import() {
        let cli = Cli::try_parse_from(["shipsync", "import", "--pr", "42", "--push"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("./shipsync.toml"));
        assert!(matches!(
            cli.command,
            Commands::Import { pr: 42, push: true, json: false }
        ));
    }

    #[test]
    fn test_import_requires_pr() {
        assert!(Cli::try_parse_from(["shipsync", "import"]).is_err());
    }

    #[test]
    fn test_log_level_flag_wins() {
        let cli = Cli::try_parse_from([
            "shipsync",
            "--log-level",
            "debug",
            "--config",
            "/nonexistent/shipsync.toml",
            "validate",
        ])
        .unwrap();
        assert_eq!(log_level(&cli), "debug");
    }

    #[test]
    fn test_log_level_falls_back_to_config_then_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shipsync.toml");
        std::fs::write(&path, SAMPLE_CONFIG.replace("level = \"info\"", "level = \"warn\""))
            .unwrap();

        let cli = Cli::try_parse_from(["shipsync", "--config", path.to_str().unwrap(), "validate"])
            .unwrap();
        assert_eq!(log_level(&cli), "warn");

        let cli = Cli::try_parse_from(["shipsync", "--config", "/nonexistent.toml", "validate"])
            .unwrap();
        assert_eq!(log_level(&cli), "info");
    }

    #[test]
    fn test_branch_names() {
        let config = AppConfig::from_toml_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(
            branch_name(&config, &BranchKind::Import { pr: 7 }),
            "shipsync-import-github-pr-7"
        );
        assert_eq!(branch_name(&config, &BranchKind::Export), "shipsync-export-main");
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shipsync.toml");

        cmd_init(&path).unwrap();
        let written = AppConfig::load_and_validate(&path).unwrap();
        assert_eq!(written.branches.prefix, "shipsync");

        assert!(cmd_init(&path).is_err());
    }
}
