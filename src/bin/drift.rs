//! Schema Drift CLI
//!
//! Runs the validation pipeline against a data export, prints the drift
//! report, and manages the version registry.
//!
//! Usage:
//!   schema-drift validate ./export --registry ./drift-registry
//!   schema-drift history --limit 5
//!   schema-drift compare v1.0.0 v2.0.0
//!
//! Exit codes: 0 no drift or non-breaking drift, 1 run failure,
//! 2 breaking changes detected.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use schema_drift::{
    diff_snapshots, DriftConfig, FieldChange, FsFileProcessor, Pipeline, Severity,
    ValidationOutcome,
};

#[derive(Parser)]
#[command(name = "schema-drift")]
#[command(about = "Detect and version schema drift in semi-structured data exports")]
struct Cli {
    /// Path to a config file (defaults to drift.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    /// Registry root, overriding the configured path
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a data export, infer schemas, and persist the next version
    Validate {
        /// Root directory of the export to scan
        source: PathBuf,
    },
    /// List persisted versions, newest first
    History {
        /// Maximum number of entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Diff two persisted versions
    Compare {
        version_a: String,
        version_b: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = DriftConfig::load_from(cli.config.as_deref())?;
    if let Some(registry) = cli.registry {
        config.registry.path = registry;
    }

    match cli.command {
        Command::Validate { source } => {
            let max_records = config.validation.max_records_per_file;
            let pipeline = Pipeline::new(config);
            let processor = FsFileProcessor::new(&source).with_max_records(max_records);

            let outcome = pipeline.validate(&processor)?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&validate_report(&outcome))?);
            } else {
                print_validate_report(&outcome);
            }

            if outcome.metadata.breaking {
                eprintln!("\n❌ BREAKING CHANGES DETECTED");
                return Ok(2);
            }
            Ok(0)
        }
        Command::History { limit } => {
            let pipeline = Pipeline::new(config);
            let history = pipeline.history(limit);

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else if history.is_empty() {
                println!("No versions recorded yet");
            } else {
                for entry in &history {
                    println!(
                        "{}  {}  {}{}",
                        entry.version,
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.change_type,
                        if entry.breaking { "  [BREAKING]" } else { "" },
                    );
                }
            }
            Ok(0)
        }
        Command::Compare {
            version_a,
            version_b,
        } => {
            let pipeline = Pipeline::new(config);
            let (a, b) = pipeline.compare(&version_a, &version_b)?;
            let changes = diff_snapshots(&b, &a);

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&changes)?);
            } else if changes.is_empty() {
                println!(
                    "✅ No structural differences between {} and {}",
                    a.metadata.version, b.metadata.version
                );
            } else {
                println!(
                    "Changes from {} to {}:\n",
                    a.metadata.version, b.metadata.version
                );
                for change in &changes {
                    print_change(change);
                }
            }

            let breaking = changes.iter().any(|c| c.severity == Severity::Breaking);
            Ok(if breaking { 2 } else { 0 })
        }
    }
}

fn validate_report(outcome: &ValidationOutcome) -> serde_json::Value {
    serde_json::json!({
        "metadata": outcome.metadata,
        "changes": outcome.changes,
        "warnings": outcome.warnings,
        "checksum": outcome.snapshot.checksum,
    })
}

fn print_validate_report(outcome: &ValidationOutcome) {
    for warning in &outcome.warnings {
        eprintln!("⚠️  {}: {}", warning.path, warning.reason);
    }

    println!(
        "📦 Version {} ({})",
        outcome.metadata.version, outcome.metadata.change_type
    );

    if outcome.changes.is_empty() {
        println!("✅ No drift detected");
        return;
    }

    let breaking = count(&outcome.changes, Severity::Breaking);
    let minor = count(&outcome.changes, Severity::Minor);
    let patch = count(&outcome.changes, Severity::Patch);

    println!(
        "📊 {} changes: {} breaking, {} minor, {} patch\n",
        outcome.changes.len(),
        breaking,
        minor,
        patch
    );
    for change in &outcome.changes {
        print_change(change);
    }
}

fn print_change(change: &FieldChange) {
    let marker = match change.severity {
        Severity::Breaking => "🔴",
        Severity::Minor => "🟡",
        Severity::Patch => "📝",
    };
    println!("{} {:?} {}", marker, change.status, change.path);
    if let Some(hint) = &change.migration_hint {
        println!("      {}", hint);
    }
}

fn count(changes: &[FieldChange], severity: Severity) -> usize {
    changes.iter().filter(|c| c.severity == severity).count()
}
