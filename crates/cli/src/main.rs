// iconlabels CLI - merge generated icon label batches and export filtered views

mod combine;
mod exit_codes;
mod export;
mod load;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use iconlabels_recon::{Producer, ReconError, Relevance, ViewFormat};
use tracing_subscriber::EnvFilter;

use exit_codes::{recon_exit_code, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};

/// Env var holding a `tracing` filter directive, e.g. `iconlabels_recon=debug`.
const LOG_ENV: &str = "ICONLABELS_LOG";

#[derive(Parser)]
#[command(name = "iconlabels")]
#[command(about = "Reconcile icon label batches into one store and export filtered views")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline from a TOML config file
    #[command(after_help = "\
Examples:
  iconlabels run labels.recon.toml
  iconlabels run labels.recon.toml --json
  iconlabels run labels.recon.toml --output report.json
  iconlabels run labels.recon.toml --dry-run -v")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Output the run report as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON run report to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Reconcile and render, but write no view or state files
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a config and every batch it names without writing anything
    #[command(after_help = "\
Examples:
  iconlabels validate labels.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },

    /// Combine every label file in a directory into the standard outputs
    #[command(after_help = "\
Writes all_labels.csv, all_labels.json (grouped by icon) and
verified_labels.csv into the output directory.

Examples:
  iconlabels combine
  iconlabels combine --labels-dir labels --out-dir dist --icons all_icons.csv")]
    Combine {
        /// Directory of .csv / .json label batches, applied in file name order
        #[arg(long, default_value = "labels")]
        labels_dir: PathBuf,

        /// Directory the combined files are written to
        #[arg(long, default_value = "dist")]
        out_dir: PathBuf,

        /// Icon catalog CSV; unknown icon ids reject their batch
        #[arg(long)]
        icons: Option<PathBuf>,
    },

    /// Merge label files and print one filtered view
    #[command(after_help = "\
Examples:
  iconlabels export labels/*.csv
  iconlabels export labels/*.csv --verified-only --format json
  iconlabels export a.csv b.json --min-relevance medium --produced-by human
  iconlabels export labels/*.csv --verified-only --strict --output verified.csv")]
    Export {
        /// Label batch files (.csv or .json), applied in the given order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Icon catalog CSV; unknown icon ids reject their batch
        #[arg(long)]
        icons: Option<PathBuf>,

        /// Keep only verified labels
        #[arg(long)]
        verified_only: bool,

        /// Keep labels at or above this relevance (low, medium, high)
        #[arg(long)]
        min_relevance: Option<Relevance>,

        /// Keep labels from this producer (machine, human)
        #[arg(long)]
        produced_by: Option<Producer>,

        /// Output format (default: from --output extension, else csv)
        #[arg(long, short = 'f')]
        format: Option<OutputFormat>,

        /// Write to file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Fail when the selection leaves a labeled icon with no labels
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
    GroupedJson,
}

impl From<OutputFormat> for ViewFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Csv => ViewFormat::Csv,
            OutputFormat::Json => ViewFormat::Json,
            OutputFormat::GroupedJson => ViewFormat::GroupedJson,
        }
    }
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  iconlabels-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\nstore_snapshot_version: 1",
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  iconlabels-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\nstore_snapshot_version: 1",
        )
    }
}

/// Install the stderr subscriber. `ICONLABELS_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, output, dry_run } => {
            recon::cmd_run(config, json, output, dry_run)
        }
        Commands::Validate { config } => recon::cmd_validate(config),
        Commands::Combine { labels_dir, out_dir, icons } => {
            combine::cmd_combine(labels_dir, out_dir, icons)
        }
        Commands::Export {
            files,
            icons,
            verified_only,
            min_relevance,
            produced_by,
            format,
            output,
            strict,
        } => export::cmd_export(export::ExportArgs {
            files,
            icons,
            verified_only,
            min_relevance,
            produced_by,
            format: format.map(ViewFormat::from),
            output,
            strict,
        }),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::new(EXIT_RUNTIME, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let code = recon_exit_code(&err);
        let hint = match &err {
            ReconError::EmptySelection { .. } => Some(
                "relax the view's selection or set on_empty_selection = \"warn\"".to_string(),
            ),
            ReconError::DuplicateBatch(_) => {
                Some("ids must be unique across [[batches]] and labels_dir file names".to_string())
            }
            ReconError::InvalidBatch { .. } => {
                Some("set on_invalid_batch = \"skip\" to continue past bad batches".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}
