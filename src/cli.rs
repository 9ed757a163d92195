//! Command-line interface for reclens

use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reclens")]
#[command(about = "Reconcile two tabular datasets and report row- and field-level agreement")]
#[command(version)]
pub struct Cli {
    /// Path to the JSON run configuration
    #[arg(short, long, env = "RECLENS_CONFIG")]
    pub config: PathBuf,

    /// Name for this comparison run (defaults to compare_<today>)
    #[arg(short = 'n', long, env = "RECLENS_RUN_NAME")]
    pub run_name: Option<String>,

    /// Directory for output files
    #[arg(short, long, env = "RECLENS_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Continue processing remaining entities when one fails
    #[arg(
        long,
        env = "RECLENS_CONTINUE_ON_ERROR",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub continue_on_error: bool,

    /// Export results to a SQLite database
    #[arg(
        long,
        env = "RECLENS_EXPORT_SQLITE",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub export_sqlite: bool,

    /// Export results to a compressed CSV archive
    #[arg(
        long,
        env = "RECLENS_EXPORT_CSV",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub export_csv: bool,

    /// Export only rows that failed to fully match
    #[arg(
        long,
        env = "RECLENS_EXPORT_MISMATCHES_ONLY",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub export_mismatches_only: bool,

    /// Row sampling threshold for SQLite export (0 disables sampling)
    #[arg(
        long,
        env = "RECLENS_EXPORT_SAMPLING_THRESHOLD",
        default_value_t = crate::DEFAULT_SAMPLE_THRESHOLD
    )]
    pub export_sampling_threshold: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Run name from the flag, or a dated default
    pub fn effective_run_name(&self) -> String {
        self.run_name
            .clone()
            .unwrap_or_else(|| format!("compare_{}", chrono::Local::now().format("%Y-%m-%d")))
    }
}
