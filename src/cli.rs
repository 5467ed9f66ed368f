//! CLI argument parsing for the weekly report run.
//!
//! The CLI only collects caller overrides; defaults live in `RunConfig` so the
//! same values apply to any caller that builds a config directly.
use clap::Parser;
use std::path::PathBuf;

/// Root CLI entrypoint for one pipeline run.
///
/// Long option names keep their snake_case spelling because the stage
/// executables and existing cron entries use the same names.
#[derive(Parser, Debug)]
#[command(
    name = "run-weekly",
    version,
    about = "Run the weekly report pipeline (collect, normalize, dedupe/rank, render)",
    after_help = "Stages run in order: collect_rss, normalize, dedupe_rank, render_report.\nExit status is 0 when <out_dir>/report.md exists after all stages, 1 otherwise.\n\nExamples:\n  run-weekly\n  run-weekly --topics LLM,Agent,RAG --lang en --out_dir runs/2024-01-01\n  run-weekly --stage_dir scripts --stage_ext py --interpreter python3"
)]
pub struct RunArgs {
    /// Collection time window in days
    #[arg(long = "since_days", value_name = "DAYS", allow_negative_numbers = true)]
    pub since_days: Option<i64>,

    /// Comma-separated topic filter forwarded to collection and rendering
    #[arg(long, value_name = "LIST")]
    pub topics: Option<String>,

    /// Report language code forwarded to rendering
    #[arg(long, value_name = "CODE")]
    pub lang: Option<String>,

    /// Item cap forwarded to collection and dedupe/rank
    #[arg(long = "max_items", value_name = "N", allow_negative_numbers = true)]
    pub max_items: Option<i64>,

    /// Shared output directory (default: runs/<today>)
    #[arg(long = "out_dir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Per-source item cap forwarded to collection
    #[arg(long = "max_per_source", value_name = "N", allow_negative_numbers = true)]
    pub max_per_source: Option<i64>,

    /// Directory holding the stage executables (default: next to this binary)
    #[arg(long = "stage_dir", value_name = "DIR")]
    pub stage_dir: Option<PathBuf>,

    /// Extension appended to stage executable names (e.g. py)
    #[arg(long = "stage_ext", value_name = "EXT")]
    pub stage_ext: Option<String>,

    /// Command used to launch each stage, stage path passed first (e.g. python3)
    #[arg(long, value_name = "CMD")]
    pub interpreter: Option<String>,

    /// Print a machine-readable run summary to stdout
    #[arg(long)]
    pub json: bool,

    /// Emit debug-level diagnostics
    #[arg(long)]
    pub verbose: bool,
}
