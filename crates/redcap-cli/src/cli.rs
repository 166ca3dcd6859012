//! CLI argument definitions for the study dashboard.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "redcap-dashboard",
    version,
    about = "Study dashboard - enrollment, CONSORT, and protocol-window reports",
    long_about = "Derive study dashboard reports from a flat REDCap record export.\n\n\
                  Reconstructs per-participant visit state, classifies schedule\n\
                  positions, evaluates protocol tolerance windows, and aggregates\n\
                  enrollment, CONSORT, and demographic summaries."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow participant ids and field values in logs.
    ///
    /// Off by default: record-level values are PHI and log lines redact them.
    /// Enable only in environments cleared for identifiable data.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Derive and render dashboard reports from a record export.
    Report(ReportArgs),

    /// Print the visit schedule and protocol tolerance windows.
    Schedule,
}

#[derive(Parser)]
pub struct ReportArgs {
    /// Path to the flat REDCap JSON export (array of event rows).
    #[arg(value_name = "RECORDS_JSON")]
    pub records: PathBuf,

    /// Evaluate schedules and windows as of this date (default: today).
    #[arg(long = "as-of", value_name = "YYYY-MM-DD")]
    pub as_of: Option<NaiveDate>,

    /// Which report view to render.
    #[arg(long = "view", value_enum, default_value = "all")]
    pub view: ViewArg,

    /// Also write deviation and CONSORT drill-down CSVs into this directory.
    #[arg(long = "csv-dir", value_name = "DIR")]
    pub csv_dir: Option<PathBuf>,

    /// Emit the full derived payload as JSON instead of tables.
    #[arg(long = "json")]
    pub json: bool,

    /// Cache directory (default: alongside the export file).
    #[arg(long = "cache-dir", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Skip the cache entirely: no reads, no writes.
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// Ignore fresh cache entries and re-read the source.
    #[arg(long = "force-refresh")]
    pub force_refresh: bool,

    /// Keep participants whose id starts with "test".
    #[arg(long = "include-test-ids")]
    pub include_test_ids: bool,
}

/// Report views selectable with `--view`.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    All,
    Enrollment,
    Consort,
    Windows,
    Statuses,
    Demographics,
    Quality,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
