//! CLI argument definitions for EnVision.
//!
//! The CLI drives the same query layer the dashboard views use: one-shot fetches go
//! through the cache once, `watch` keeps a subscription alive and prints every state
//! change.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `resources` | List dashboard resources and their paths |
//! | `fetch` | Fetch one resource and print its data |
//! | `watch` | Subscribe to a resource and stream state changes as NDJSON |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--base-url` | `ENVISION_API_BASE_URL` | API base URL |
//! | `--timeout-ms` | `ENVISION_API_TIMEOUT_MS` | Per-request timeout in ms |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Serve built-in demo payloads instead of calling the API |
//! | `--verbose` | `false` | Debug-level logs on stderr |
//!
//! # Examples
//!
//! ```bash
//! # KPIs for the last week
//! envision fetch kpis --range 7d --pretty
//!
//! # Thirty-day LSTM forecast
//! envision fetch forecast --days 30 --model lstm
//!
//! # Poll anomalies every 5 seconds, stop after 10 updates
//! envision watch anomalies --range 24h --interval-ms 5000 --count 10
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use envision_core::{ForecastModel, ResourceKind, TimeRange};

/// EnVision - energy and carbon dashboard data client
#[derive(Debug, Parser)]
#[command(
    name = "envision",
    author,
    version,
    about = "Energy and carbon dashboard data client",
    long_about = "Fetches EnVision dashboard resources through the validated, cached \
data-access layer.\n\
\n\
Use 'envision <command> --help' for command-specific help."
)]
pub struct Cli {
    /// API base URL. Overrides ENVISION_API_BASE_URL.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds. Overrides ENVISION_API_TIMEOUT_MS.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Pretty-print JSON output (ignored by `watch`, which prints one line per update).
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Answer every request from built-in demo payloads.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Emit debug-level logs.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List dashboard resources.
    Resources,
    /// Fetch one resource.
    Fetch(FetchArgs),
    /// Watch a resource and print every state change.
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Resource name, as printed by `envision resources`.
    #[arg(value_parser = parse_resource)]
    pub resource: ResourceKind,

    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[arg(value_parser = parse_resource)]
    pub resource: ResourceKind,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Polling interval in milliseconds. Overrides ENVISION_REFRESH_INTERVAL_MS.
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Stop after this many printed updates.
    #[arg(long)]
    pub count: Option<usize>,
}

/// Request filters. Which ones apply depends on the resource.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Preset window: 24h, 7d, 30d or 90d.
    #[arg(long, value_parser = parse_range)]
    pub range: Option<TimeRange>,

    /// Window start (YYYY-MM-DD). Requires --end-date.
    #[arg(long)]
    pub start_date: Option<String>,

    /// Window end (YYYY-MM-DD). Requires --start-date.
    #[arg(long)]
    pub end_date: Option<String>,

    /// Forecast horizon in days.
    #[arg(long)]
    pub days: Option<u32>,

    /// Forecast model.
    #[arg(long, value_enum)]
    pub model: Option<ModelArg>,
}

impl FilterArgs {
    pub fn has_window(&self) -> bool {
        self.range.is_some() || self.start_date.is_some() || self.end_date.is_some()
    }

    pub fn has_forecast(&self) -> bool {
        self.days.is_some() || self.model.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelArg {
    Xgboost,
    Lstm,
}

impl From<ModelArg> for ForecastModel {
    fn from(value: ModelArg) -> Self {
        match value {
            ModelArg::Xgboost => Self::Xgboost,
            ModelArg::Lstm => Self::Lstm,
        }
    }
}

fn parse_resource(value: &str) -> Result<ResourceKind, String> {
    value.parse().map_err(|_| {
        let known: Vec<&str> = ResourceKind::ALL.iter().map(|kind| kind.name()).collect();
        format!("unknown resource '{value}' (expected one of: {})", known.join(", "))
    })
}

fn parse_range(value: &str) -> Result<TimeRange, String> {
    value
        .parse()
        .map_err(|error: envision_core::ApiError| error.to_string())
}
