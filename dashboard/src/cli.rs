use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use wind_tunnel_dashboard::classify::Thresholds;
use wind_tunnel_dashboard::logs::{LogFilters, DEFAULT_PAGE_SIZE};

#[derive(Parser)]
#[command(about, long_about = None)]
pub struct CliArgs {
    /// Path to the runs file, one run per line in JSON Lines format.
    #[arg(long, env = "RUNS_PATH", default_value = "runs.jsonl")]
    pub runs: PathBuf,

    /// Path to the operation logs file in JSON Lines format.
    #[arg(long, env = "LOGS_PATH", default_value = "logs.jsonl")]
    pub logs: PathBuf,

    /// Path to a recorded live feed in JSON Lines format.
    #[arg(long, env = "FEED_PATH", default_value = "feed.jsonl")]
    pub feed: PathBuf,

    /// Highest acceptable error rate, as a ratio between 0 and 1.
    #[arg(long, default_value_t = 0.1)]
    pub error_rate_threshold: f64,

    /// Report runs whose P95 latency exceeds this many milliseconds.
    #[arg(long)]
    pub p95_threshold_ms: Option<f64>,

    /// Report runs whose P99 latency exceeds this many milliseconds.
    #[arg(long)]
    pub p99_threshold_ms: Option<f64>,

    /// Report runs whose throughput falls below this many operations per second.
    #[arg(long)]
    pub min_throughput: Option<f64>,

    /// Keep at most this many snapshots of the run in view.
    #[arg(long)]
    pub retention: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

impl CliArgs {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            max_error_rate: self.error_rate_threshold,
            max_latency_p95_ms: self.p95_threshold_ms,
            max_latency_p99_ms: self.p99_threshold_ms,
            min_throughput: self.min_throughput,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// List runs, most recent first.
    Runs,
    /// Replay the feed of a run and show its verdict, totals and stages.
    Status {
        run_id: String,
    },
    /// Show a page of operation logs for a run.
    Logs {
        run_id: String,

        #[arg(long, default_value_t = 0)]
        offset: u64,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: u64,

        #[command(flatten)]
        filters: FilterArgs,

        /// Print the page in this format instead of a table.
        #[arg(long, value_enum)]
        export: Option<ExportFormat>,
    },
    /// Compare the final metrics of two runs.
    Compare {
        run_a: String,
        run_b: String,
    },
}

#[derive(clap::Args)]
pub struct FilterArgs {
    #[arg(long)]
    pub operation: Option<String>,

    #[arg(long)]
    pub tool_name: Option<String>,

    /// Only successful (`true`) or failed (`false`) operations.
    #[arg(long)]
    pub ok: Option<bool>,

    #[arg(long)]
    pub error_type: Option<String>,

    #[arg(long)]
    pub session_id: Option<String>,

    #[arg(long)]
    pub worker_id: Option<String>,

    #[arg(long)]
    pub min_latency_ms: Option<f64>,

    #[arg(long)]
    pub max_latency_ms: Option<f64>,
}

impl From<FilterArgs> for LogFilters {
    fn from(args: FilterArgs) -> Self {
        Self {
            operation: args.operation,
            tool_name: args.tool_name,
            ok: args.ok,
            error_type: args.error_type,
            session_id: args.session_id,
            worker_id: args.worker_id,
            min_latency_ms: args.min_latency_ms,
            max_latency_ms: args.max_latency_ms,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}
