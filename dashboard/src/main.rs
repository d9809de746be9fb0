#[macro_use]
extern crate log;

use anyhow::Context;
use clap::Parser as _;
use wind_tunnel_dashboard::context::{Dashboard, DashboardConfig};
use wind_tunnel_dashboard::export;
use wind_tunnel_dashboard::logs::{LogRequest, QueryOutcome};
use wind_tunnel_dashboard::report;
use wind_tunnel_dashboard::source::{JsonlLogStore, JsonlRunStore, ReplayFeed};

mod cli;

const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = cli::CliArgs::parse();
    debug!("{CRATE_NAME} {CRATE_VERSION}");

    let config = DashboardConfig {
        thresholds: args.thresholds(),
        retention: args.retention,
    };

    match args.command {
        cli::Command::Runs => {
            let runs = JsonlRunStore::open(&args.runs)?;
            let dashboard = Dashboard::new(
                runs,
                JsonlLogStore::default(),
                ReplayFeed::default(),
                config,
            );
            let runs = dashboard.runs().await?;
            println!("{}", report::runs_table(&runs));
        }
        cli::Command::Status { run_id } => {
            let runs = JsonlRunStore::open(&args.runs)?;
            let feed = ReplayFeed::open(&args.feed)?;
            let mut dashboard = Dashboard::new(runs, JsonlLogStore::default(), feed, config);

            dashboard
                .select_run(&run_id)
                .await
                .with_context(|| format!("Failed to open run {run_id}"))?;
            let applied = dashboard.drain_events().await;
            debug!("Applied {applied} feed events for run {run_id}");

            let now = chrono::Utc::now().timestamp_millis();
            if let Some(verdict) = dashboard.verdict() {
                match verdict.reason {
                    Some(reason) => println!("Verdict: {:?} ({reason})", verdict.status),
                    None => println!("Verdict: {:?}", verdict.status),
                }
            }
            let totals = dashboard.totals();
            println!(
                "Operations: {} total, {} succeeded, {} failed",
                totals.total_ops, totals.success_ops, totals.failed_ops
            );
            println!("Elapsed: {:.1}s", dashboard.elapsed_ms(now) as f64 / 1000.0);
            println!("Stream: {:?}", dashboard.stream_status());

            for violation in dashboard.violations() {
                println!(
                    "Threshold violated: {} is {:.3}, limit {:.3}",
                    violation.metric, violation.actual, violation.limit
                );
            }

            let stages = dashboard.stages(now);
            if stages.is_empty() {
                println!("Stage timing unavailable");
            } else {
                println!("{}", report::stages_table(&stages));
            }
        }
        cli::Command::Logs {
            run_id,
            offset,
            limit,
            filters,
            export: format,
        } => {
            let runs = JsonlRunStore::open(&args.runs)?;
            let logs = JsonlLogStore::open(&args.logs)?;
            let dashboard = Dashboard::new(runs, logs, ReplayFeed::default(), config);

            let request = LogRequest {
                run_id,
                filters: filters.into(),
                offset,
                limit,
            };
            let outcome = dashboard.logs().query(request).await?;
            if outcome == QueryOutcome::Superseded {
                warn!("Log query was superseded");
                return Ok(());
            }

            let state = dashboard.logs().state();
            match format {
                Some(cli::ExportFormat::Csv) => print!("{}", export::to_csv(&state.logs)?),
                Some(cli::ExportFormat::Json) => println!("{}", export::to_json(&state.logs)?),
                None => {
                    let pagination = state.pagination;
                    println!("{}", report::logs_table(&state.logs));
                    println!(
                        "Showing {} of {} from offset {} (next: {}, previous: {})",
                        state.logs.len(),
                        pagination.total,
                        pagination.offset,
                        pagination.can_go_next(),
                        pagination.can_go_prev()
                    );
                }
            }
        }
        cli::Command::Compare { run_a, run_b } => {
            let runs = JsonlRunStore::open(&args.runs)?;
            let dashboard = Dashboard::new(
                runs,
                JsonlLogStore::default(),
                ReplayFeed::default(),
                config,
            );
            let rows = dashboard
                .compare(&run_a, &run_b)
                .await
                .with_context(|| format!("Failed to compare {run_a} with {run_b}"))?;
            println!("{}", report::comparison_table(&rows));
        }
    }

    Ok(())
}
