//! Plain text tables for the CLI.

use crate::compare::{ComparisonRow, Indicator};
use crate::stages::{DerivedStage, StageStatus};
use chrono::{TimeZone, Utc};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use wind_tunnel_summary_model::{OperationLog, RunInfo};

#[derive(Tabled)]
struct RunRow {
    id: String,
    scenario: String,
    state: String,
    created: String,
}

#[derive(Tabled)]
struct StageRow {
    stage: String,
    #[tabled(display = "seconds")]
    duration: u64,
    status: String,
}

#[derive(Tabled)]
struct LogRow {
    time: String,
    operation: String,
    #[tabled(display = "float2")]
    latency_ms: f64,
    ok: bool,
    error: String,
    worker: String,
}

#[derive(Tabled)]
struct ComparisonTableRow {
    metric: String,
    run_a: String,
    run_b: String,
    diff: String,
    #[tabled(display = "pct")]
    diff_pct: f64,
    #[tabled(display = "arrow")]
    indicator: Indicator,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

fn pct(n: &f64) -> String {
    format!("{:+.1}%", n)
}

fn seconds(ms: &u64) -> String {
    format!("{:.1}s", *ms as f64 / 1000.0)
}

fn arrow(indicator: &Indicator) -> String {
    match indicator {
        Indicator::Improved => "improved",
        Indicator::Regressed => "regressed",
        Indicator::Neutral => "-",
    }
    .to_string()
}

fn timestamp(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn render<T: Tabled>(rows: Vec<T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

pub fn runs_table(runs: &[RunInfo]) -> String {
    render(
        runs.iter()
            .map(|run| RunRow {
                id: run.id.clone(),
                scenario: run.scenario_id.clone(),
                state: format!("{:?}", run.state).to_lowercase(),
                created: timestamp(run.created_at),
            })
            .collect(),
    )
}

pub fn stages_table(stages: &[DerivedStage]) -> String {
    render(
        stages
            .iter()
            .map(|stage| StageRow {
                stage: stage.name.clone(),
                duration: stage.duration_ms,
                status: match stage.status {
                    StageStatus::Completed => "completed",
                    StageStatus::Running => "running",
                }
                .to_string(),
            })
            .collect(),
    )
}

pub fn logs_table(logs: &[OperationLog]) -> String {
    render(
        logs.iter()
            .map(|log| LogRow {
                time: timestamp(log.timestamp_ms),
                operation: log.operation.clone(),
                latency_ms: log.latency_ms,
                ok: log.ok,
                error: log.error_type.clone().unwrap_or_default(),
                worker: log.worker_id.clone(),
            })
            .collect(),
    )
}

pub fn comparison_table(rows: &[ComparisonRow]) -> String {
    render(
        rows.iter()
            .map(|row| ComparisonTableRow {
                metric: row.label.to_string(),
                run_a: row.display_a.clone(),
                run_b: row.display_b.clone(),
                diff: row.display_diff.clone(),
                diff_pct: row.diff_pct,
                indicator: row.indicator,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::compare;
    use wind_tunnel_summary_model::MetricSummary;

    #[test]
    fn comparison_table_shows_converted_values() {
        let a = MetricSummary {
            error_rate: 0.02,
            duration_ms: 30_000,
            ..Default::default()
        };
        let b = MetricSummary {
            error_rate: 0.01,
            duration_ms: 30_000,
            ..Default::default()
        };
        let table = comparison_table(&compare(&a, &b));

        assert!(table.contains("Error rate"));
        assert!(table.contains("2.00%"));
        assert!(table.contains("-50.0%"));
        assert!(table.contains("improved"));
        assert!(table.contains("30.0s"));
    }

    #[test]
    fn stage_table_lists_every_stage() {
        let stages = vec![
            DerivedStage {
                name: "Preflight".to_string(),
                raw_name: "preflight".to_string(),
                duration_ms: 1_500,
                status: StageStatus::Completed,
            },
            DerivedStage {
                name: "Ramp".to_string(),
                raw_name: "ramp".to_string(),
                duration_ms: 250,
                status: StageStatus::Running,
            },
        ];
        let table = stages_table(&stages);
        assert!(table.contains("Preflight"));
        assert!(table.contains("1.5s"));
        assert!(table.contains("running"));
    }

    #[test]
    fn timestamps_are_formatted_in_utc() {
        assert_eq!(timestamp(0), "1970-01-01 00:00:00.000");
    }
}
