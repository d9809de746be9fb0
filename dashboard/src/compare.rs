use serde::Serialize;
use wind_tunnel_summary_model::MetricSummary;

/// Changes smaller than this percentage are reported as neutral.
pub const DEAD_BAND_PCT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherBetter,
    LowerBetter,
    /// Informational only, never an improvement or a regression
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Improved,
    Regressed,
    Neutral,
}

/// How a metric's stored value is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    OpsPerSecond,
    Milliseconds,
    /// Stored as a ratio, shown as a percentage
    Ratio,
    Count,
    /// Stored in milliseconds, shown in seconds
    DurationMs,
}

impl Unit {
    pub fn format(&self, value: f64) -> String {
        match self {
            Unit::OpsPerSecond => format!("{value:.2} ops/s"),
            Unit::Milliseconds => format!("{value:.2} ms"),
            Unit::Ratio => format!("{:.2}%", value * 100.0),
            Unit::Count => format!("{value:.0}"),
            Unit::DurationMs => format!("{:.1}s", value / 1000.0),
        }
    }

    fn format_signed(&self, value: f64) -> String {
        let formatted = self.format(value);
        if value > 0.0 {
            format!("+{formatted}")
        } else {
            formatted
        }
    }
}

pub struct TrackedMetric {
    pub key: &'static str,
    pub label: &'static str,
    pub direction: Direction,
    pub unit: Unit,
    value: fn(&MetricSummary) -> f64,
}

pub const TRACKED_METRICS: [TrackedMetric; 9] = [
    TrackedMetric {
        key: "throughput",
        label: "Throughput",
        direction: Direction::HigherBetter,
        unit: Unit::OpsPerSecond,
        value: |s| s.throughput,
    },
    TrackedMetric {
        key: "latency_p50_ms",
        label: "Latency P50",
        direction: Direction::LowerBetter,
        unit: Unit::Milliseconds,
        value: |s| s.latency_p50_ms,
    },
    TrackedMetric {
        key: "latency_p95_ms",
        label: "Latency P95",
        direction: Direction::LowerBetter,
        unit: Unit::Milliseconds,
        value: |s| s.latency_p95_ms,
    },
    TrackedMetric {
        key: "latency_p99_ms",
        label: "Latency P99",
        direction: Direction::LowerBetter,
        unit: Unit::Milliseconds,
        value: |s| s.latency_p99_ms,
    },
    TrackedMetric {
        key: "error_rate",
        label: "Error rate",
        direction: Direction::LowerBetter,
        unit: Unit::Ratio,
        value: |s| s.error_rate,
    },
    TrackedMetric {
        key: "success_ops",
        label: "Successful operations",
        direction: Direction::HigherBetter,
        unit: Unit::Count,
        value: |s| s.success_ops as f64,
    },
    TrackedMetric {
        key: "failed_ops",
        label: "Failed operations",
        direction: Direction::LowerBetter,
        unit: Unit::Count,
        value: |s| s.failed_ops as f64,
    },
    TrackedMetric {
        key: "total_ops",
        label: "Total operations",
        direction: Direction::HigherBetter,
        unit: Unit::Count,
        value: |s| s.total_ops as f64,
    },
    TrackedMetric {
        key: "duration_ms",
        label: "Duration",
        direction: Direction::Neutral,
        unit: Unit::DurationMs,
        value: |s| s.duration_ms as f64,
    },
];

/// One metric of a comparison between run A and run B.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub metric: &'static str,
    pub label: &'static str,
    pub value_a: f64,
    pub value_b: f64,
    /// `value_b - value_a`, in stored units
    pub diff_abs: f64,
    pub diff_pct: f64,
    pub indicator: Indicator,
    pub display_a: String,
    pub display_b: String,
    pub display_diff: String,
}

/// Percentage change from `a` to `b`. A change from zero is reported as 100%.
pub fn diff_pct(a: f64, b: f64) -> f64 {
    if a == 0.0 {
        if b == 0.0 {
            0.0
        } else {
            100.0
        }
    } else {
        (b - a) / a * 100.0
    }
}

pub fn indicator(direction: Direction, diff_pct: f64) -> Indicator {
    if diff_pct.abs() < DEAD_BAND_PCT {
        return Indicator::Neutral;
    }
    match direction {
        Direction::HigherBetter if diff_pct > 0.0 => Indicator::Improved,
        Direction::LowerBetter if diff_pct < 0.0 => Indicator::Improved,
        Direction::HigherBetter | Direction::LowerBetter => Indicator::Regressed,
        Direction::Neutral => Indicator::Neutral,
    }
}

/// Compare every tracked metric of two runs.
pub fn compare(run_a: &MetricSummary, run_b: &MetricSummary) -> Vec<ComparisonRow> {
    TRACKED_METRICS
        .iter()
        .map(|metric| {
            let value_a = (metric.value)(run_a);
            let value_b = (metric.value)(run_b);
            let diff_abs = value_b - value_a;
            let diff_pct = diff_pct(value_a, value_b);

            ComparisonRow {
                metric: metric.key,
                label: metric.label,
                value_a,
                value_b,
                diff_abs,
                diff_pct,
                indicator: indicator(metric.direction, diff_pct),
                display_a: metric.unit.format(value_a),
                display_b: metric.unit.format(value_b),
                display_diff: metric.unit.format_signed(diff_abs),
            }
        })
        .collect()
}
