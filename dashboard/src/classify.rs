use serde::{Deserialize, Serialize};
use wind_tunnel_summary_model::{MetricSnapshot, RunInfo, RunState, StopMode, StopReason};

pub const DEFAULT_ERROR_RATE_THRESHOLD: f64 = 0.1;

/// Actors whose `stop_requested` stops are part of normal operation rather than a failure.
const AUTOMATIC_ACTORS: [&str; 3] = ["autoramp", "scheduler", "system"];
const USER_ACTORS: [&str; 2] = ["user", "ui"];
const STOP_REQUESTED: &str = "stop_requested";

/// Limits a run is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Highest acceptable error rate, as a ratio between 0 and 1
    pub max_error_rate: f64,
    pub max_latency_p95_ms: Option<f64>,
    pub max_latency_p99_ms: Option<f64>,
    /// Lowest acceptable throughput, in operations per second
    pub min_throughput: Option<f64>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_error_rate: DEFAULT_ERROR_RATE_THRESHOLD,
            max_latency_p95_ms: None,
            max_latency_p99_ms: None,
            min_throughput: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Pass,
    Fail,
    Running,
    Aborted,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub reason: Option<String>,
}

impl Verdict {
    fn new(status: VerdictStatus) -> Self {
        Self {
            status,
            reason: None,
        }
    }

    fn with_reason(status: VerdictStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: Some(reason.into()),
        }
    }
}

/// Classify a run.
///
/// Total over every input: states that carry no verdict, including states this version does not
/// know, classify as [VerdictStatus::Unknown]. A missing snapshot is treated as an error rate of
/// zero.
pub fn classify(
    state: RunState,
    stop_reason: Option<&StopReason>,
    latest: Option<&MetricSnapshot>,
    thresholds: &Thresholds,
) -> Verdict {
    let reason_text = stop_reason.and_then(|r| r.reason.as_deref());
    let actor = stop_reason.and_then(|r| r.actor.as_deref());

    match state {
        RunState::Running | RunState::Scheduling | RunState::Stopping => {
            Verdict::new(VerdictStatus::Running)
        }
        RunState::Completed => {
            if stop_reason.and_then(|r| r.mode) == Some(StopMode::ConditionMet) {
                Verdict::with_reason(
                    VerdictStatus::Fail,
                    reason_text.unwrap_or("Stop condition triggered"),
                )
            } else {
                error_rate_verdict(latest, thresholds)
            }
        }
        RunState::Aborted => {
            Verdict::with_reason(VerdictStatus::Aborted, reason_text.unwrap_or("Emergency stop"))
        }
        RunState::Stopped => {
            if actor_in(actor, &AUTOMATIC_ACTORS) && reason_text == Some(STOP_REQUESTED) {
                error_rate_verdict(latest, thresholds)
            } else if actor_in(actor, &USER_ACTORS) {
                Verdict::with_reason(VerdictStatus::Pass, "Stopped by user")
            } else {
                Verdict::with_reason(VerdictStatus::Fail, reason_text.unwrap_or("Run stopped"))
            }
        }
        RunState::Failed => match reason_text {
            Some(reason) => Verdict::with_reason(VerdictStatus::Fail, reason),
            None => Verdict::new(VerdictStatus::Fail),
        },
        RunState::Created | RunState::Pending | RunState::Unknown => {
            Verdict::new(VerdictStatus::Unknown)
        }
    }
}

pub fn classify_run(
    run: &RunInfo,
    latest: Option<&MetricSnapshot>,
    thresholds: &Thresholds,
) -> Verdict {
    classify(run.state, run.stop_reason.as_ref(), latest, thresholds)
}

fn error_rate_verdict(latest: Option<&MetricSnapshot>, thresholds: &Thresholds) -> Verdict {
    let error_rate = latest.map_or(0.0, |s| s.error_rate);
    if error_rate > thresholds.max_error_rate {
        Verdict::with_reason(
            VerdictStatus::Fail,
            format!(
                "Error rate {:.2}% exceeds threshold {:.2}%",
                error_rate * 100.0,
                thresholds.max_error_rate * 100.0
            ),
        )
    } else {
        Verdict::new(VerdictStatus::Pass)
    }
}

fn actor_in(actor: Option<&str>, actors: &[&str]) -> bool {
    actor.is_some_and(|actor| actors.iter().any(|a| a.eq_ignore_ascii_case(actor)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Above,
    Below,
}

/// A threshold the latest snapshot breaches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdViolation {
    pub metric: &'static str,
    pub actual: f64,
    pub limit: f64,
    pub kind: ViolationKind,
}

/// Every threshold breached by a snapshot, in a stable order.
///
/// Only the error rate feeds into the verdict. The other thresholds are informational.
pub fn threshold_violations(
    snapshot: &MetricSnapshot,
    thresholds: &Thresholds,
) -> Vec<ThresholdViolation> {
    let above = |metric, actual: f64, limit: Option<f64>| {
        limit
            .filter(|limit| actual > *limit)
            .map(|limit| ThresholdViolation {
                metric,
                actual,
                limit,
                kind: ViolationKind::Above,
            })
    };

    [
        above("error_rate", snapshot.error_rate, Some(thresholds.max_error_rate)),
        above(
            "latency_p95_ms",
            snapshot.latency_p95_ms,
            thresholds.max_latency_p95_ms,
        ),
        above(
            "latency_p99_ms",
            snapshot.latency_p99_ms,
            thresholds.max_latency_p99_ms,
        ),
        thresholds
            .min_throughput
            .filter(|limit| snapshot.throughput < *limit)
            .map(|limit| ThresholdViolation {
                metric: "throughput",
                actual: snapshot.throughput,
                limit,
                kind: ViolationKind::Below,
            }),
    ]
    .into_iter()
    .flatten()
    .collect()
}
