use serde::{Deserialize, Serialize};
use std::io::{BufRead, Read, Write};
use std::path::Path;

/// Lifecycle state of a run, as reported by the load-test engine.
///
/// States this version does not know about deserialize to [RunState::Unknown] so that a newer
/// engine never makes a run unreadable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Created,
    Pending,
    Scheduling,
    Running,
    Stopping,
    Stopped,
    Completed,
    Aborted,
    Failed,
    #[serde(other)]
    Unknown,
}

impl RunState {
    /// The run is still producing telemetry.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::Scheduling | RunState::Running | RunState::Stopping
        )
    }

    /// The run has ended and will not produce further telemetry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Stopped | RunState::Completed | RunState::Aborted | RunState::Failed
        )
    }
}

/// How a run was ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// A configured stop condition fired.
    ConditionMet,
    /// The run reached its configured duration or operation count.
    Graceful,
    /// An operator or controller asked the run to stop.
    Manual,
    /// Emergency stop.
    Immediate,
    #[serde(other)]
    Other,
}

/// Metadata describing why, and by whom, a run was ended.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StopReason {
    #[serde(default)]
    pub mode: Option<StopMode>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Who requested the stop, for example `user`, `ui`, `autoramp`, `scheduler` or `system`.
    #[serde(default)]
    pub actor: Option<String>,
}

/// A run, owned by the load-test engine. The dashboard only reads these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunInfo {
    /// The unique run id
    pub id: String,
    /// The scenario the run was started from
    pub scenario_id: String,
    pub state: RunState,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
    /// Unix timestamp in milliseconds, unset until the run has been scheduled
    #[serde(default)]
    pub started_at: Option<i64>,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
}

/// One aggregate measurement of a run's performance.
///
/// Counters are cumulative since the start of the run. Percentiles are computed by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricSnapshot {
    /// Display label, for example `12:00:05`
    pub time: String,
    /// Unix timestamp in milliseconds at which the snapshot was taken
    pub timestamp_ms: i64,
    /// Feed sequence number, when the feed provides one
    #[serde(default)]
    pub seq: Option<u64>,
    /// Operations per second
    pub throughput: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    /// Ratio of failed operations, between 0 and 1
    pub error_rate: f64,
    pub success_ops: u64,
    pub failed_ops: u64,
    pub total_ops: u64,
    /// Elapsed run time at the point the snapshot was taken
    pub duration_ms: u64,
}

/// Emitted once when a run enters a new stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageMarker {
    /// Raw stage identifier, for example `ramp_up`
    pub stage: String,
    /// Human readable stage name
    pub label: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

/// A single operation executed against the system under test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationLog {
    pub run_id: String,
    pub timestamp_ms: i64,
    pub operation: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    pub latency_ms: f64,
    pub ok: bool,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    pub session_id: String,
    pub worker_id: String,
}

/// Final metrics of a run, used when comparing runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricSummary {
    pub throughput: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub error_rate: f64,
    pub success_ops: u64,
    pub failed_ops: u64,
    pub total_ops: u64,
    pub duration_ms: u64,
}

impl From<&MetricSnapshot> for MetricSummary {
    fn from(snapshot: &MetricSnapshot) -> Self {
        Self {
            throughput: snapshot.throughput,
            latency_p50_ms: snapshot.latency_p50_ms,
            latency_p95_ms: snapshot.latency_p95_ms,
            latency_p99_ms: snapshot.latency_p99_ms,
            error_rate: snapshot.error_rate,
            success_ops: snapshot.success_ops,
            failed_ops: snapshot.failed_ops,
            total_ops: snapshot.total_ops,
            duration_ms: snapshot.duration_ms,
        }
    }
}

/// Append a record to a JSON Lines file
///
/// The record will be serialized to JSON and output as a single line followed by a newline.
pub fn append_record<T: Serialize>(record: &T, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_record(record, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize a record to a writer
pub fn store_record<T: Serialize, W: Write>(record: &T, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, record)?;
    Ok(())
}

/// Load a single record from a reader
pub fn load_record<T: serde::de::DeserializeOwned, R: Read>(reader: R) -> anyhow::Result<T> {
    let reader = std::io::BufReader::new(reader);
    Ok(serde_json::from_reader(reader)?)
}

/// Load records from a JSON Lines file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_record]. Blank lines are skipped.
pub fn load_records<T: serde::de::DeserializeOwned>(
    path: impl AsRef<Path>,
) -> anyhow::Result<Vec<T>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
