use serde::Serialize;
use wind_tunnel_summary_model::OperationLog;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Serde JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat view of a log for CSV, where missing values are empty cells.
#[derive(Serialize)]
struct CsvRow<'a> {
    timestamp_ms: i64,
    run_id: &'a str,
    operation: &'a str,
    tool_name: Option<&'a str>,
    latency_ms: f64,
    ok: bool,
    error_type: Option<&'a str>,
    error_code: Option<i64>,
    session_id: &'a str,
    worker_id: &'a str,
}

impl<'a> From<&'a OperationLog> for CsvRow<'a> {
    fn from(log: &'a OperationLog) -> Self {
        Self {
            timestamp_ms: log.timestamp_ms,
            run_id: &log.run_id,
            operation: &log.operation,
            tool_name: log.tool_name.as_deref(),
            latency_ms: log.latency_ms,
            ok: log.ok,
            error_type: log.error_type.as_deref(),
            error_code: log.error_code,
            session_id: &log.session_id,
            worker_id: &log.worker_id,
        }
    }
}

pub fn to_csv(logs: &[OperationLog]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for log in logs {
        writer.serialize(CsvRow::from(log))?;
    }
    writer.flush()?;
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn to_json(logs: &[OperationLog]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(logs)?)
}
