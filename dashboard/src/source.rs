//! Contracts for the services the dashboard reads from.
//!
//! The dashboard never talks to the load-test engine directly. Runs, logs and the live feed are
//! each provided by an implementation of one of these traits. The file backed implementations
//! [JsonlRunStore], [JsonlLogStore] and [ReplayFeed] are used by the CLI and in tests.

mod jsonl;

use crate::logs::LogFilters;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use wind_tunnel_core::prelude::{CancelListener, CancelledError};
use wind_tunnel_summary_model::{MetricSnapshot, MetricSummary, OperationLog, RunInfo, StageMarker};

pub use jsonl::{JsonlLogStore, JsonlRunStore, ReplayFeed, RunRecord};

/// Failures reported by collaborators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Not found: {0}")]
    NotFound(String),
    /// The request was abandoned because its cancel listener fired.
    #[error("Request cancelled")]
    Cancelled,
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<CancelledError> for FetchError {
    fn from(_: CancelledError) -> Self {
        FetchError::Cancelled
    }
}

/// A page of operation logs as returned by a [LogSource].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
    pub logs: Vec<OperationLog>,
    pub offset: u64,
    pub limit: u64,
    /// Number of logs matching the filters across all pages
    pub total: u64,
}

/// Which slice of the matching logs to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u64,
}

pub trait RunApi {
    /// All known runs, most recent first.
    fn fetch_runs(&self) -> BoxFuture<'static, Result<Vec<RunInfo>, FetchError>>;

    /// Fails with [FetchError::NotFound] if the run id is unknown.
    fn fetch_run(&self, run_id: &str) -> BoxFuture<'static, Result<RunInfo, FetchError>>;

    /// Final metrics of a completed run.
    fn fetch_summary(&self, run_id: &str) -> BoxFuture<'static, Result<MetricSummary, FetchError>>;
}

pub trait LogSource {
    /// Fetch one page of logs.
    ///
    /// Implementations should stop work and return [FetchError::Cancelled] once `cancel` fires,
    /// but callers never rely on that.
    fn fetch_logs(
        &self,
        run_id: &str,
        filters: &LogFilters,
        page: PageRequest,
        cancel: CancelListener,
    ) -> BoxFuture<'static, Result<LogPage, FetchError>>;
}

/// Events delivered by the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FeedEvent {
    Snapshot(MetricSnapshot),
    Stage(StageMarker),
    /// The transport lost its connection. Events may resume later on the same stream.
    Disconnected,
    Reconnected,
}

/// A feed event tagged with the run it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEnvelope {
    pub run_id: String,
    pub event: FeedEvent,
}

pub trait LiveFeed {
    /// Subscribe to the events of a run. Dropping the stream unsubscribes.
    ///
    /// Counters in snapshots are cumulative. Delivery order is best effort.
    fn subscribe(&self, run_id: &str) -> BoxStream<'static, FeedEnvelope>;
}
