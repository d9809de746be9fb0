use super::{FeedEnvelope, FetchError, LiveFeed, LogPage, LogSource, PageRequest, RunApi};
use crate::logs::LogFilters;
use anyhow::Context;
use futures::future::{ready, BoxFuture};
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use wind_tunnel_core::prelude::CancelListener;
use wind_tunnel_summary_model::{load_records, MetricSummary, OperationLog, RunInfo};

/// A line of the runs file: the run plus its final metrics once the run has finished.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    #[serde(flatten)]
    pub run: RunInfo,
    #[serde(default)]
    pub summary: Option<MetricSummary>,
}

/// Runs loaded from a JSON Lines file of [RunRecord]s.
#[derive(Debug, Clone, Default)]
pub struct JsonlRunStore {
    records: Arc<Vec<RunRecord>>,
}

impl JsonlRunStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let records: Vec<RunRecord> = load_records(path)
            .with_context(|| format!("Failed to load runs from {}", path.display()))?;
        log::debug!("Loaded {} runs from {}", records.len(), path.display());
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<RunRecord>) -> Self {
        let records = records
            .into_iter()
            .sorted_by_key(|record| std::cmp::Reverse(record.run.created_at))
            .collect();
        Self {
            records: Arc::new(records),
        }
    }

    fn find(&self, run_id: &str) -> Result<&RunRecord, FetchError> {
        self.records
            .iter()
            .find(|record| record.run.id == run_id)
            .ok_or_else(|| FetchError::NotFound(format!("run {run_id}")))
    }
}

impl RunApi for JsonlRunStore {
    fn fetch_runs(&self) -> BoxFuture<'static, Result<Vec<RunInfo>, FetchError>> {
        let runs = self.records.iter().map(|record| record.run.clone()).collect();
        ready(Ok(runs)).boxed()
    }

    fn fetch_run(&self, run_id: &str) -> BoxFuture<'static, Result<RunInfo, FetchError>> {
        ready(self.find(run_id).map(|record| record.run.clone())).boxed()
    }

    fn fetch_summary(&self, run_id: &str) -> BoxFuture<'static, Result<MetricSummary, FetchError>> {
        let result = self.find(run_id).and_then(|record| {
            record
                .summary
                .clone()
                .ok_or_else(|| FetchError::NotFound(format!("summary for run {run_id}")))
        });
        ready(result).boxed()
    }
}

/// Operation logs loaded from a JSON Lines file, filtered and paged in memory.
#[derive(Debug, Clone, Default)]
pub struct JsonlLogStore {
    by_run: Arc<HashMap<String, Vec<OperationLog>>>,
}

impl JsonlLogStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let logs: Vec<OperationLog> = load_records(path)
            .with_context(|| format!("Failed to load logs from {}", path.display()))?;
        log::debug!("Loaded {} operation logs from {}", logs.len(), path.display());
        Ok(Self::from_logs(logs))
    }

    pub fn from_logs(logs: Vec<OperationLog>) -> Self {
        let mut by_run = logs.into_iter().into_group_map_by(|log| log.run_id.clone());
        for logs in by_run.values_mut() {
            logs.sort_by_key(|log| log.timestamp_ms);
        }
        Self {
            by_run: Arc::new(by_run),
        }
    }

    fn page(&self, run_id: &str, filters: &LogFilters, page: PageRequest) -> LogPage {
        let matching = self
            .by_run
            .get(run_id)
            .map(|logs| logs.iter().filter(|log| filters.matches(log)).collect::<Vec<_>>())
            .unwrap_or_default();

        let logs = matching
            .iter()
            .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
            .map(|log| (*log).clone())
            .collect();

        LogPage {
            logs,
            offset: page.offset,
            limit: page.limit,
            total: matching.len() as u64,
        }
    }
}

impl LogSource for JsonlLogStore {
    fn fetch_logs(
        &self,
        run_id: &str,
        filters: &LogFilters,
        page: PageRequest,
        cancel: CancelListener,
    ) -> BoxFuture<'static, Result<LogPage, FetchError>> {
        let result = cancel
            .check()
            .map_err(FetchError::from)
            .map(|()| self.page(run_id, filters, page));
        ready(result).boxed()
    }
}

/// Replays a recorded feed from a JSON Lines file of [FeedEnvelope]s.
#[derive(Debug, Clone, Default)]
pub struct ReplayFeed {
    events: Arc<Vec<FeedEnvelope>>,
}

impl ReplayFeed {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let events: Vec<FeedEnvelope> = load_records(path)
            .with_context(|| format!("Failed to load feed from {}", path.display()))?;
        log::debug!("Loaded {} feed events from {}", events.len(), path.display());
        Ok(Self::from_events(events))
    }

    pub fn from_events(events: Vec<FeedEnvelope>) -> Self {
        Self {
            events: Arc::new(events),
        }
    }
}

impl LiveFeed for ReplayFeed {
    fn subscribe(&self, run_id: &str) -> BoxStream<'static, FeedEnvelope> {
        let events = self
            .events
            .iter()
            .filter(|envelope| envelope.run_id == run_id)
            .cloned()
            .collect::<Vec<_>>();
        futures::stream::iter(events).boxed()
    }
}
