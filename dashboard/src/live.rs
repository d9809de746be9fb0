//! Live telemetry for the run currently in view.
//!
//! The aggregator holds at most one feed subscription. The subscription stream, the time series
//! and the stage markers all belong to one [ActiveRun]. Switching runs drops the previous stream
//! before subscribing again, and because events are only pulled through `&mut self`, no event of
//! the old run can be applied once the switch has started.

use crate::series::{AppendOutcome, TimeSeriesStore};
use crate::source::{FeedEnvelope, FeedEvent, LiveFeed};
use crate::stages::{DerivedStage, StageMarkerTracker};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use wind_tunnel_summary_model::MetricSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    /// No run selected
    Idle,
    Connected,
    /// The feed dropped. Data received so far is kept.
    Interrupted,
}

/// Cumulative counters, taken as-is from the latest snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub total_ops: u64,
    pub success_ops: u64,
    pub failed_ops: u64,
    pub duration_ms: u64,
}

impl From<&MetricSnapshot> for Totals {
    fn from(snapshot: &MetricSnapshot) -> Self {
        Self {
            total_ops: snapshot.total_ops,
            success_ops: snapshot.success_ops,
            failed_ops: snapshot.failed_ops,
            duration_ms: snapshot.duration_ms,
        }
    }
}

/// Telemetry accumulated for the run in view.
#[derive(Debug)]
pub struct ActiveRun {
    run_id: String,
    started_at: Option<i64>,
    series: TimeSeriesStore,
    stages: StageMarkerTracker,
    totals: Totals,
    foreign_events: u64,
}

impl ActiveRun {
    fn new(run_id: String, started_at: Option<i64>, retention: Option<usize>) -> Self {
        Self {
            run_id,
            started_at,
            series: retention.map_or_else(TimeSeriesStore::new, TimeSeriesStore::with_retention),
            stages: StageMarkerTracker::new(),
            totals: Totals::default(),
            foreign_events: 0,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn started_at(&self) -> Option<i64> {
        self.started_at
    }

    pub fn series(&self) -> &TimeSeriesStore {
        &self.series
    }

    pub fn latest(&self) -> Option<&MetricSnapshot> {
        self.series.latest()
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    /// Stages derived at `now_ms`. Empty when no markers have arrived or the start time is
    /// unknown.
    pub fn stages(&self, now_ms: i64, is_active: bool) -> Vec<DerivedStage> {
        match self.started_at {
            Some(started_at) => self.stages.derive_stages(now_ms, started_at, is_active),
            None => Vec::new(),
        }
    }

    /// Wall clock time since the run started while it is active, otherwise the run time reported
    /// by the latest snapshot.
    pub fn elapsed_ms(&self, now_ms: i64, is_active: bool) -> u64 {
        match (is_active, self.started_at) {
            (true, Some(started_at)) => {
                u64::try_from(now_ms.saturating_sub(started_at)).unwrap_or(0)
            }
            _ => self.totals.duration_ms,
        }
    }

    /// Snapshots dropped because they arrived out of order.
    pub fn out_of_order_drops(&self) -> u64 {
        self.series.out_of_order_drops()
    }

    /// Events received on this subscription that were tagged with another run.
    pub fn foreign_events(&self) -> u64 {
        self.foreign_events
    }
}

pub struct LiveAggregator<F> {
    feed: F,
    retention: Option<usize>,
    active: Option<ActiveRun>,
    stream: Option<BoxStream<'static, FeedEnvelope>>,
    status: watch::Sender<StreamStatus>,
}

impl<F: LiveFeed> LiveAggregator<F> {
    pub fn new(feed: F) -> Self {
        Self {
            feed,
            retention: None,
            active: None,
            stream: None,
            status: watch::channel(StreamStatus::Idle).0,
        }
    }

    /// Keep at most `max_len` snapshots per run.
    pub fn with_retention(mut self, max_len: usize) -> Self {
        self.retention = Some(max_len);
        self
    }

    /// Observe connection status changes.
    pub fn watch_status(&self) -> watch::Receiver<StreamStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> StreamStatus {
        *self.status.borrow()
    }

    /// Start following a run, discarding whatever was followed before.
    pub fn select_run(&mut self, run_id: &str, started_at: Option<i64>) {
        self.teardown();

        log::info!("Subscribing to live feed for run {run_id}");
        self.stream = Some(self.feed.subscribe(run_id));
        self.active = Some(ActiveRun::new(run_id.to_string(), started_at, self.retention));
        self.status.send_replace(StreamStatus::Connected);
    }

    /// Drop the subscription and the telemetry of the current run.
    pub fn teardown(&mut self) {
        if let Some(previous) = self.active.take() {
            log::debug!("Unsubscribing from live feed for run {}", previous.run_id);
        }
        self.stream = None;
        self.status.send_replace(StreamStatus::Idle);
    }

    /// Wait for the next feed event and apply it. Returns false once the feed has ended or no run
    /// is selected.
    pub async fn next_event(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };

        let next = stream.next().await;
        match next {
            Some(envelope) => {
                self.apply(envelope);
                true
            }
            None => {
                if let Some(active) = &self.active {
                    log::warn!("Live feed for run {} ended", active.run_id);
                }
                self.stream = None;
                self.set_status(StreamStatus::Interrupted);
                false
            }
        }
    }

    /// Apply every event the feed delivers until it ends.
    pub async fn drain(&mut self) -> usize {
        let mut applied = 0;
        while self.next_event().await {
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, envelope: FeedEnvelope) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if envelope.run_id != active.run_id {
            active.foreign_events += 1;
            log::debug!(
                "Ignoring feed event for run {} while following run {}",
                envelope.run_id,
                active.run_id
            );
            return;
        }

        match envelope.event {
            FeedEvent::Snapshot(snapshot) => {
                let totals = Totals::from(&snapshot);
                if active.series.append(snapshot) == AppendOutcome::Appended {
                    active.totals = totals;
                }
            }
            FeedEvent::Stage(marker) => {
                active.stages.record(marker);
            }
            FeedEvent::Disconnected => {
                log::warn!("Live feed for run {} interrupted", active.run_id);
                self.set_status(StreamStatus::Interrupted);
            }
            FeedEvent::Reconnected => {
                log::info!("Live feed for run {} resumed", active.run_id);
                self.set_status(StreamStatus::Connected);
            }
        }
    }

    fn set_status(&self, status: StreamStatus) {
        self.status.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });
    }

    pub fn active(&self) -> Option<&ActiveRun> {
        self.active.as_ref()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.active.as_ref().map(ActiveRun::run_id)
    }

    pub fn latest(&self) -> Option<&MetricSnapshot> {
        self.active.as_ref().and_then(ActiveRun::latest)
    }

    pub fn totals(&self) -> Totals {
        self.active.as_ref().map(ActiveRun::totals).unwrap_or_default()
    }
}
