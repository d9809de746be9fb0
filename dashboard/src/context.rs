use crate::classify::{classify_run, threshold_violations, ThresholdViolation, Thresholds, Verdict};
use crate::compare::{compare, ComparisonRow};
use crate::live::{LiveAggregator, StreamStatus, Totals};
use crate::logs::{LogQueryEngine, QueryError, QueryOutcome};
use crate::series::TimeSeriesStore;
use crate::source::{FetchError, LiveFeed, LogSource, RunApi};
use crate::stages::DerivedStage;
use wind_tunnel_summary_model::{MetricSnapshot, RunInfo};

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Run not found: {0}")]
    NotFound(String),
    #[error("Failed to load run: {0}")]
    Transport(String),
    #[error(transparent)]
    Logs(#[from] QueryError),
}

impl From<FetchError> for DashboardError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(what) => DashboardError::NotFound(what),
            FetchError::Cancelled => DashboardError::Transport("Request cancelled".to_string()),
            FetchError::Transport(msg) => DashboardError::Transport(msg),
        }
    }
}

/// Settings chosen when the dashboard is opened.
#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    pub thresholds: Thresholds,
    /// Maximum number of snapshots kept for the run in view
    pub retention: Option<usize>,
}

/// The run currently in view and how it is judged. Replaced whenever another run is selected.
#[derive(Debug, Clone, Default)]
pub struct DashboardContext {
    run: Option<RunInfo>,
    thresholds: Thresholds,
}

impl DashboardContext {
    pub fn run(&self) -> Option<&RunInfo> {
        self.run.as_ref()
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn is_active(&self) -> bool {
        self.run.as_ref().is_some_and(|run| run.state.is_active())
    }
}

/// Top level controller tying the run list, live telemetry and logs together.
pub struct Dashboard<A, L, F> {
    api: A,
    context: DashboardContext,
    live: LiveAggregator<F>,
    logs: LogQueryEngine<L>,
}

impl<A, L, F> Dashboard<A, L, F>
where
    A: RunApi,
    L: LogSource,
    F: LiveFeed,
{
    pub fn new(api: A, log_source: L, feed: F, config: DashboardConfig) -> Self {
        let mut live = LiveAggregator::new(feed);
        if let Some(retention) = config.retention {
            live = live.with_retention(retention);
        }

        Self {
            api,
            context: DashboardContext {
                run: None,
                thresholds: config.thresholds,
            },
            live,
            logs: LogQueryEngine::new(log_source),
        }
    }

    pub async fn runs(&self) -> Result<Vec<RunInfo>, DashboardError> {
        Ok(self.api.fetch_runs().await?)
    }

    /// Bring a run into view: follow its live feed and load the first page of its logs.
    ///
    /// An unknown run leaves the current selection untouched. A failure to load logs is returned
    /// after the run has been selected, so it can be retried through [Dashboard::logs].
    pub async fn select_run(&mut self, run_id: &str) -> Result<QueryOutcome, DashboardError> {
        let run = self.api.fetch_run(run_id).await?;
        log::info!("Selected run {} ({:?})", run.id, run.state);

        self.live.select_run(&run.id, run.started_at);
        self.context.run = Some(run);

        Ok(self.logs.set_run(run_id).await?)
    }

    /// Reload the selected run so that state changes reach the verdict. Telemetry is kept.
    pub async fn refresh_run(&mut self) -> Result<(), DashboardError> {
        let Some(current) = self.context.run.as_ref() else {
            return Ok(());
        };
        let run = self.api.fetch_run(&current.id).await?;
        if self.live.active().is_some_and(|active| active.run_id() == run.id) {
            self.context.run = Some(run);
        }
        Ok(())
    }

    /// Stop following the selected run.
    pub fn close(&mut self) {
        self.live.teardown();
        self.context.run = None;
    }

    /// Apply the next live event. Returns false once the feed has ended.
    pub async fn next_event(&mut self) -> bool {
        self.live.next_event().await
    }

    /// Apply live events until the feed ends.
    pub async fn drain_events(&mut self) -> usize {
        self.live.drain().await
    }

    pub fn context(&self) -> &DashboardContext {
        &self.context
    }

    pub fn logs(&self) -> &LogQueryEngine<L> {
        &self.logs
    }

    pub fn stream_status(&self) -> StreamStatus {
        self.live.status()
    }

    pub fn latest(&self) -> Option<&MetricSnapshot> {
        self.live.latest()
    }

    pub fn series(&self) -> Option<&TimeSeriesStore> {
        self.live.active().map(|active| active.series())
    }

    pub fn totals(&self) -> Totals {
        self.live.totals()
    }

    /// Verdict for the selected run, recomputed on every call.
    pub fn verdict(&self) -> Option<Verdict> {
        self.context
            .run
            .as_ref()
            .map(|run| classify_run(run, self.live.latest(), &self.context.thresholds))
    }

    pub fn violations(&self) -> Vec<ThresholdViolation> {
        self.live
            .latest()
            .map(|latest| threshold_violations(latest, &self.context.thresholds))
            .unwrap_or_default()
    }

    pub fn stages(&self, now_ms: i64) -> Vec<DerivedStage> {
        self.live
            .active()
            .map(|active| active.stages(now_ms, self.context.is_active()))
            .unwrap_or_default()
    }

    pub fn elapsed_ms(&self, now_ms: i64) -> u64 {
        self.live
            .active()
            .map(|active| active.elapsed_ms(now_ms, self.context.is_active()))
            .unwrap_or(0)
    }

    /// Compare the final metrics of two runs. Independent of the selected run.
    pub async fn compare(
        &self,
        run_a: &str,
        run_b: &str,
    ) -> Result<Vec<ComparisonRow>, DashboardError> {
        let (summary_a, summary_b) = futures::future::try_join(
            self.api.fetch_summary(run_a),
            self.api.fetch_summary(run_b),
        )
        .await?;
        Ok(compare(&summary_a, &summary_b))
    }
}
