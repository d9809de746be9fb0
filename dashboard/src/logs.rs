//! Paged, filtered access to the operation logs of a run.
//!
//! Only the most recently issued query may publish its result. Every query takes a new
//! generation number and cancels the listener of the query before it; when a fetch completes, its
//! result is discarded unless its generation is still the current one. A superseded query is not
//! an error.

use crate::source::{FetchError, LogPage, LogSource, PageRequest};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use wind_tunnel_core::prelude::CancelHandle;
use wind_tunnel_summary_model::OperationLog;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 1000;

/// Filters applied to operation logs. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogFilters {
    pub operation: Option<String>,
    pub tool_name: Option<String>,
    pub ok: Option<bool>,
    pub error_type: Option<String>,
    pub session_id: Option<String>,
    pub worker_id: Option<String>,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
}

impl LogFilters {
    pub fn matches(&self, log: &OperationLog) -> bool {
        fn field(filter: &Option<String>, value: Option<&str>) -> bool {
            filter.as_deref().map_or(true, |f| value == Some(f))
        }

        field(&self.operation, Some(&log.operation))
            && field(&self.tool_name, log.tool_name.as_deref())
            && self.ok.map_or(true, |ok| log.ok == ok)
            && field(&self.error_type, log.error_type.as_deref())
            && field(&self.session_id, Some(&log.session_id))
            && field(&self.worker_id, Some(&log.worker_id))
            && self.min_latency_ms.map_or(true, |min| log.latency_ms >= min)
            && self.max_latency_ms.map_or(true, |max| log.latency_ms <= max)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for value in [self.min_latency_ms, self.max_latency_ms].into_iter().flatten() {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteLatency(value));
            }
        }
        if let (Some(min), Some(max)) = (self.min_latency_ms, self.max_latency_ms) {
            if min > max {
                return Err(ValidationError::LatencyRange { min, max });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("No run selected")]
    NoRunSelected,
    #[error("Page size must be greater than zero")]
    ZeroLimit,
    #[error("Page size {limit} exceeds the maximum of {max}")]
    LimitTooLarge { limit: u64, max: u64 },
    #[error("Minimum latency {min}ms is greater than maximum latency {max}ms")]
    LatencyRange { min: f64, max: f64 },
    #[error("Latency bound {0} is not a finite number")]
    NonFiniteLatency(f64),
}

/// Errors a caller should show to the user. Superseded queries never produce one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Run not found: {0}")]
    NotFound(String),
    /// Retry by re-issuing the same request, see [LogQueryEngine::retry].
    #[error("Failed to load logs: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
    /// Authoritative count of matching logs, regardless of the page length
    pub total: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
            total: 0,
        }
    }
}

impl Pagination {
    pub fn can_go_next(&self) -> bool {
        self.offset.saturating_add(self.limit) < self.total
    }

    pub fn can_go_prev(&self) -> bool {
        self.offset > 0
    }
}

/// A complete description of a log query. Re-issuing an equal request repeats the query.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRequest {
    pub run_id: String,
    pub filters: LogFilters,
    pub offset: u64,
    pub limit: u64,
}

impl LogRequest {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            filters: LogFilters::default(),
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.run_id.is_empty() {
            return Err(ValidationError::NoRunSelected);
        }
        if self.limit == 0 {
            return Err(ValidationError::ZeroLimit);
        }
        if self.limit > MAX_PAGE_SIZE {
            return Err(ValidationError::LimitTooLarge {
                limit: self.limit,
                max: MAX_PAGE_SIZE,
            });
        }
        self.filters.validate()
    }
}

/// What observers see. Logs and pagination are always replaced together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogQueryState {
    pub logs: Vec<OperationLog>,
    pub pagination: Pagination,
    pub loading: bool,
    pub error: Option<QueryError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The query completed and its page is now the observable state.
    Completed(Pagination),
    /// A newer query was issued before this one completed. Its result was discarded.
    Superseded,
}

#[derive(Debug, Default)]
struct EngineInner {
    generation: u64,
    in_flight: Option<CancelHandle>,
    /// Filters, run and page size chosen by the caller, used by the convenience operations
    selection: Option<LogRequest>,
    /// Last request handed to the source, for retries
    last_issued: Option<LogRequest>,
    state: LogQueryState,
}

pub struct LogQueryEngine<S> {
    source: S,
    inner: Mutex<EngineInner>,
}

impl<S: LogSource> LogQueryEngine<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            inner: Mutex::new(EngineInner::default()),
        }
    }

    /// Issue a query, superseding any query still in flight.
    pub async fn query(&self, request: LogRequest) -> Result<QueryOutcome, QueryError> {
        request.validate()?;

        let (generation, listener) = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            if let Some(previous) = inner.in_flight.take() {
                previous.cancel();
            }
            let handle = CancelHandle::new();
            let listener = handle.new_listener();
            inner.in_flight = Some(handle);
            inner.selection = Some(request.clone());
            inner.last_issued = Some(request.clone());
            inner.state.loading = true;
            (inner.generation, listener)
        };
        let guard = InFlightGuard {
            inner: &self.inner,
            generation,
        };

        log::debug!(
            "Querying logs for run {} at offset {} (limit {}), generation {}",
            request.run_id,
            request.offset,
            request.limit,
            generation
        );

        let result = self
            .source
            .fetch_logs(
                &request.run_id,
                &request.filters,
                PageRequest {
                    offset: request.offset,
                    limit: request.limit,
                },
                listener,
            )
            .await;
        std::mem::forget(guard);

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            log::trace!(
                "Discarding logs for generation {generation}, current generation is {}",
                inner.generation
            );
            return Ok(QueryOutcome::Superseded);
        }
        inner.in_flight = None;
        inner.state.loading = false;

        match result {
            Ok(page) => {
                let pagination = publish(&mut inner.state, page);
                Ok(QueryOutcome::Completed(pagination))
            }
            Err(FetchError::Cancelled) => {
                log::trace!("Log query for generation {generation} was cancelled by the source");
                Ok(QueryOutcome::Superseded)
            }
            Err(FetchError::NotFound(what)) => {
                let err = QueryError::NotFound(what);
                inner.state.error = Some(err.clone());
                Err(err)
            }
            Err(FetchError::Transport(msg)) => {
                log::error!("Failed to load logs for run {}: {msg}", request.run_id);
                let err = QueryError::Transport(msg);
                inner.state.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Switch to another run, keeping filters and page size, and load its first page.
    pub async fn set_run(&self, run_id: &str) -> Result<QueryOutcome, QueryError> {
        let request = {
            let inner = self.inner.lock();
            match &inner.selection {
                Some(selection) => LogRequest {
                    run_id: run_id.to_string(),
                    offset: 0,
                    ..selection.clone()
                },
                None => LogRequest::new(run_id),
            }
        };
        self.query(request).await
    }

    /// Apply new filters and load the first page.
    pub async fn set_filters(&self, filters: LogFilters) -> Result<QueryOutcome, QueryError> {
        let request = LogRequest {
            filters,
            offset: 0,
            ..self.selection()
        };
        self.query(request).await
    }

    /// Change the page size used by later queries. Nothing is fetched, and the offset is left for
    /// the caller to choose.
    pub fn set_page_size(&self, limit: u64) -> Result<(), ValidationError> {
        if limit == 0 {
            return Err(ValidationError::ZeroLimit);
        }
        if limit > MAX_PAGE_SIZE {
            return Err(ValidationError::LimitTooLarge {
                limit,
                max: MAX_PAGE_SIZE,
            });
        }
        let mut inner = self.inner.lock();
        let selection = inner
            .selection
            .get_or_insert_with(|| LogRequest::new(String::new()));
        selection.limit = limit;
        Ok(())
    }

    /// Load the page starting at `offset` with the current page size.
    pub async fn handle_page_change(&self, offset: u64) -> Result<QueryOutcome, QueryError> {
        let request = LogRequest {
            offset,
            ..self.selection()
        };
        self.query(request).await
    }

    /// Re-issue the last request exactly as it was sent.
    pub async fn retry(&self) -> Result<QueryOutcome, QueryError> {
        let request = self
            .inner
            .lock()
            .last_issued
            .clone()
            .ok_or(ValidationError::NoRunSelected)?;
        self.query(request).await
    }

    pub fn state(&self) -> LogQueryState {
        self.inner.lock().state.clone()
    }

    pub fn pagination(&self) -> Pagination {
        self.inner.lock().state.pagination
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().state.loading
    }

    fn selection(&self) -> LogRequest {
        self.inner
            .lock()
            .selection
            .clone()
            .unwrap_or_else(|| LogRequest::new(String::new()))
    }
}

/// Clears the loading flag of a query whose future was dropped before its fetch completed.
struct InFlightGuard<'a> {
    inner: &'a Mutex<EngineInner>,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.generation != self.generation {
            return;
        }
        log::trace!("Log query for generation {} was abandoned", self.generation);
        if let Some(handle) = inner.in_flight.take() {
            handle.cancel();
        }
        inner.state.loading = false;
    }
}

fn publish(state: &mut LogQueryState, page: LogPage) -> Pagination {
    let pagination = Pagination {
        offset: page.offset,
        limit: page.limit,
        total: page.total,
    };
    *state = LogQueryState {
        logs: page.logs,
        pagination,
        loading: false,
        error: None,
    };
    pagination
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::JsonlLogStore;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;
    use wind_tunnel_core::prelude::CancelListener;

    fn log(run_id: &str, i: i64) -> OperationLog {
        OperationLog {
            run_id: run_id.to_string(),
            timestamp_ms: i,
            operation: if i % 3 == 0 { "write" } else { "read" }.to_string(),
            tool_name: None,
            latency_ms: i as f64,
            ok: true,
            error_type: None,
            error_code: None,
            session_id: "s".to_string(),
            worker_id: "w".to_string(),
        }
    }

    fn store(count: i64) -> JsonlLogStore {
        JsonlLogStore::from_logs((0..count).map(|i| log("run-1", i)).collect())
    }

    fn page_of(total: u64, offset: u64, limit: u64, marker: &str) -> LogPage {
        LogPage {
            logs: vec![log(marker, offset as i64)],
            offset,
            limit,
            total,
        }
    }

    /// Resolves each fetch when the test sends its result, in whatever order the test chooses.
    #[derive(Clone, Default)]
    struct ControlledSource {
        pending: Arc<parking_lot::Mutex<VecDeque<oneshot::Receiver<Result<LogPage, FetchError>>>>>,
        honour_cancel: bool,
        calls: Arc<AtomicUsize>,
    }

    impl ControlledSource {
        fn with_calls(n: usize) -> (Self, Vec<oneshot::Sender<Result<LogPage, FetchError>>>) {
            let source = Self::default();
            let mut senders = Vec::new();
            for _ in 0..n {
                let (tx, rx) = oneshot::channel();
                source.pending.lock().push_back(rx);
                senders.push(tx);
            }
            (source, senders)
        }
    }

    impl LogSource for ControlledSource {
        fn fetch_logs(
            &self,
            _run_id: &str,
            _filters: &LogFilters,
            _page: PageRequest,
            mut cancel: CancelListener,
        ) -> BoxFuture<'static, Result<LogPage, FetchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rx = self
                .pending
                .lock()
                .pop_front()
                .expect("Unexpected fetch");
            let honour_cancel = self.honour_cancel;
            async move {
                if honour_cancel {
                    tokio::select! {
                        result = rx => result.unwrap_or(Err(FetchError::Cancelled)),
                        _ = cancel.cancelled() => Err(FetchError::Cancelled),
                    }
                } else {
                    rx.await.unwrap_or(Err(FetchError::Cancelled))
                }
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn later_query_wins_when_earlier_resolves_last() {
        let (source, mut senders) = ControlledSource::with_calls(2);
        let engine = LogQueryEngine::new(source);
        let second_tx = senders.pop().unwrap();
        let first_tx = senders.pop().unwrap();

        let first = engine.query(LogRequest::new("run-1"));
        let second = engine.query(LogRequest {
            offset: 50,
            ..LogRequest::new("run-1")
        });
        tokio::pin!(first);
        tokio::pin!(second);
        assert!(futures::poll!(&mut first).is_pending());
        assert!(futures::poll!(&mut second).is_pending());

        second_tx.send(Ok(page_of(120, 50, 50, "second"))).unwrap();
        let second = second.await;
        // The first query is slow and answers last
        first_tx.send(Ok(page_of(120, 0, 50, "first"))).unwrap();
        let first = first.await;

        assert_eq!(first, Ok(QueryOutcome::Superseded));
        assert_eq!(
            second,
            Ok(QueryOutcome::Completed(Pagination {
                offset: 50,
                limit: 50,
                total: 120
            }))
        );
        let state = engine.state();
        assert_eq!(state.logs[0].run_id, "second");
        assert_eq!(state.pagination.offset, 50);
        assert!(!state.loading);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn cancelled_query_is_silent() {
        let (mut source, mut senders) = ControlledSource::with_calls(2);
        source.honour_cancel = true;
        let engine = LogQueryEngine::new(source);
        let second_tx = senders.pop().unwrap();

        let first = engine.query(LogRequest::new("run-1"));
        let second = engine.query(LogRequest::new("run-1"));
        tokio::pin!(first);
        tokio::pin!(second);
        assert!(futures::poll!(&mut first).is_pending());
        assert!(futures::poll!(&mut second).is_pending());

        assert_eq!(first.await, Ok(QueryOutcome::Superseded));
        assert!(engine.is_loading());

        second_tx.send(Ok(page_of(1, 0, 50, "second"))).unwrap();
        assert!(matches!(second.await, Ok(QueryOutcome::Completed(_))));
        assert_eq!(engine.state().error, None);
        assert!(!engine.is_loading());
    }

    #[tokio::test]
    async fn stale_failure_does_not_surface() {
        let (source, mut senders) = ControlledSource::with_calls(2);
        let engine = LogQueryEngine::new(source);
        let second_tx = senders.pop().unwrap();
        let first_tx = senders.pop().unwrap();

        let first = engine.query(LogRequest::new("run-1"));
        let second = engine.query(LogRequest::new("run-1"));
        tokio::pin!(first);
        tokio::pin!(second);
        assert!(futures::poll!(&mut first).is_pending());
        assert!(futures::poll!(&mut second).is_pending());

        second_tx.send(Ok(page_of(3, 0, 50, "second"))).unwrap();
        assert!(second.await.is_ok());
        first_tx
            .send(Err(FetchError::Transport("boom".to_string())))
            .unwrap();

        assert_eq!(first.await, Ok(QueryOutcome::Superseded));
        assert_eq!(engine.state().error, None);
        assert_eq!(engine.state().logs[0].run_id, "second");
    }

    #[tokio::test]
    async fn transport_failure_surfaces_and_retry_repeats_request() {
        let (source, mut senders) = ControlledSource::with_calls(2);
        let calls = source.calls.clone();
        let engine = LogQueryEngine::new(source);
        let retry_tx = senders.pop().unwrap();
        let first_tx = senders.pop().unwrap();

        first_tx
            .send(Err(FetchError::Transport("connection reset".to_string())))
            .unwrap();
        let request = LogRequest {
            offset: 100,
            ..LogRequest::new("run-1")
        };
        let result = engine.query(request).await;
        assert_eq!(
            result,
            Err(QueryError::Transport("connection reset".to_string()))
        );
        assert_eq!(
            engine.state().error,
            Some(QueryError::Transport("connection reset".to_string()))
        );

        retry_tx.send(Ok(page_of(150, 100, 50, "retry"))).unwrap();
        let result = engine.retry().await;
        assert_eq!(
            result,
            Ok(QueryOutcome::Completed(Pagination {
                offset: 100,
                limit: 50,
                total: 150
            }))
        );
        assert_eq!(engine.state().error, None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected_before_fetching() {
        let (source, _senders) = ControlledSource::with_calls(0);
        let calls = source.calls.clone();
        let engine = LogQueryEngine::new(source);

        let zero = LogRequest {
            limit: 0,
            ..LogRequest::new("run-1")
        };
        assert_eq!(
            engine.query(zero).await,
            Err(QueryError::Validation(ValidationError::ZeroLimit))
        );

        let too_big = LogRequest {
            limit: MAX_PAGE_SIZE + 1,
            ..LogRequest::new("run-1")
        };
        assert!(matches!(
            engine.query(too_big).await,
            Err(QueryError::Validation(ValidationError::LimitTooLarge { .. }))
        ));

        let mut inverted = LogRequest::new("run-1");
        inverted.filters.min_latency_ms = Some(10.0);
        inverted.filters.max_latency_ms = Some(5.0);
        assert!(matches!(
            engine.query(inverted).await,
            Err(QueryError::Validation(ValidationError::LatencyRange { .. }))
        ));

        assert_eq!(
            engine.handle_page_change(0).await,
            Err(QueryError::Validation(ValidationError::NoRunSelected))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!engine.is_loading());
    }

    #[tokio::test]
    async fn page_change_keeps_page_size() {
        let engine = LogQueryEngine::new(store(120));
        engine.set_run("run-1").await.unwrap();
        assert_eq!(
            engine.pagination(),
            Pagination {
                offset: 0,
                limit: 50,
                total: 120
            }
        );

        engine.handle_page_change(50).await.unwrap();
        let pagination = engine.pagination();
        assert_eq!(
            pagination,
            Pagination {
                offset: 50,
                limit: 50,
                total: 120
            }
        );
        assert!(pagination.can_go_next());
        assert!(pagination.can_go_prev());

        engine.handle_page_change(100).await.unwrap();
        let state = engine.state();
        assert_eq!(state.logs.len(), 20);
        assert!(!state.pagination.can_go_next());
    }

    #[tokio::test]
    async fn filter_change_resets_offset() {
        let engine = LogQueryEngine::new(store(120));
        engine.set_run("run-1").await.unwrap();
        engine.handle_page_change(50).await.unwrap();

        engine
            .set_filters(LogFilters {
                operation: Some("write".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let state = engine.state();
        assert_eq!(state.pagination.offset, 0);
        assert_eq!(state.pagination.total, 40);
        assert!(state.logs.iter().all(|l| l.operation == "write"));
    }

    #[tokio::test]
    async fn run_change_resets_offset_and_keeps_filters() {
        let logs = (0..60)
            .map(|i| log("run-1", i))
            .chain((0..30).map(|i| log("run-2", i)))
            .collect();
        let engine = LogQueryEngine::new(JsonlLogStore::from_logs(logs));
        engine.set_run("run-1").await.unwrap();
        engine
            .set_filters(LogFilters {
                operation: Some("read".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        engine.handle_page_change(20).await.unwrap();

        engine.set_run("run-2").await.unwrap();
        let state = engine.state();
        assert_eq!(state.pagination.offset, 0);
        assert_eq!(state.pagination.total, 20);
        assert!(state.logs.iter().all(|l| l.run_id == "run-2"));
    }

    #[tokio::test]
    async fn page_size_change_does_not_refetch() {
        let engine = LogQueryEngine::new(store(120));
        engine.set_run("run-1").await.unwrap();
        engine.handle_page_change(50).await.unwrap();

        engine.set_page_size(25).unwrap();
        assert_eq!(engine.pagination().limit, 50);
        assert_eq!(engine.state().logs.len(), 50);

        // The caller picks the offset to pair with the new page size
        engine.handle_page_change(50).await.unwrap();
        assert_eq!(
            engine.pagination(),
            Pagination {
                offset: 50,
                limit: 25,
                total: 120
            }
        );
        assert_eq!(engine.set_page_size(0), Err(ValidationError::ZeroLimit));
    }

    #[test]
    fn pagination_bounds() {
        let first = Pagination {
            offset: 0,
            limit: 50,
            total: 50,
        };
        assert!(!first.can_go_next());
        assert!(!first.can_go_prev());

        let middle = Pagination {
            offset: 50,
            limit: 50,
            total: 120,
        };
        assert!(middle.can_go_next());
        assert!(middle.can_go_prev());
    }

    #[tokio::test]
    async fn offset_past_the_end_does_not_overflow() {
        let engine = LogQueryEngine::new(store(10));
        let outcome = engine
            .query(LogRequest {
                offset: u64::MAX,
                ..LogRequest::new("run-1")
            })
            .await
            .unwrap();

        assert!(matches!(outcome, QueryOutcome::Completed(_)));
        let pagination = engine.pagination();
        assert_eq!(pagination.total, 10);
        assert!(!pagination.can_go_next());
        assert!(pagination.can_go_prev());
        assert!(engine.state().logs.is_empty());
    }

    #[tokio::test]
    async fn dropped_query_stops_loading() {
        let (mut source, mut senders) = ControlledSource::with_calls(2);
        source.honour_cancel = true;
        let engine = LogQueryEngine::new(source);
        let tx = senders.pop().unwrap();

        {
            let query = engine.query(LogRequest::new("run-1"));
            tokio::pin!(query);
            assert!(futures::poll!(&mut query).is_pending());
            assert!(engine.is_loading());
        }

        assert!(!engine.is_loading());
        assert!(engine.inner.lock().in_flight.is_none());

        tx.send(Ok(page_of(1, 0, 50, "next"))).unwrap();
        assert!(matches!(
            engine.query(LogRequest::new("run-1")).await,
            Ok(QueryOutcome::Completed(_))
        ));
        assert!(!engine.is_loading());
    }

    #[tokio::test]
    async fn dropping_a_superseded_query_keeps_the_current_one_loading() {
        let (source, mut senders) = ControlledSource::with_calls(2);
        let engine = LogQueryEngine::new(source);
        let second_tx = senders.pop().unwrap();

        let second = {
            let first = engine.query(LogRequest::new("run-1"));
            tokio::pin!(first);
            assert!(futures::poll!(&mut first).is_pending());
            let mut second = engine.query(LogRequest::new("run-1")).boxed();
            assert!(futures::poll!(&mut second).is_pending());
            second
        };
        assert!(engine.is_loading());

        second_tx.send(Ok(page_of(1, 0, 50, "second"))).unwrap();
        assert!(matches!(second.await, Ok(QueryOutcome::Completed(_))));
        assert!(!engine.is_loading());
    }

    #[tokio::test]
    async fn non_finite_latency_bounds_are_rejected() {
        let engine = LogQueryEngine::new(store(10));
        let mut request = LogRequest::new("run-1");
        request.filters.min_latency_ms = Some(f64::NAN);

        assert!(matches!(
            engine.query(request).await,
            Err(QueryError::Validation(ValidationError::NonFiniteLatency(_)))
        ));

        let mut request = LogRequest::new("run-1");
        request.filters.max_latency_ms = Some(f64::INFINITY);
        assert!(matches!(
            engine.query(request).await,
            Err(QueryError::Validation(ValidationError::NonFiniteLatency(_)))
        ));
        assert_eq!(engine.state(), LogQueryState::default());
    }

    #[test]
    fn filters_match_fields() {
        let mut entry = log("run-1", 7);
        entry.tool_name = Some("curl".to_string());
        entry.ok = false;
        entry.error_type = Some("timeout".to_string());

        assert!(LogFilters::default().matches(&entry));
        assert!(LogFilters {
            tool_name: Some("curl".to_string()),
            ok: Some(false),
            error_type: Some("timeout".to_string()),
            min_latency_ms: Some(7.0),
            max_latency_ms: Some(7.0),
            ..Default::default()
        }
        .matches(&entry));
        assert!(!LogFilters {
            worker_id: Some("other".to_string()),
            ..Default::default()
        }
        .matches(&entry));
        assert!(!LogFilters {
            min_latency_ms: Some(8.0),
            ..Default::default()
        }
        .matches(&entry));
    }
}
