//! Run telemetry for the Wind Tunnel dashboard.
//!
//! Follows the live feed of one run at a time, pages through its operation logs, judges whether
//! it passed and compares finished runs. Rendering is left to the caller.

pub mod classify;
pub mod compare;
pub mod context;
pub mod export;
pub mod live;
pub mod logs;
pub mod report;
pub mod series;
pub mod source;
pub mod stages;

pub mod prelude {
    pub use crate::classify::{
        classify, classify_run, threshold_violations, Thresholds, Verdict, VerdictStatus,
    };
    pub use crate::compare::{compare, diff_pct, ComparisonRow, Direction, Indicator};
    pub use crate::context::{Dashboard, DashboardConfig, DashboardContext, DashboardError};
    pub use crate::live::{LiveAggregator, StreamStatus, Totals};
    pub use crate::logs::{
        LogFilters, LogQueryEngine, LogQueryState, LogRequest, Pagination, QueryError,
        QueryOutcome, ValidationError,
    };
    pub use crate::series::{AppendOutcome, TimeSeriesStore};
    pub use crate::source::{
        FeedEnvelope, FeedEvent, FetchError, JsonlLogStore, JsonlRunStore, LiveFeed, LogPage,
        LogSource, PageRequest, ReplayFeed, RunApi, RunRecord,
    };
    pub use crate::stages::{derive_stages, DerivedStage, StageMarkerTracker, StageStatus};
}
