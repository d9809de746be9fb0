use std::collections::VecDeque;
use wind_tunnel_summary_model::MetricSnapshot;

/// What happened to a snapshot handed to [TimeSeriesStore::append].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// The snapshot was older than the last stored point and was discarded.
    OutOfOrderDrop,
}

/// Ordered, append-only buffer of metric snapshots for a single run.
///
/// Points are kept in arrival order and are never older than the point before them. An optional
/// retention limit evicts the oldest points first once the series grows past it.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesStore {
    points: VecDeque<MetricSnapshot>,
    retention: Option<usize>,
    out_of_order_drops: u64,
    evicted: u64,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_len` points. A limit of zero is treated as one.
    pub fn with_retention(max_len: usize) -> Self {
        Self {
            retention: Some(max_len.max(1)),
            ..Default::default()
        }
    }

    pub fn append(&mut self, snapshot: MetricSnapshot) -> AppendOutcome {
        if let Some(last) = self.points.back() {
            if !is_in_order(last, &snapshot) {
                self.out_of_order_drops += 1;
                log::debug!(
                    "Dropping out of order snapshot at {} (seq {:?}), last stored point is at {} (seq {:?})",
                    snapshot.timestamp_ms,
                    snapshot.seq,
                    last.timestamp_ms,
                    last.seq
                );
                return AppendOutcome::OutOfOrderDrop;
            }
        }

        self.points.push_back(snapshot);

        if let Some(max_len) = self.retention {
            while self.points.len() > max_len {
                self.points.pop_front();
                self.evicted += 1;
            }
        }

        AppendOutcome::Appended
    }

    pub fn latest(&self) -> Option<&MetricSnapshot> {
        self.points.back()
    }

    /// All retained snapshots in arrival order.
    ///
    /// The iterator borrows the store, so nothing can be appended while it is alive. Call again,
    /// or clone the iterator, to walk the series from the start.
    pub fn all(
        &self,
    ) -> impl ExactSizeIterator<Item = &MetricSnapshot> + DoubleEndedIterator + Clone + '_ {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn out_of_order_drops(&self) -> u64 {
        self.out_of_order_drops
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

/// Sequence numbers win when both points carry one, otherwise fall back to the wall clock.
fn is_in_order(last: &MetricSnapshot, next: &MetricSnapshot) -> bool {
    match (last.seq, next.seq) {
        (Some(last_seq), Some(next_seq)) => next_seq >= last_seq,
        _ => next.timestamp_ms >= last.timestamp_ms,
    }
}
