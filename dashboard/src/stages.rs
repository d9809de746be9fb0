use serde::Serialize;
use std::collections::HashSet;
use wind_tunnel_summary_model::StageMarker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Running,
}

/// A stage with its duration, derived from the stage markers of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedStage {
    /// Human readable name
    pub name: String,
    /// Identifier as sent by the engine
    pub raw_name: String,
    pub duration_ms: u64,
    pub status: StageStatus,
}

/// Collects the stage markers of one run.
///
/// Markers may arrive in any order. Nothing is derived on record, see [derive_stages].
#[derive(Debug, Clone, Default)]
pub struct StageMarkerTracker {
    markers: Vec<StageMarker>,
    /// Stage and timestamp of every recorded marker
    seen: HashSet<(String, i64)>,
    duplicates: u64,
}

impl StageMarkerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a marker for the same stage and timestamp was already recorded, which
    /// happens when the feed replays events after a reconnect.
    pub fn record(&mut self, marker: StageMarker) -> bool {
        if !self.seen.insert((marker.stage.clone(), marker.timestamp)) {
            self.duplicates += 1;
            log::debug!(
                "Ignoring duplicate stage marker {} at {}",
                marker.stage,
                marker.timestamp
            );
            return false;
        }

        self.markers.push(marker);
        true
    }

    pub fn derive_stages(
        &self,
        now_ms: i64,
        run_started_at: i64,
        is_active: bool,
    ) -> Vec<DerivedStage> {
        derive_stages(&self.markers, now_ms, run_started_at, is_active)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}

/// Derive stage durations from a set of markers.
///
/// Each stage lasts until the next marker. The last stage of an active run is still running and
/// lasts from its marker until `now_ms`; the last stage of a finished run reports zero. An empty
/// marker set yields no stages.
pub fn derive_stages(
    markers: &[StageMarker],
    now_ms: i64,
    run_started_at: i64,
    is_active: bool,
) -> Vec<DerivedStage> {
    let mut sorted = markers.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|marker| marker.timestamp);

    let last_index = sorted.len().saturating_sub(1);
    sorted
        .iter()
        .enumerate()
        .map(|(i, marker)| {
            let (duration_ms, status) = if i < last_index {
                let next = sorted[i + 1].timestamp;
                (
                    clamp_ms(next.saturating_sub(marker.timestamp)),
                    StageStatus::Completed,
                )
            } else if is_active {
                let elapsed = now_ms.saturating_sub(run_started_at);
                let offset = marker.timestamp.saturating_sub(run_started_at);
                (clamp_ms(elapsed.saturating_sub(offset)), StageStatus::Running)
            } else {
                (0, StageStatus::Completed)
            };

            DerivedStage {
                name: marker.label.clone(),
                raw_name: marker.stage.clone(),
                duration_ms,
                status,
            }
        })
        .collect()
}

fn clamp_ms(ms: i64) -> u64 {
    u64::try_from(ms).unwrap_or(0)
}
