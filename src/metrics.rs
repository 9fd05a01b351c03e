//! Metrics aggregator: owns raw per-container metric history and the
//! operator's per-metric visibility flags.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::api::MetricsSource;
use crate::chart::{self, AlignError, AlignedMatrix};
use crate::model::{MetricName, MetricVisibility, MetricsSnapshot};

/// Aggregator state: the last applied snapshot plus visibility flags.
#[derive(Debug, Clone, Default)]
pub struct MetricsState {
    pub series: MetricsSnapshot,
    pub visibility: BTreeMap<String, MetricVisibility>,
}

/// Apply a freshly fetched snapshot to the state.
///
/// The series map is replaced wholesale; entries absent from the new
/// snapshot vanish. Visibility flags persist keyed by id, and ids seen
/// for the first time get a default all-visible entry.
pub fn apply_snapshot(state: &mut MetricsState, snapshot: MetricsSnapshot) {
    for id in snapshot.keys() {
        state.visibility.entry(id.clone()).or_default();
    }
    state.series = snapshot;
}

/// Polls the metrics collaborator and serves aligned chart data.
pub struct MetricsAggregator {
    source: Arc<dyn MetricsSource>,
    state: Mutex<MetricsState>,
}

impl MetricsAggregator {
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        Self {
            source,
            state: Mutex::new(MetricsState::default()),
        }
    }

    /// Fetch and apply the latest snapshot.
    ///
    /// Telemetry is best-effort: on failure the previous state is kept
    /// and the error is only logged. Overlapping calls resolve
    /// last-write-wins.
    pub async fn refresh(&self) {
        match self.source.fetch_metrics().await {
            Ok(snapshot) => {
                let mut state = self.state.lock().unwrap();
                apply_snapshot(&mut state, snapshot);
            }
            Err(e) => {
                tracing::warn!("Metrics refresh failed, keeping previous snapshot: {e}");
            }
        }
    }

    /// Toggle one metric's chart visibility for one entity.
    pub fn set_visibility(&self, id: &str, metric: MetricName, on: bool) {
        let mut state = self.state.lock().unwrap();
        state
            .visibility
            .entry(id.to_string())
            .or_default()
            .set(metric, on);
    }

    /// Current chart payload for the visible series.
    pub fn aligned_data(&self) -> Result<AlignedMatrix, AlignError> {
        let state = self.state.lock().unwrap();
        chart::align(&state.series, &state.visibility)
    }

    /// Snapshot of the current state, for rendering outside the chart.
    pub fn state(&self) -> MetricsState {
        self.state.lock().unwrap().clone()
    }
}
