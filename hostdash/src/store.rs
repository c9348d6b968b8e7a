//! Metrics store: latest snapshots, bounded history, connection state and the
//! selected reporting window.
//!
//! Every mutator replaces the whole field it touches. The client event loop is
//! the only writer; presentation code reads through [`SharedStore`].

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::downsample::{render_with_limit, RenderPoint};
use crate::history::HistorySeries;
use crate::types::{
    ConnectionState, HistoryPoint, ProcessSnapshot, SystemSnapshot, TimeRange,
};

pub type SharedStore = Arc<RwLock<MetricsStore>>;

#[derive(Debug, Clone, Default)]
pub struct MetricsStore {
    system: Option<SystemSnapshot>,
    processes: Option<ProcessSnapshot>,
    history: HistorySeries,
    connection: ConnectionState,
    time_range: TimeRange,
}

impl MetricsStore {
    pub fn new(history_capacity: usize, time_range: TimeRange) -> Self {
        Self {
            history: HistorySeries::new(history_capacity),
            time_range,
            ..Self::default()
        }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn system(&self) -> Option<&SystemSnapshot> {
        self.system.as_ref()
    }

    pub fn processes(&self) -> Option<&ProcessSnapshot> {
        self.processes.as_ref()
    }

    pub fn history(&self) -> &HistorySeries {
        &self.history
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn set_system(&mut self, snapshot: SystemSnapshot) {
        self.system = Some(snapshot);
    }

    pub fn set_processes(&mut self, snapshot: ProcessSnapshot) {
        self.processes = Some(snapshot);
    }

    pub fn replace_history(&mut self, series: Vec<HistoryPoint>) {
        self.history.replace(series);
    }

    pub fn append_history(&mut self, point: HistoryPoint) {
        self.history.push(point);
    }

    pub fn set_connection_state(&mut self, state: ConnectionState) {
        self.connection = state;
    }

    // History is kept; only the window requested next changes
    pub fn set_time_range(&mut self, range: TimeRange) {
        self.time_range = range;
    }

    /// Render-ready points for the current window.
    pub fn render(&self, max_points: usize) -> Vec<RenderPoint> {
        let series = self.history.to_vec();
        render_with_limit(&series, self.time_range, max_points)
    }

    /// Drops everything but the selected window and history capacity.
    pub fn reset(&mut self) {
        self.system = None;
        self.processes = None;
        self.history.clear();
        self.connection = ConnectionState::default();
    }
}
