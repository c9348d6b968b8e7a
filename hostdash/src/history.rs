//! Bounded history buffer for charts.

use std::collections::VecDeque;

use crate::types::HistoryPoint;

pub const HISTORY_CAPACITY: usize = 500;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if cap == 0 {
        return;
    }
    while dq.len() >= cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

/// Insertion-ordered samples, never longer than its capacity. Oldest samples
/// are evicted first.
#[derive(Debug, Clone)]
pub struct HistorySeries {
    points: VecDeque<HistoryPoint>,
    cap: usize,
}

impl HistorySeries {
    pub fn new(cap: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(cap.min(HISTORY_CAPACITY)),
            cap,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn push(&mut self, point: HistoryPoint) {
        push_capped(&mut self.points, point, self.cap);
    }

    // Keeps the tail when the incoming series is longer than the cap
    pub fn replace(&mut self, series: Vec<HistoryPoint>) {
        let skip = series.len().saturating_sub(self.cap);
        self.points = series.into_iter().skip(skip).collect();
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }

    pub fn first(&self) -> Option<&HistoryPoint> {
        self.points.front()
    }

    pub fn last(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    pub fn to_vec(&self) -> Vec<HistoryPoint> {
        self.points.iter().cloned().collect()
    }
}

impl Default for HistorySeries {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
