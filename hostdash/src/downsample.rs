//! Turns a history series into a bounded, chronologically ordered point set
//! with display labels. Stride selection, no averaging.

use chrono::{DateTime, Local, TimeZone};

use crate::types::{HistoryPoint, SystemSnapshot, TimeRange};

pub const MAX_RENDER_POINTS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPoint {
    pub timestamp: f64,
    pub label: String,
    pub system: Option<SystemSnapshot>,
}

impl RenderPoint {
    pub fn cpu_percent(&self) -> f64 {
        self.system.as_ref().map_or(0.0, |s| s.cpu_percent)
    }

    pub fn memory_percent(&self) -> f64 {
        self.system.as_ref().map_or(0.0, |s| s.memory_percent)
    }
}

/// Sorts by timestamp and keeps every `ceil(len / max_points)`-th sample,
/// starting with the oldest. Short series pass through sorted.
pub fn downsample(series: &[HistoryPoint], max_points: usize) -> Vec<HistoryPoint> {
    if max_points == 0 {
        return Vec::new();
    }
    let mut sorted = series.to_vec();
    // stable: equal timestamps keep their arrival order
    sorted.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    if sorted.len() <= max_points {
        return sorted;
    }
    let stride = sorted.len().div_ceil(max_points);
    sorted
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % stride == 0)
        .map(|(_, p)| p)
        .collect()
}

pub fn render(series: &[HistoryPoint], range: TimeRange) -> Vec<RenderPoint> {
    render_with_limit(series, range, MAX_RENDER_POINTS)
}

pub fn render_with_limit(
    series: &[HistoryPoint],
    range: TimeRange,
    max_points: usize,
) -> Vec<RenderPoint> {
    downsample(series, max_points)
        .into_iter()
        .map(|p| RenderPoint {
            label: label(p.timestamp, range),
            timestamp: p.timestamp,
            system: p.system,
        })
        .collect()
}

/// Local-time label: `HH:MM` for windows up to a day, `MM/DD HH:00` beyond.
pub fn label(timestamp: f64, range: TimeRange) -> String {
    label_in(timestamp, range, &Local)
}

pub fn label_in<Tz: TimeZone>(timestamp: f64, range: TimeRange, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let Some(utc) = to_datetime(timestamp) else {
        return "--".into();
    };
    let at = utc.with_timezone(tz);
    if range.hours() <= 24 {
        at.format("%H:%M").to_string()
    } else {
        at.format("%m/%d %H:00").to_string()
    }
}

fn to_datetime(timestamp: f64) -> Option<DateTime<chrono::Utc>> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
}
