//! Render downsampling and labels
mod common;

use chrono::{TimeZone, Utc};
use common::point;
use hostdash::downsample::{downsample, label_in, render_with_limit, MAX_RENDER_POINTS};
use hostdash::types::{HistoryPoint, TimeRange};

fn timestamps(points: &[HistoryPoint]) -> Vec<f64> {
    points.iter().map(|p| p.timestamp).collect()
}

#[test]
fn test_short_series_passes_through_sorted() {
    let series = vec![point(3.0), point(1.0), point(2.0)];
    let out = downsample(&series, MAX_RENDER_POINTS);
    assert_eq!(timestamps(&out), vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_stride_selection_from_oldest() {
    // 450 points, cap 200 -> stride 3 -> 150 points
    let series: Vec<_> = (0..450).map(|i| point(i as f64)).collect();
    let out = downsample(&series, 200);
    assert_eq!(out.len(), 150);
    assert_eq!(out[0].timestamp, 0.0);
    assert_eq!(out[1].timestamp, 3.0);
    assert_eq!(out.last().unwrap().timestamp, 447.0);
}

#[test]
fn test_bounded_ordered_and_idempotent() {
    for n in [0usize, 1, 199, 200, 201, 499, 500] {
        // reverse order on input
        let series: Vec<_> = (0..n).rev().map(|i| point(i as f64 * 5.0)).collect();
        let once = downsample(&series, MAX_RENDER_POINTS);
        assert!(once.len() <= MAX_RENDER_POINTS, "n={n}");
        assert!(once.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        let twice = downsample(&once, MAX_RENDER_POINTS);
        assert_eq!(timestamps(&once), timestamps(&twice), "n={n}");
    }
}

#[test]
fn test_zero_limit_renders_nothing() {
    let series = vec![point(1.0)];
    assert!(downsample(&series, 0).is_empty());
}

#[test]
fn test_labels_depend_on_window() {
    let ts = Utc
        .with_ymd_and_hms(2024, 3, 9, 14, 37, 12)
        .unwrap()
        .timestamp() as f64;
    assert_eq!(label_in(ts, TimeRange::Day, &Utc), "14:37");
    assert_eq!(label_in(ts, TimeRange::Week, &Utc), "03/09 14:00");
    assert_eq!(label_in(f64::NAN, TimeRange::Day, &Utc), "--");
}

#[test]
fn test_render_points_default_missing_system_to_zero() {
    let mut bare = point(10.0);
    bare.system = None;
    let out = render_with_limit(&[point(5.0), bare], TimeRange::Day, 10);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].cpu_percent(), 10.0);
    assert_eq!(out[1].cpu_percent(), 0.0);
    assert_eq!(out[1].memory_percent(), 0.0);
    assert!(!out[1].label.is_empty());
}
