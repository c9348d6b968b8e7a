//! Bounded history buffer behavior
mod common;

use common::point;
use hostdash::history::{push_capped, HistorySeries, HISTORY_CAPACITY};
use std::collections::VecDeque;

#[test]
fn test_push_capped_evicts_oldest() {
    let mut dq = VecDeque::new();
    for i in 0..10 {
        push_capped(&mut dq, i, 3);
    }
    assert_eq!(dq, VecDeque::from(vec![7, 8, 9]));

    let mut none = VecDeque::new();
    push_capped(&mut none, 1, 0);
    assert!(none.is_empty());
}

#[test]
fn test_series_keeps_most_recent_window() {
    let mut series = HistorySeries::default();
    assert_eq!(series.capacity(), HISTORY_CAPACITY);
    for i in 0..600 {
        series.push(point(i as f64));
    }
    assert_eq!(series.len(), 500);
    // the 101st appended sample is now the oldest
    assert_eq!(series.first().unwrap().timestamp, 100.0);
    assert_eq!(series.last().unwrap().timestamp, 599.0);
}

#[test]
fn test_replace_keeps_tail_and_order() {
    let mut series = HistorySeries::new(4);
    series.push(point(1000.0));
    series.replace((0..6).map(|i| point(i as f64)).collect());
    let ts: Vec<f64> = series.iter().map(|p| p.timestamp).collect();
    assert_eq!(ts, vec![2.0, 3.0, 4.0, 5.0]);

    series.replace(Vec::new());
    assert!(series.is_empty());
}

#[test]
fn test_never_exceeds_capacity_for_any_cap() {
    for cap in [1usize, 2, 7, 500] {
        let mut series = HistorySeries::new(cap);
        for i in 0..(cap * 3 + 1) {
            series.push(point(i as f64));
            assert!(series.len() <= cap);
        }
        assert_eq!(series.len(), cap);
    }
}
