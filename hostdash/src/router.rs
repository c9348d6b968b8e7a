//! Inbound message classification and dispatch into the store.
//!
//! Control tokens stay with the connection layer; structured frames are
//! applied here. A frame that does not parse never touches the store.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::store::MetricsStore;
use crate::types::{HistoryPoint, ProcessEntry, ProcessSnapshot, SystemSnapshot};

pub const PING: &str = "ping";
pub const PONG: &str = "pong";

/// Substrings of an `error` frame that mean the session was not authorized.
pub const AUTH_FAILURE_PATTERNS: [&str; 3] =
    ["Unauthorized", "Authentication required", "Invalid token"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub system: Option<SystemSnapshot>,
    #[serde(default)]
    pub processes: Option<Vec<ProcessEntry>>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug)]
pub enum Inbound {
    Ping,
    Pong,
    Frame(Frame),
    Malformed(String),
}

impl Inbound {
    pub fn classify(text: &str) -> Inbound {
        match text {
            PING => Inbound::Ping,
            PONG => Inbound::Pong,
            _ => match serde_json::from_str::<Frame>(text) {
                Ok(frame) => Inbound::Frame(frame),
                Err(e) => Inbound::Malformed(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Applied { system: bool, processes: bool },
    AuthFailure(String),
    ServerError(String),
    Empty,
}

pub fn is_auth_failure(message: &str) -> bool {
    AUTH_FAILURE_PATTERNS.iter().any(|p| message.contains(p))
}

/// Applies one structured frame. Each present field replaces the store's
/// current value and the sample is appended to history.
pub fn apply(frame: Frame, store: &mut MetricsStore) -> Dispatch {
    if let Some(err) = frame.error {
        if is_auth_failure(&err) {
            warn!("stream rejected credentials: {err}");
            return Dispatch::AuthFailure(err);
        }
        warn!("error frame from source: {err}");
        return Dispatch::ServerError(err);
    }

    let Frame {
        system,
        processes,
        timestamp,
        ..
    } = frame;
    if system.is_none() && processes.is_none() {
        debug!("frame without system or processes, ignoring");
        return Dispatch::Empty;
    }

    let ts = timestamp
        .or_else(|| system.as_ref().map(|s| s.timestamp))
        .unwrap_or_else(now_secs);

    store.append_history(HistoryPoint {
        timestamp: ts,
        system: system.clone(),
        processes: processes.clone(),
    });

    let applied = Dispatch::Applied {
        system: system.is_some(),
        processes: processes.is_some(),
    };
    if let Some(s) = system {
        store.set_system(s);
    }
    if let Some(list) = processes {
        store.set_processes(ProcessSnapshot {
            timestamp: ts,
            processes: list,
        });
    }
    applied
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
