// Shared test helpers: sample payloads and a scripted fake metrics source.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hostdash::types::{HistoryPoint, ProcessEntry, SystemSnapshot};
use hostdash::{ClientEvent, ClientSettings};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

pub fn system_at(timestamp: f64, cpu_percent: f64) -> SystemSnapshot {
    SystemSnapshot {
        timestamp,
        cpu_percent,
        memory_percent: 40.0,
        memory_used_gb: 6.4,
        memory_total_gb: 16.0,
        disk_percent: 71.0,
        disk_used_gb: 355.0,
        disk_total_gb: 500.0,
        boot_time: 1_700_000_000.0,
    }
}

pub fn process(name: &str, running: bool) -> ProcessEntry {
    ProcessEntry {
        name: name.into(),
        running,
        pid: running.then_some(4242),
        port: None,
        cpu_percent: running.then_some(1.5),
        memory_percent: running.then_some(0.8),
        uptime_seconds: running.then_some(3600.0),
    }
}

pub fn point(timestamp: f64) -> HistoryPoint {
    HistoryPoint {
        timestamp,
        system: Some(system_at(timestamp, 10.0)),
        processes: None,
    }
}

pub fn system_frame(snapshot: &SystemSnapshot) -> String {
    json!({ "timestamp": snapshot.timestamp, "system": snapshot }).to_string()
}

/// What one accepted stream connection does, in order.
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    Sleep(u64),
    Close(u16),
    /// Read (and record) client messages until the client goes away.
    Hold,
}

#[derive(Default)]
pub struct SourceState {
    pub token: Option<String>,
    /// Answer rejected REST calls with 403 instead of 401.
    pub forbid: bool,
    pub auth_mode: Option<&'static str>,
    pub attempts: AtomicUsize,
    pub connections: AtomicUsize,
    pub close_replies: AtomicUsize,
    pub scripts: Mutex<VecDeque<Vec<Step>>>,
    pub received: Mutex<Vec<String>>,
    pub history_sizes: HashMap<u32, usize>,
}

impl SourceState {
    fn authorized(&self, bearer: Option<&str>) -> bool {
        match &self.token {
            Some(expected) => bearer == Some(expected.as_str()),
            None => true,
        }
    }

    fn rejection(&self) -> Response {
        if self.forbid {
            StatusCode::FORBIDDEN.into_response()
        } else {
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

pub struct FakeSource {
    pub addr: SocketAddr,
    pub state: Arc<SourceState>,
}

impl FakeSource {
    pub async fn start(state: SourceState) -> Self {
        let state = Arc::new(state);
        let app = Router::new()
            .route("/ws/metrics", get(ws_handler))
            .route("/api/metrics/system", get(system_handler))
            .route("/api/metrics/processes", get(processes_handler))
            .route("/api/metrics/history", get(history_handler))
            .route("/api/auth/config", get(auth_config_handler))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake source");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn settings(&self, reconnect_ms: u64) -> ClientSettings {
        let mut s = ClientSettings::new(&self.base_url()).expect("settings");
        s.reconnect_delay = Duration::from_millis(reconnect_ms);
        s
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    pub fn close_replies(&self) -> usize {
        self.state.close_replies.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().unwrap().clone()
    }
}

pub fn scripts(list: Vec<Vec<Step>>) -> Mutex<VecDeque<Vec<Step>>> {
    Mutex::new(list.into_iter().collect())
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SourceState>>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    state.attempts.fetch_add(1, Ordering::SeqCst);
    if !state.authorized(q.get("token").map(String::as_str)) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.connections.fetch_add(1, Ordering::SeqCst);
    let steps = state
        .scripts
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| vec![Step::Hold]);
    ws.on_upgrade(move |socket| run_script(socket, steps, state))
}

async fn run_script(mut socket: WebSocket, steps: Vec<Step>, state: Arc<SourceState>) {
    for step in steps {
        match step {
            Step::Text(t) => {
                if socket.send(Message::Text(t)).await.is_err() {
                    return;
                }
            }
            Step::Sleep(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            Step::Close(code) => {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: "".into(),
                    })))
                    .await;
                let reply = tokio::time::timeout(Duration::from_secs(2), socket.recv()).await;
                if let Ok(Some(Ok(Message::Close(_)))) = reply {
                    state.close_replies.fetch_add(1, Ordering::SeqCst);
                }
                return;
            }
            Step::Hold => break,
        }
    }
    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(t) => state.received.lock().unwrap().push(t),
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn system_handler(State(state): State<Arc<SourceState>>, headers: HeaderMap) -> Response {
    if !state.authorized(bearer(&headers)) {
        return state.rejection();
    }
    Json(system_at(1_700_000_100.0, 12.5)).into_response()
}

async fn processes_handler(State(state): State<Arc<SourceState>>, headers: HeaderMap) -> Response {
    if !state.authorized(bearer(&headers)) {
        return state.rejection();
    }
    Json(json!({
        "timestamp": 1_700_000_100.0,
        "processes": [process("Gateway", true), process("Tunnel", false)],
    }))
    .into_response()
}

async fn history_handler(
    State(state): State<Arc<SourceState>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    if !state.authorized(bearer(&headers)) {
        return state.rejection();
    }
    let hours: u32 = q.get("hours").and_then(|h| h.parse().ok()).unwrap_or(24);
    let n = state.history_sizes.get(&hours).copied().unwrap_or(0);
    let data: Vec<HistoryPoint> = (0..n).map(|i| point(1_700_000_000.0 + i as f64 * 5.0)).collect();
    Json(json!({ "hours": hours, "data_points": n, "data": data })).into_response()
}

async fn auth_config_handler(State(state): State<Arc<SourceState>>) -> Response {
    match state.auth_mode {
        Some(mode) => Json(json!({ "mode": mode })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Waits for the first event matching `pred`, or `None` after `within`.
pub async fn wait_for<F>(
    events: &mut UnboundedReceiver<ClientEvent>,
    within: Duration,
    mut pred: F,
) -> Option<ClientEvent>
where
    F: FnMut(&ClientEvent) -> bool,
{
    tokio::time::timeout(within, async {
        while let Some(ev) = events.recv().await {
            if pred(&ev) {
                return Some(ev);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Everything already queued, without waiting.
pub fn drain(events: &mut UnboundedReceiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = events.try_recv() {
        out.push(ev);
    }
    out
}

pub async fn wait_until<F: Fn() -> bool>(within: Duration, cond: F) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
