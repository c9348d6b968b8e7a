//! Headless watcher: authenticates, seeds the store, keeps the stream up and
//! prints one status line per update.

use anyhow::bail;
use tracing::{info, warn};

use crate::client::{ClientEvent, ClientHandle, MetricsClient};
use crate::error::{ApiError, AuthError};
use crate::format::{format_percent, format_uptime, usage_level, Resource, UsageLevel};
use crate::settings::ClientSettings;
use crate::store::MetricsStore;
use crate::types::{AuthMode, ConnectionPhase};

pub struct App {
    settings: ClientSettings,
    token: Option<String>,
}

impl App {
    pub fn new(settings: ClientSettings, token: Option<String>) -> Self {
        Self { settings, token }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let (client, mut events) = MetricsClient::spawn(self.settings.clone())?;

        self.authenticate(&client).await?;

        if let Err(e) = client.refresh_snapshots().await {
            warn!("initial snapshot fetch failed: {e}");
        }
        if let Err(e) = client.load_history().await {
            warn!("history fetch failed: {e}");
        }
        client.connect()?;

        loop {
            tokio::select! {
                ev = events.recv() => {
                    let Some(ev) = ev else { break };
                    match ev {
                        ClientEvent::LoginRequired => {
                            let _ = client.shutdown().await;
                            bail!("authentication rejected by the source; log in again");
                        }
                        ClientEvent::Updated { .. } => {
                            let store = client.store();
                            let store = store.read().await;
                            let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
                            println!("{}", status_line(&store, self.settings.max_render_points, now));
                        }
                        ClientEvent::Connection(state) => match (state.phase, state.last_error) {
                            (ConnectionPhase::Disconnected, Some(err)) => warn!("disconnected: {err}"),
                            (phase, _) => info!("stream {phase:?}"),
                        },
                        ClientEvent::HistoryReplaced(n) => info!("history window loaded: {n} samples"),
                        ClientEvent::ServerError(msg) => warn!("source reported: {msg}"),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    client.shutdown().await?;
                    break;
                }
            }
        }
        Ok(())
    }

    async fn authenticate(&self, client: &ClientHandle) -> anyhow::Result<()> {
        let auth = client.auth();
        let token = self.token.as_deref();
        let mode = match auth.bootstrap(token).await {
            Ok(mode) => mode,
            // sources without /api/auth/config: infer the mode from what we hold
            Err(AuthError::Api(ApiError::Status(s))) if s.as_u16() == 404 => match token {
                Some(t) => {
                    auth.login(t).await?;
                    AuthMode::Token
                }
                None => {
                    auth.verify().await?;
                    AuthMode::Edge
                }
            },
            Err(AuthError::InvalidCredential) => bail!("invalid token"),
            Err(e) => return Err(e.into()),
        };
        if !auth.is_authenticated() {
            match mode {
                AuthMode::Token => {
                    bail!("the source requires a token: pass --token or set HOSTDASH_TOKEN")
                }
                AuthMode::Edge => bail!("edge authentication not completed: pass --cookie"),
            }
        }
        Ok(())
    }
}

/// One-line summary of the store, e.g.
/// `cpu 12.5% [normal] | mem 40.0% 6.40/16.00 GB | disk 71.0% [elevated] | up 2h 5m | procs 3/5 | history 120 (render 120)`.
pub fn status_line(store: &MetricsStore, max_render_points: usize, now: f64) -> String {
    let sys = store.system();
    let cpu = sys.map(|s| s.cpu_percent);
    let mem = sys.map(|s| s.memory_percent);
    let disk = sys.map(|s| s.disk_percent);
    let mem_gb = sys
        .map(|s| format!("{:.2}/{:.2} GB", s.memory_used_gb, s.memory_total_gb))
        .unwrap_or_else(|| "--/-- GB".into());
    let procs = store
        .processes()
        .map(|p| format!("{}/{}", p.running_count(), p.processes.len()))
        .unwrap_or_else(|| "--".into());
    let rendered = store.render(max_render_points).len();
    format!(
        "cpu {} [{}] | mem {} {} [{}] | disk {} [{}] | up {} | procs {} | history {} (render {})",
        format_percent(cpu),
        level_name(usage_level(Resource::Cpu, cpu)),
        format_percent(mem),
        mem_gb,
        level_name(usage_level(Resource::Memory, mem)),
        format_percent(disk),
        level_name(usage_level(Resource::Disk, disk)),
        format_uptime(sys.map(|s| s.boot_time), now),
        procs,
        store.history().len(),
        rendered,
    )
}

fn level_name(level: UsageLevel) -> &'static str {
    match level {
        UsageLevel::Unknown => "?",
        UsageLevel::Normal => "normal",
        UsageLevel::Elevated => "elevated",
        UsageLevel::Critical => "critical",
    }
}
