//! Client event loop.
//!
//! One task owns the connection state machine, the live socket, the pending
//! dial and the reconnect deadline. Commands from [`ClientHandle`], inbound
//! frames, the reconnect timer and auth-state changes are all handled by
//! `select!` in that task, so no two handlers ever run concurrently and frames
//! are applied in the order they arrive. The store is only written here.

use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::api::ApiClient;
use crate::auth::AuthGate;
use crate::connection::{Action, CloseCause, ConnectionMachine};
use crate::downsample::RenderPoint;
use crate::error::{ApiError, ClientError, SessionError};
use crate::router::{self, Dispatch, Inbound, PONG};
use crate::settings::ClientSettings;
use crate::store::{MetricsStore, SharedStore};
use crate::types::{
    AuthState, ConnectionState, HistoryPoint, ProcessSnapshot, SystemSnapshot, TimeRange,
};
use crate::ws::{self, TlsConfig, WsStream};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connection(ConnectionState),
    Updated { system: bool, processes: bool },
    HistoryReplaced(usize),
    ServerError(String),
    /// Credentials were rejected on either channel; show the login flow.
    LoginRequired,
}

#[derive(Debug)]
enum Seed {
    System(SystemSnapshot),
    Processes(ProcessSnapshot),
    History(TimeRange, Vec<HistoryPoint>),
}

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
    Seed(Seed),
    SetTimeRange(TimeRange),
    Shutdown(oneshot::Sender<()>),
}

type Dial = Pin<Box<dyn Future<Output = Result<WsStream, SessionError>> + Send>>;

pub struct MetricsClient {
    settings: ClientSettings,
    stream_url: Url,
    tls: Option<TlsConfig>,
    machine: ConnectionMachine,
    published: ConnectionState,
    store: SharedStore,
    auth: Arc<AuthGate>,
    auth_rx: watch::Receiver<AuthState>,
    events: mpsc::UnboundedSender<ClientEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    socket: Option<WsStream>,
    dialing: Option<Dial>,
    reconnect_at: Option<Instant>,
}

impl MetricsClient {
    /// Validates `settings`, builds both channels and spawns the event loop on
    /// the current tokio runtime.
    pub fn spawn(
        settings: ClientSettings,
    ) -> Result<(ClientHandle, mpsc::UnboundedReceiver<ClientEvent>), ClientError> {
        settings.validate()?;
        let stream_url = ws::stream_url(&settings.base_url, &settings.stream_path)?;
        let tls = settings
            .tls_ca
            .as_deref()
            .map(ws::load_tls_config)
            .transpose()?;
        let api = ApiClient::new(&settings)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let auth = Arc::new(AuthGate::new(api.clone(), event_tx.clone()));
        let store = MetricsStore::new(settings.history_capacity, settings.time_range).shared();

        let handle = ClientHandle {
            commands: cmd_tx,
            store: store.clone(),
            auth: auth.clone(),
            api,
            max_render_points: settings.max_render_points,
        };
        let client = MetricsClient {
            machine: ConnectionMachine::new(settings.reconnect_delay),
            settings,
            stream_url,
            tls,
            published: ConnectionState::default(),
            store,
            auth_rx: auth.subscribe(),
            auth,
            events: event_tx,
            commands: cmd_rx,
            socket: None,
            dialing: None,
            reconnect_at: None,
        };
        tokio::spawn(client.run());
        Ok((handle, event_rx))
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown(done)) => {
                        self.teardown().await;
                        let _ = done.send(());
                        break;
                    }
                    Some(cmd) => self.on_command(cmd).await,
                    None => {
                        self.teardown().await;
                        break;
                    }
                },
                res = dial(&mut self.dialing), if self.dialing.is_some() => {
                    self.dialing = None;
                    self.on_dialed(res).await;
                }
                msg = next_message(&mut self.socket), if self.socket.is_some() => {
                    self.on_message(msg).await;
                }
                _ = reconnect_timer(self.reconnect_at), if self.reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    let actions = self.machine.reconnect_due();
                    self.perform(actions).await;
                }
                Ok(()) = self.auth_rx.changed() => {
                    let revoked = !self.auth_rx.borrow_and_update().is_authenticated();
                    if revoked {
                        let actions = self.machine.auth_revoked();
                        self.perform(actions).await;
                    }
                }
            }
        }
        debug!("client loop stopped");
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => {
                let actions = self.machine.connect();
                if actions.contains(&Action::Open) {
                    self.auth.begin_session();
                }
                self.perform(actions).await;
            }
            Command::Disconnect => {
                let actions = self.machine.disconnect();
                self.perform(actions).await;
            }
            Command::Seed(seed) => self.apply_seed(seed).await,
            Command::SetTimeRange(range) => {
                self.store.write().await.set_time_range(range);
            }
            Command::Shutdown(_) => {}
        }
    }

    async fn perform(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Open => self.open(),
                Action::Close => self.close_socket().await,
                Action::ScheduleReconnect(delay) => {
                    self.reconnect_at = Some(Instant::now() + delay);
                }
                Action::CancelReconnect => self.reconnect_at = None,
                Action::AuthFailure => self.auth.on_failure_signal(),
            }
        }
        self.publish_state().await;
    }

    fn open(&mut self) {
        let credential = self.auth.credential();
        let url = ws::with_credential(&self.stream_url, credential.as_ref());
        info!("connecting to {}", ws::redacted(&url));
        let cookie = self.settings.session_cookie.clone();
        let tls = self.tls.clone();
        let fut: Dial = Box::pin(async move { ws::connect(&url, cookie.as_deref(), tls).await });
        self.dialing = Some(fut);
    }

    async fn close_socket(&mut self) {
        self.dialing = None;
        if let Some(mut socket) = self.socket.take() {
            match timeout(CLOSE_TIMEOUT, socket.close(None)).await {
                Ok(Ok(())) => debug!("stream closed"),
                Ok(Err(e)) => debug!("error while closing stream: {e}"),
                Err(_) => debug!("timed out closing stream"),
            }
        }
    }

    async fn on_dialed(&mut self, res: Result<WsStream, SessionError>) {
        match res {
            Ok(socket) => {
                self.socket = Some(socket);
                self.machine.opened();
                self.publish_state().await;
            }
            Err(e) => {
                warn!("stream connect failed: {e}");
                let cause = ws::handshake_cause(&e);
                self.machine.failed(e.to_string());
                let actions = self.machine.closed(cause);
                self.perform(actions).await;
            }
        }
    }

    async fn on_message(&mut self, msg: Option<Result<Message, tungstenite::Error>>) {
        match msg {
            Some(Ok(Message::Text(text))) => self.on_text(&text).await,
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => self.on_text(text).await,
                Err(_) => warn!("dropping non-utf8 binary frame ({} bytes)", bytes.len()),
            },
            Some(Ok(Message::Close(frame))) => {
                let cause = ws::close_cause(frame.as_ref());
                // flushes the close reply tungstenite queued
                self.close_socket().await;
                let actions = self.machine.closed(cause);
                self.perform(actions).await;
            }
            // protocol-level ping/pong is answered by tungstenite itself
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("stream error: {e}");
                self.socket = None;
                self.machine.failed(e.to_string());
                let actions = self.machine.closed(CloseCause::Transport);
                self.perform(actions).await;
            }
            None => {
                self.socket = None;
                let actions = self.machine.closed(CloseCause::Transport);
                self.perform(actions).await;
            }
        }
    }

    async fn on_text(&mut self, text: &str) {
        match Inbound::classify(text) {
            Inbound::Ping => {
                if let Some(socket) = self.socket.as_mut() {
                    if let Err(e) = socket.send(Message::Text(PONG.into())).await {
                        warn!("failed to answer keepalive: {e}");
                    }
                }
            }
            Inbound::Pong => debug!("keepalive pong"),
            Inbound::Malformed(e) => warn!("dropping malformed frame: {e}"),
            Inbound::Frame(frame) => {
                let dispatch = {
                    let mut store = self.store.write().await;
                    router::apply(frame, &mut store)
                };
                match dispatch {
                    Dispatch::Applied { system, processes } => {
                        self.emit(ClientEvent::Updated { system, processes });
                    }
                    Dispatch::AuthFailure(_) => {
                        let actions = self.machine.auth_revoked();
                        self.perform(actions).await;
                        self.auth.on_failure_signal();
                    }
                    Dispatch::ServerError(msg) => self.emit(ClientEvent::ServerError(msg)),
                    Dispatch::Empty => {}
                }
            }
        }
    }

    async fn apply_seed(&mut self, seed: Seed) {
        let mut store = self.store.write().await;
        match seed {
            Seed::System(snapshot) => {
                // a slow fetch must not overtake a newer live frame
                if store
                    .system()
                    .is_some_and(|cur| cur.timestamp > snapshot.timestamp)
                {
                    debug!("ignoring stale system snapshot");
                    return;
                }
                store.set_system(snapshot);
                self.emit(ClientEvent::Updated {
                    system: true,
                    processes: false,
                });
            }
            Seed::Processes(snapshot) => {
                if store
                    .processes()
                    .is_some_and(|cur| cur.timestamp > snapshot.timestamp)
                {
                    debug!("ignoring stale process snapshot");
                    return;
                }
                store.set_processes(snapshot);
                self.emit(ClientEvent::Updated {
                    system: false,
                    processes: true,
                });
            }
            Seed::History(range, points) => {
                if store.time_range() != range {
                    debug!(
                        "dropping {range} history; window is now {}",
                        store.time_range()
                    );
                    return;
                }
                store.replace_history(points);
                self.emit(ClientEvent::HistoryReplaced(store.history().len()));
            }
        }
    }

    async fn publish_state(&mut self) {
        let state = self.machine.state().clone();
        if state == self.published {
            return;
        }
        self.store.write().await.set_connection_state(state.clone());
        self.published = state.clone();
        self.emit(ClientEvent::Connection(state));
    }

    async fn teardown(&mut self) {
        let actions = self.machine.disconnect();
        self.perform(actions).await;
        self.store.write().await.reset();
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

async fn dial(pending_dial: &mut Option<Dial>) -> Result<WsStream, SessionError> {
    match pending_dial {
        Some(fut) => fut.as_mut().await,
        None => pending().await,
    }
}

async fn next_message(
    socket: &mut Option<WsStream>,
) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(ws) => ws.next().await,
        None => pending().await,
    }
}

async fn reconnect_timer(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}

/// Cheap to clone; every clone drives the same client.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<Command>,
    store: SharedStore,
    auth: Arc<AuthGate>,
    api: ApiClient,
    max_render_points: usize,
}

impl ClientHandle {
    pub fn connect(&self) -> Result<(), ClientError> {
        self.send(Command::Connect)
    }

    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.send(Command::Disconnect)
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn auth(&self) -> &Arc<AuthGate> {
        &self.auth
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub async fn render(&self) -> Vec<RenderPoint> {
        self.store.read().await.render(self.max_render_points)
    }

    /// Fetches both current snapshots and hands them to the event loop.
    pub async fn refresh_snapshots(&self) -> Result<(), ClientError> {
        let credential = self.auth.credential();
        let system = self.guard(self.api.system(credential.as_ref()).await)?;
        self.send(Command::Seed(Seed::System(system)))?;
        let processes = self.guard(self.api.processes(credential.as_ref()).await)?;
        self.send(Command::Seed(Seed::Processes(processes)))
    }

    /// Replaces the history series with the window currently selected.
    pub async fn load_history(&self) -> Result<usize, ClientError> {
        let range = self.store.read().await.time_range();
        self.fetch_history(range).await
    }

    pub async fn set_time_range(&self, range: TimeRange) -> Result<usize, ClientError> {
        self.send(Command::SetTimeRange(range))?;
        self.fetch_history(range).await
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx))?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    async fn fetch_history(&self, range: TimeRange) -> Result<usize, ClientError> {
        let credential = self.auth.credential();
        let resp = self.guard(self.api.history(credential.as_ref(), range).await)?;
        let n = resp.data.len();
        self.send(Command::Seed(Seed::History(range, resp.data)))?;
        Ok(n)
    }

    // A 401 on the request channel is the same signal as a rejected stream
    fn guard<T>(&self, res: Result<T, ApiError>) -> Result<T, ClientError> {
        if res.as_ref().is_err_and(ApiError::is_unauthorized) {
            self.auth.on_failure_signal();
        }
        Ok(res?)
    }

    fn send(&self, cmd: Command) -> Result<(), ClientError> {
        self.commands.send(cmd).map_err(|_| ClientError::Closed)
    }
}
