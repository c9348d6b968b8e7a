//! Auth gate: one authentication state for both the stream and the
//! request/response channel.
//!
//! State changes are published on a `watch` channel; the client event loop
//! subscribes and tears the stream down whenever the state drops back to
//! `Unauthenticated`. A redirect-to-login notification is sent at most once per
//! failure episode: further failure signals are absorbed until the episode
//! ends (a successful `verify()` or `login()`, a `logout()`, or a new session
//! opened by an explicit `connect()`), so a flapping source cannot drive the
//! collaborator into a navigation loop.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::client::ClientEvent;
use crate::error::{ApiError, AuthError};
use crate::types::{AuthMode, AuthState, Credential};

pub struct AuthGate {
    api: ApiClient,
    state: watch::Sender<AuthState>,
    redirect_pending: AtomicBool,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl AuthGate {
    pub fn new(api: ApiClient, events: mpsc::UnboundedSender<ClientEvent>) -> Self {
        let (state, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            api,
            state,
            redirect_pending: AtomicBool::new(false),
            events,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.state.borrow().credential().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Asks the source which surface it expects, then verifies (edge mode) or
    /// logs in with `token` (token mode, skipped when no token is given).
    pub async fn bootstrap(&self, token: Option<&str>) -> Result<AuthMode, AuthError> {
        let cfg = self.api.auth_config().await?;
        info!("source auth mode: {:?}", cfg.mode);
        match (cfg.mode, token) {
            (AuthMode::Edge, _) => {
                self.verify().await?;
            }
            (AuthMode::Token, Some(t)) => self.login(t).await?,
            (AuthMode::Token, None) => debug!("token mode without a token; waiting for login"),
        }
        Ok(cfg.mode)
    }

    /// Probes a protected resource relying on the trusted edge (cookie).
    /// `Ok(false)` means "not yet": the edge prompts out of band.
    pub async fn verify(&self) -> Result<bool, AuthError> {
        match self.api.system(None).await {
            Ok(_) => {
                self.state.send_if_modified(|s| {
                    if matches!(s, AuthState::Unauthenticated) {
                        *s = AuthState::Cookie;
                        true
                    } else {
                        false
                    }
                });
                self.redirect_pending.store(false, Ordering::SeqCst);
                info!("edge authentication verified");
                Ok(true)
            }
            Err(ApiError::Unauthorized) => {
                info!("edge authentication not completed yet");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn login(&self, token: impl Into<String>) -> Result<(), AuthError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(AuthError::InvalidCredential);
        }
        let credential = Credential::new(token);
        match self.api.system(Some(&credential)).await {
            Ok(_) => {
                self.state.send_replace(AuthState::Token(credential));
                self.redirect_pending.store(false, Ordering::SeqCst);
                info!("token accepted");
                Ok(())
            }
            Err(ApiError::Unauthorized) => {
                warn!("token rejected");
                Err(AuthError::InvalidCredential)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Either channel reported an authentication failure.
    pub fn on_failure_signal(&self) {
        self.state.send_replace(AuthState::Unauthenticated);
        if self.redirect_pending.swap(true, Ordering::SeqCst) {
            debug!("auth failure while a login redirect is already pending");
            return;
        }
        warn!("authentication failed; login required");
        let _ = self.events.send(ClientEvent::LoginRequired);
    }

    pub fn logout(&self) {
        info!("logged out");
        self.redirect_pending.store(false, Ordering::SeqCst);
        self.state.send_replace(AuthState::Unauthenticated);
    }

    /// A new session starts a new failure episode.
    pub(crate) fn begin_session(&self) {
        self.redirect_pending.store(false, Ordering::SeqCst);
    }
}
