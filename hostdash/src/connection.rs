//! Connection Manager state machine.
//!
//! Pure bookkeeping: every transition returns the side effects the event loop
//! must perform. State is the product of the session phase and the reconnect
//! policy, so "at most one armed reconnect timer" and "no reconnect after
//! teardown" are properties of this type alone.

use std::time::Duration;

use tracing::{debug, info};

use crate::types::{ConnectionPhase, ConnectionState};

pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Close codes the source uses to reject a session's credentials.
pub const AUTH_CLOSE_CODES: [u16; 2] = [1008, 4001];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reconnect {
    /// No timer armed; a close will arm one.
    #[default]
    Idle,
    /// Exactly one timer is pending.
    Armed,
    /// Torn down on purpose (disconnect or auth failure); closes do not re-arm
    /// until the next explicit `connect()`.
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    /// Socket ended without a close frame (network fault, failed dial).
    Transport,
    Code(u16),
    /// Handshake answered with 401/403.
    Rejected,
}

impl CloseCause {
    pub fn is_auth(self) -> bool {
        match self {
            CloseCause::Code(code) => AUTH_CLOSE_CODES.contains(&code),
            CloseCause::Rejected => true,
            CloseCause::Transport => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Open,
    Close,
    ScheduleReconnect(Duration),
    CancelReconnect,
    AuthFailure,
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    reconnect: Reconnect,
    delay: Duration,
}

impl ConnectionMachine {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: ConnectionState::default(),
            reconnect: Reconnect::Idle,
            delay,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.state.phase
    }

    pub fn reconnect(&self) -> Reconnect {
        self.reconnect
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// No-op while a session is open or opening.
    pub fn connect(&mut self) -> Vec<Action> {
        if self.state.phase != ConnectionPhase::Disconnected {
            debug!("connect ignored: session already {:?}", self.state.phase);
            return Vec::new();
        }
        let mut actions = Vec::with_capacity(2);
        if self.reconnect == Reconnect::Armed {
            actions.push(Action::CancelReconnect);
        }
        self.reconnect = Reconnect::Idle;
        self.state.phase = ConnectionPhase::Connecting;
        actions.push(Action::Open);
        actions
    }

    pub fn opened(&mut self) {
        info!("stream connected");
        self.state.phase = ConnectionPhase::Connected;
        self.state.last_error = None;
    }

    pub fn failed(&mut self, error: impl Into<String>) {
        self.state.last_error = Some(error.into());
        self.state.phase = ConnectionPhase::Disconnected;
    }

    pub fn closed(&mut self, cause: CloseCause) -> Vec<Action> {
        self.state.phase = ConnectionPhase::Disconnected;
        if cause.is_auth() {
            info!("stream closed: authentication rejected ({cause:?})");
            let was_armed = self.reconnect == Reconnect::Armed;
            self.reconnect = Reconnect::Halted;
            return if was_armed {
                vec![Action::CancelReconnect, Action::AuthFailure]
            } else {
                vec![Action::AuthFailure]
            };
        }
        match self.reconnect {
            Reconnect::Idle => {
                info!(
                    "stream closed ({cause:?}), reconnecting in {:?}",
                    self.delay
                );
                self.reconnect = Reconnect::Armed;
                vec![Action::ScheduleReconnect(self.delay)]
            }
            Reconnect::Armed | Reconnect::Halted => Vec::new(),
        }
    }

    /// Reconnect timer fired.
    pub fn reconnect_due(&mut self) -> Vec<Action> {
        if self.reconnect != Reconnect::Armed {
            return Vec::new();
        }
        self.reconnect = Reconnect::Idle;
        if self.state.phase != ConnectionPhase::Disconnected {
            return Vec::new();
        }
        info!("attempting to reconnect");
        self.state.phase = ConnectionPhase::Connecting;
        vec![Action::Open]
    }

    /// Safe from any state; leaves no timer armed.
    pub fn disconnect(&mut self) -> Vec<Action> {
        self.halt()
    }

    /// Credentials were revoked: tear down and stay down.
    pub fn auth_revoked(&mut self) -> Vec<Action> {
        self.halt()
    }

    fn halt(&mut self) -> Vec<Action> {
        let mut actions = Vec::with_capacity(2);
        if self.reconnect == Reconnect::Armed {
            actions.push(Action::CancelReconnect);
        }
        if self.state.phase != ConnectionPhase::Disconnected {
            actions.push(Action::Close);
        }
        self.reconnect = Reconnect::Halted;
        self.state.phase = ConnectionPhase::Disconnected;
        actions
    }
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new(RECONNECT_DELAY)
    }
}
