//! Types that mirror the metrics source's JSON schema, plus the client-side
//! connection and auth state shared across modules.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    // seconds since epoch
    pub timestamp: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_gb: f64,
    pub memory_total_gb: f64,
    pub disk_percent: f64,
    pub disk_used_gb: f64,
    pub disk_total_gb: f64,
    pub boot_time: f64,
}

/// One watched process. The optional fields are `None` when the process is
/// not running or the source could not read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub name: String,
    pub running: bool,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub memory_percent: Option<f64>,
    #[serde(default)]
    pub uptime_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub timestamp: f64,
    pub processes: Vec<ProcessEntry>,
}

impl ProcessSnapshot {
    pub fn get(&self, name: &str) -> Option<&ProcessEntry> {
        self.processes.iter().find(|p| p.name == name)
    }

    pub fn running_count(&self) -> usize {
        self.processes.iter().filter(|p| p.running).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: f64,
    #[serde(default)]
    pub system: Option<SystemSnapshot>,
    #[serde(default)]
    pub processes: Option<Vec<ProcessEntry>>,
}

/// Body of `GET /api/metrics/history?hours=N`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    pub hours: u32,
    pub data: Vec<HistoryPoint>,
}

/// Reporting window. Only the two windows the source serves are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum TimeRange {
    #[default]
    Day,
    Week,
}

impl TimeRange {
    pub fn hours(self) -> u32 {
        match self {
            TimeRange::Day => 24,
            TimeRange::Week => 168,
        }
    }
}

impl TryFrom<u32> for TimeRange {
    type Error = String;

    fn try_from(hours: u32) -> Result<Self, Self::Error> {
        match hours {
            24 => Ok(TimeRange::Day),
            168 => Ok(TimeRange::Week),
            other => Err(format!("unsupported time range: {other}h (expected 24 or 168)")),
        }
    }
}

impl From<TimeRange> for u32 {
    fn from(r: TimeRange) -> u32 {
        r.hours()
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}h", self.hours())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub phase: ConnectionPhase,
    pub last_error: Option<String>,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }
}

/// Bearer token. Debug output never shows the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    // verified by a trusted edge in front of the source; no credential held
    Cookie,
    Token(Credential),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthState::Unauthenticated)
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            AuthState::Token(c) => Some(c),
            _ => None,
        }
    }
}

/// Which authentication surface the source expects (`GET /api/auth/config`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Token,
    #[serde(alias = "cloudflare_access")]
    Edge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
}
