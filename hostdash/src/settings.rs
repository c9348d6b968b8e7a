//! Runtime knobs for one client instance.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::connection::RECONNECT_DELAY;
use crate::downsample::MAX_RENDER_POINTS;
use crate::error::ClientError;
use crate::history::HISTORY_CAPACITY;
use crate::types::TimeRange;

pub const DEFAULT_STREAM_PATH: &str = "/ws/metrics";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// http(s) origin of the metrics source; the stream URL is derived from it.
    pub base_url: Url,
    pub stream_path: String,
    pub reconnect_delay: Duration,
    pub history_capacity: usize,
    pub max_render_points: usize,
    pub time_range: TimeRange,
    /// PEM bundle trusted in addition to the built-in roots.
    pub tls_ca: Option<PathBuf>,
    /// Forwarded verbatim as a `Cookie` header on both channels.
    pub session_cookie: Option<String>,
}

impl ClientSettings {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            stream_path: DEFAULT_STREAM_PATH.into(),
            reconnect_delay: RECONNECT_DELAY,
            history_capacity: HISTORY_CAPACITY,
            max_render_points: MAX_RENDER_POINTS,
            time_range: TimeRange::default(),
            tls_ca: None,
            session_cookie: None,
        })
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let scheme = self.base_url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ClientError::Settings(format!(
                "base_url must be http or https, got {scheme}"
            )));
        }
        if !self.stream_path.starts_with('/') {
            return Err(ClientError::Settings(format!(
                "stream_path must start with '/', got {:?}",
                self.stream_path
            )));
        }
        if self.reconnect_delay.is_zero() {
            return Err(ClientError::Settings("reconnect_delay must be > 0".into()));
        }
        if self.history_capacity == 0 {
            return Err(ClientError::Settings(
                "history_capacity must be > 0".into(),
            ));
        }
        if self.max_render_points == 0 {
            return Err(ClientError::Settings(
                "max_render_points must be > 0".into(),
            ));
        }
        if let Some(cookie) = &self.session_cookie {
            if cookie.trim().is_empty() {
                return Err(ClientError::Settings(
                    "session_cookie must not be blank".into(),
                ));
            }
        }
        Ok(())
    }
}
