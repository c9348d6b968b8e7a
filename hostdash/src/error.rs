//! Error types for the request channel, the stream handshake, the auth gate
//! and client construction.

use reqwest::StatusCode;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized (401/403)")]
    Unauthorized,
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credential")]
    InvalidCredential,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("websocket: {0}")]
    Ws(#[from] tungstenite::Error),
    #[error("invalid header value: {0}")]
    Header(#[from] tungstenite::http::header::InvalidHeaderValue),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid settings: {0}")]
    Settings(String),
    #[error("tls ca {path}: {reason}")]
    Tls { path: String, reason: String },
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("client task is no longer running")]
    Closed,
}
