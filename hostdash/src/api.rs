//! Request/response channel to the metrics source.

use std::time::Duration;

use reqwest::{header::COOKIE, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{ApiError, ClientError};
use crate::settings::ClientSettings;
use crate::types::{
    AuthConfig, Credential, HistoryResponse, ProcessSnapshot, SystemSnapshot, TimeRange,
};

pub const SYSTEM_PATH: &str = "/api/metrics/system";
pub const PROCESSES_PATH: &str = "/api/metrics/processes";
pub const HISTORY_PATH: &str = "/api/metrics/history";
pub const AUTH_CONFIG_PATH: &str = "/api/auth/config";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    cookie: Option<String>,
}

impl ApiClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .use_rustls_tls();
        if let Some(path) = &settings.tls_ca {
            let tls_err = |reason: String| ClientError::Tls {
                path: path.display().to_string(),
                reason,
            };
            let pem = std::fs::read(path).map_err(|e| tls_err(e.to_string()))?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| tls_err(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        Ok(Self {
            http: builder.build()?,
            base: settings.base_url.clone(),
            cookie: settings.session_cookie.clone(),
        })
    }

    pub async fn system(&self, credential: Option<&Credential>) -> Result<SystemSnapshot, ApiError> {
        self.get(self.endpoint(SYSTEM_PATH), credential).await
    }

    pub async fn processes(
        &self,
        credential: Option<&Credential>,
    ) -> Result<ProcessSnapshot, ApiError> {
        self.get(self.endpoint(PROCESSES_PATH), credential).await
    }

    pub async fn history(
        &self,
        credential: Option<&Credential>,
        range: TimeRange,
    ) -> Result<HistoryResponse, ApiError> {
        let mut url = self.endpoint(HISTORY_PATH);
        url.query_pairs_mut()
            .append_pair("hours", &range.hours().to_string());
        self.get(url, credential).await
    }

    pub async fn auth_config(&self) -> Result<AuthConfig, ApiError> {
        self.get(self.endpoint(AUTH_CONFIG_PATH), None).await
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query(None);
        url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        credential: Option<&Credential>,
    ) -> Result<T, ApiError> {
        debug!("GET {}", url.path());
        let mut req = self.http.get(url);
        if let Some(c) = credential {
            req = req.bearer_auth(c.expose());
        }
        if let Some(cookie) = &self.cookie {
            req = req.header(COOKIE, cookie.as_str());
        }
        let resp = req.send().await?;
        match resp.status() {
            // bearer-guarded sources answer 403 when the credential is missing
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized),
            s if !s.is_success() => Err(ApiError::Status(s)),
            _ => Ok(resp.json::<T>().await?),
        }
    }
}
