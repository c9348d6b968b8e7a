//! WebSocket transport helpers: stream URL derivation, handshake (with optional
//! custom CA and session cookie) and mapping of how a session ended.

use std::{fs::File, io::BufReader, path::Path, sync::Arc};

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{
    self,
    client::IntoClientRequest,
    http::header::{HeaderValue, COOKIE},
    protocol::CloseFrame,
};
use tokio_tungstenite::{
    connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream,
};
use url::Url;

use crate::connection::CloseCause;
use crate::error::{ClientError, SessionError};
use crate::types::Credential;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub type TlsConfig = Arc<rustls::ClientConfig>;

// http -> ws, https -> wss
pub fn stream_url(base: &Url, path: &str) -> Result<Url, ClientError> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::Settings(format!("cannot derive stream url from {base}")))?;
    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// The credential rides as `?token=` on the upgrade request.
pub fn with_credential(url: &Url, credential: Option<&Credential>) -> Url {
    let mut url = url.clone();
    if let Some(c) = credential {
        url.query_pairs_mut().append_pair("token", c.expose());
    }
    url
}

// scheme://host[:port]/path, never the query (it may carry the token)
pub fn redacted(url: &Url) -> String {
    let host = url.host_str().unwrap_or("?");
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// Builds a rustls config trusting only the certificates in `path`.
pub fn load_tls_config(path: &Path) -> Result<TlsConfig, ClientError> {
    let tls_err = |reason: String| ClientError::Tls {
        path: path.display().to_string(),
        reason,
    };
    let file = File::open(path).map_err(|e| tls_err(e.to_string()))?;
    let mut reader = BufReader::new(file);
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut reader) {
        let cert = cert.map_err(|e| tls_err(e.to_string()))?;
        roots.add(cert).map_err(|e| tls_err(e.to_string()))?;
    }
    if roots.is_empty() {
        return Err(tls_err("no certificates found".into()));
    }
    let cfg = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(cfg))
}

// Connect to the source and return the WS stream
pub async fn connect(
    url: &Url,
    cookie: Option<&str>,
    tls: Option<TlsConfig>,
) -> Result<WsStream, SessionError> {
    let mut request = url.as_str().into_client_request()?;
    if let Some(c) = cookie {
        request.headers_mut().insert(COOKIE, HeaderValue::from_str(c)?);
    }
    let connector = tls.map(Connector::Rustls);
    let (ws, _) = connect_async_tls_with_config(request, None, false, connector).await?;
    Ok(ws)
}

pub fn close_cause(frame: Option<&CloseFrame<'_>>) -> CloseCause {
    match frame {
        Some(f) => CloseCause::Code(u16::from(f.code)),
        None => CloseCause::Transport,
    }
}

/// A 401/403 answer to the upgrade request is a credential rejection; any
/// other failure is transient.
pub fn handshake_cause(err: &SessionError) -> CloseCause {
    match err {
        SessionError::Ws(tungstenite::Error::Http(resp))
            if resp.status().as_u16() == 401 || resp.status().as_u16() == 403 =>
        {
            CloseCause::Rejected
        }
        _ => CloseCause::Transport,
    }
}
