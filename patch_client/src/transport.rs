//! Remote content access.
//!
//! `RemoteServices` maps a file name to a primary and a fallback URL;
//! `ContentTransport` fetches one URL. Both are seams so tests can run the
//! whole pipeline without sockets.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use patch_shared::{
    error::NetworkError,
    net::{FrameConn, NetMsg, RemoteUrl, PROTOCOL_VERSION},
};
use tracing::{debug, warn};

/// Resolves where a package file lives on the content host.
pub trait RemoteServices: Send + Sync {
    fn remote_main_url(&self, file_name: &str) -> String;
    fn remote_fallback_url(&self, file_name: &str) -> String;
}

/// `RemoteServices` over a primary and a fallback host prefix.
#[derive(Debug, Clone)]
pub struct HostServices {
    default_host: String,
    fallback_host: String,
}

impl HostServices {
    pub fn new(default_host: impl Into<String>, fallback_host: impl Into<String>) -> Self {
        Self {
            default_host: default_host.into(),
            fallback_host: fallback_host.into(),
        }
    }
}

impl RemoteServices for HostServices {
    fn remote_main_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.default_host.trim_end_matches('/'), file_name)
    }

    fn remote_fallback_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.fallback_host.trim_end_matches('/'), file_name)
    }
}

/// Fetches the body behind a URL.
#[async_trait]
pub trait ContentTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, NetworkError>;
}

/// Transport speaking the framed content protocol, one connection per fetch.
#[derive(Debug, Default, Clone)]
pub struct FramedTransport;

impl FramedTransport {
    pub fn new() -> Self {
        Self
    }

    async fn fetch_inner(&self, url: &RemoteUrl) -> anyhow::Result<Result<Bytes, NetworkError>> {
        let mut conn = FrameConn::connect(&url.authority).await?;
        conn.send(&NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
        })
        .await?;
        match conn.recv().await? {
            NetMsg::Welcome { protocol } if protocol == PROTOCOL_VERSION => {}
            other => {
                return Ok(Err(NetworkError::Protocol(format!(
                    "expected Welcome, got {other:?}"
                ))))
            }
        }

        conn.send(&NetMsg::Fetch {
            path: url.path.clone(),
        })
        .await?;
        match conn.recv().await? {
            NetMsg::Payload { len, .. } => {
                let body = conn.recv_raw().await?;
                if body.len() as u64 != len {
                    return Ok(Err(NetworkError::Protocol(format!(
                        "announced {len} bytes, received {}",
                        body.len()
                    ))));
                }
                Ok(Ok(body))
            }
            NetMsg::NotFound { path } => Ok(Err(NetworkError::NotFound(path))),
            NetMsg::Error { message } => Ok(Err(NetworkError::Protocol(message))),
            other => Ok(Err(NetworkError::Protocol(format!(
                "unexpected reply {other:?}"
            )))),
        }
    }
}

#[async_trait]
impl ContentTransport for FramedTransport {
    async fn fetch(&self, url: &str) -> Result<Bytes, NetworkError> {
        let parsed = RemoteUrl::parse(url).map_err(|e| NetworkError::Protocol(e.to_string()))?;
        debug!(url = %url, "fetch");
        match self.fetch_inner(&parsed).await {
            Ok(result) => result,
            Err(e) => Err(NetworkError::Connection(format!("{e:#}"))),
        }
    }
}

/// Fetches `file_name` from the primary URL, then the fallback URL.
///
/// The fallback is skipped when it is the same URL as the primary.
pub async fn fetch_with_fallback(
    transport: &Arc<dyn ContentTransport>,
    remote: &Arc<dyn RemoteServices>,
    file_name: &str,
) -> Result<Bytes, NetworkError> {
    let main = remote.remote_main_url(file_name);
    let err = match transport.fetch(&main).await {
        Ok(bytes) => return Ok(bytes),
        Err(e) => e,
    };
    let fallback = remote.remote_fallback_url(file_name);
    if fallback == main {
        return Err(err);
    }
    warn!(file = %file_name, error = %err, "primary host failed, trying fallback");
    transport.fetch(&fallback).await
}
