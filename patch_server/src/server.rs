//! Content host.
//!
//! Serves files under a content root to any number of concurrent clients.
//! Each connection performs the `Hello`/`Welcome` handshake, then answers
//! `Fetch` requests until the client hangs up.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
};

use patch_shared::{
    net::{is_disconnect, ContentListener, FrameConn, NetMsg, PROTOCOL_VERSION, URL_SCHEME},
    storage::safe_join,
};
use tracing::{debug, info, warn};

/// Content host bound to a listening socket.
pub struct ContentServer {
    listener: ContentListener,
    root: Arc<PathBuf>,
}

impl ContentServer {
    pub async fn bind(addr: SocketAddr, root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let listener = ContentListener::bind(addr).await?;
        let root = Arc::new(root.into());
        info!(addr = %listener.local_addr()?, root = %root.display(), "Content host bound");
        Ok(Self { listener, root })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `tcp://host:port` prefix clients use to reach this host.
    pub fn base_url(&self) -> anyhow::Result<String> {
        Ok(format!("{URL_SCHEME}{}", self.local_addr()?))
    }

    /// Accepts and serves exactly one connection.
    pub async fn serve_one(&self) -> anyhow::Result<()> {
        let (conn, peer) = self.listener.accept().await?;
        handle_connection(conn, peer, &self.root).await
    }

    /// Accepts connections forever, serving each on its own task.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            let (conn, peer) = self.listener.accept().await?;
            let root = Arc::clone(&self.root);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(conn, peer, &root).await {
                    warn!(%peer, error = %format!("{e:#}"), "Connection failed");
                }
            });
        }
    }
}

async fn handle_connection(mut conn: FrameConn, peer: SocketAddr, root: &Path) -> anyhow::Result<()> {
    match conn.recv().await? {
        NetMsg::Hello { protocol } if protocol == PROTOCOL_VERSION => {
            conn.send(&NetMsg::Welcome {
                protocol: PROTOCOL_VERSION,
            })
            .await?;
        }
        NetMsg::Hello { protocol } => {
            conn.send(&NetMsg::Error {
                message: format!("unsupported protocol {protocol}, expected {PROTOCOL_VERSION}"),
            })
            .await?;
            anyhow::bail!("client speaks protocol {protocol}");
        }
        other => anyhow::bail!("unexpected handshake msg: {other:?}"),
    }
    debug!(%peer, "Client connected");

    loop {
        // The client closing its end is the normal way a session ends.
        let msg = match conn.recv().await {
            Ok(msg) => msg,
            Err(e) if is_disconnect(&e) => {
                debug!(%peer, "Client disconnected");
                return Ok(());
            }
            Err(e) => return Err(e.context(format!("bad request from {peer}"))),
        };
        match msg {
            NetMsg::Fetch { path } => serve_file(&mut conn, root, path).await?,
            other => {
                conn.send(&NetMsg::Error {
                    message: format!("unexpected message {other:?}"),
                })
                .await?;
            }
        }
    }
}

async fn serve_file(conn: &mut FrameConn, root: &Path, path: String) -> anyhow::Result<()> {
    let Some(full) = safe_join(root, &path) else {
        warn!(path = %path, "Rejected path outside content root");
        return conn
            .send(&NetMsg::Error {
                message: format!("invalid path {path}"),
            })
            .await;
    };
    match tokio::fs::read(&full).await {
        Ok(body) => {
            debug!(path = %path, bytes = body.len(), "Serving file");
            conn.send(&NetMsg::Payload {
                path,
                len: body.len() as u64,
            })
            .await?;
            conn.send_raw(&body).await
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path, "Not found");
            conn.send(&NetMsg::NotFound { path }).await
        }
        Err(e) => {
            warn!(path = %path, error = %e, "Read failed");
            conn.send(&NetMsg::Error {
                message: format!("cannot read {path}"),
            })
            .await
        }
    }
}

/// Binds a content host on an ephemeral localhost port.
pub async fn bind_ephemeral(root: impl Into<PathBuf>) -> anyhow::Result<ContentServer> {
    ContentServer::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0), root).await
}
