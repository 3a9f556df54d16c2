//! Content protocol.
//!
//! Goals:
//! - One request per connection: handshake, fetch, response.
//! - Control messages are length-prefixed JSON frames.
//! - File bodies travel as raw length-prefixed frames after a `Payload` header.
//!
//! Remote URLs take the form `tcp://host:port/<path>`.

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on a single frame.
pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// URL scheme understood by the content transport.
pub const URL_SCHEME: &str = "tcp://";

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NetMsg {
    // ─── Handshake ───
    Hello {
        protocol: u32,
    },
    Welcome {
        protocol: u32,
    },

    // ─── Content ───
    /// Client asks for a file relative to the host's content root.
    Fetch {
        path: String,
    },
    /// Host announces a body of `len` bytes in the next raw frame.
    Payload {
        path: String,
        len: u64,
    },
    NotFound {
        path: String,
    },

    // ─── Failure ───
    Error {
        message: String,
    },
}

/// A parsed `tcp://host:port/path` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    /// `host:port`
    pub authority: String,
    /// Path below the content root, without a leading slash.
    pub path: String,
}

impl RemoteUrl {
    pub fn parse(url: &str) -> anyhow::Result<Self> {
        let rest = url
            .strip_prefix(URL_SCHEME)
            .with_context(|| format!("unsupported url scheme in `{url}`"))?;
        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };
        if authority.is_empty() {
            anyhow::bail!("missing host in `{url}`");
        }
        Ok(Self {
            authority: authority.to_string(),
            path: path.trim_matches('/').to_string(),
        })
    }
}

/// Framed connection over TCP.
#[derive(Debug)]
pub struct FrameConn {
    stream: TcpStream,
}

impl FrameConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(authority: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(authority)
            .await
            .with_context(|| format!("tcp connect {authority}"))?;
        Ok(Self::new(stream))
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = encode_to_bytes(msg)?;
        self.send_raw(&payload).await
    }

    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        let payload = self.recv_raw().await?;
        decode_from_bytes(&payload)
    }

    /// Writes one raw frame.
    pub async fn send_raw(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        if payload.len() > MAX_FRAME_LEN {
            anyhow::bail!("frame of {} bytes exceeds limit", payload.len());
        }
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(payload);
        self.stream.write_all(&buf).await.context("tcp write")?;
        Ok(())
    }

    /// Reads one raw frame.
    pub async fn recv_raw(&mut self) -> anyhow::Result<Bytes> {
        let mut len_buf = [0u8; 4];
        self.stream
            .read_exact(&mut len_buf)
            .await
            .context("tcp read len")?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            anyhow::bail!("peer announced frame of {len} bytes");
        }
        let mut payload = vec![0u8; len];
        self.stream
            .read_exact(&mut payload)
            .await
            .context("tcp read payload")?;
        Ok(Bytes::from(payload))
    }
}

/// TCP listener for the content host.
pub struct ContentListener {
    listener: TcpListener,
}

impl ContentListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(FrameConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((FrameConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize msg")?;
    Ok(Bytes::from(payload))
}

fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize msg")
}

/// True when `err` means the peer went away rather than sent garbage.
pub fn is_disconnect(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io| {
            matches!(
                io.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            )
        })
}
