//! Access guard — network-origin and shared-secret checks.
//!
//! The origin check runs at accept time, before any bytes of the
//! request are read: a connection from outside the allow-list is
//! dropped with no response at all. The shared-secret check runs
//! inside the handler, after routing, so a wrong path still yields a
//! plain 404 regardless of the key (matching the route/secret check
//! ordering callers already depend on).

use axum::http::HeaderMap;
use axum::serve::Listener;
use std::io;
use std::net::{IpAddr, SocketAddr};
use tokio::net::{TcpListener, TcpStream};
use tracing::warn;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Coarse allow-list: loopback plus the 172.x container network range
/// (including its IPv4-mapped-IPv6 form). Not a substitute for the
/// secret check.
pub fn peer_allowed(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.octets()[0] == 172,
        IpAddr::V6(v6) => {
            if v6.is_loopback() {
                return true;
            }
            let o = v6.octets();
            let v4_mapped = o[..10].iter().all(|&b| b == 0) && o[10] == 0xff && o[11] == 0xff;
            v4_mapped && (o[12] == 127 || o[12] == 172)
        }
    }
}

/// True when the request carries the exact configured secret.
pub fn api_key_ok(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false)
}

// ─── Guarded listener ─────────────────────────────────────────────────────────

/// TCP listener that silently drops connections from non-permitted
/// peers before the HTTP layer ever sees them.
pub struct GuardedListener {
    inner: TcpListener,
}

impl GuardedListener {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

impl Listener for GuardedListener {
    type Io = TcpStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.inner.accept().await {
                Ok((stream, peer)) => {
                    if peer_allowed(&peer.ip()) {
                        return (stream, peer);
                    }
                    // Abrupt close, no response body.
                    warn!(peer = %peer, "dropped connection from non-permitted origin");
                    drop(stream);
                }
                Err(e) => {
                    warn!(err = %e, "accept failed");
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}
