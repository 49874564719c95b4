/*
 * net.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Retriever, a non-interactive network retriever.
 *
 * Retriever is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Retriever is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Retriever.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Transports: a TcpStream, plain or wrapped with rustls.
//!
//! A plain transport can be spliced into a TLS one over the same socket (after a proxy
//! CONNECT), the same way a STARTTLS upgrade works. Every phase (resolve, connect,
//! handshake) runs under its own deadline.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::RootCertStore;
use tokio_rustls::TlsConnector;
use tracing::{debug, error, warn};

use crate::error::{FetchError, Phase};

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let (added, ignored) = root_store.add_parsable_certificates(certs);
            debug!(added, ignored, "loaded platform trust roots");
        }
        Err(e) => warn!(error = %e, "cannot load platform trust roots"),
    }
    if root_store.is_empty() {
        debug!("falling back to Mozilla trust roots");
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

/// Trust roots and TLS client settings, loaded once at startup and shared read-only.
/// Peer verification is always on.
#[derive(Clone)]
pub struct VerifyContext {
    connector: TlsConnector,
    roots: usize,
}

impl VerifyContext {
    /// Platform trust store, or the Mozilla bundle when the platform yields nothing.
    pub fn load() -> Self {
        Self::with_roots(build_root_store())
    }

    /// Mozilla trust roots only, independent of the host system.
    pub fn with_webpki_roots() -> Self {
        let mut roots = RootCertStore::empty();
        roots.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
        Self::with_roots(roots)
    }

    pub fn with_roots(roots: RootCertStore) -> Self {
        let count = roots.len();
        let mut config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        Self {
            connector: TlsConnector::from(Arc::new(config)),
            roots: count,
        }
    }

    /// Number of trust anchors.
    pub fn root_count(&self) -> usize {
        self.roots
    }

    /// Client handshake over an established socket. `server_name` is used for SNI and
    /// certificate verification.
    async fn handshake(
        &self,
        tcp: TcpStream,
        server_name: &str,
        peer: &Endpoint,
        limit: Duration,
    ) -> Result<TlsStream<TcpStream>, FetchError> {
        let host = strip_brackets(server_name).to_string();
        let name = ServerName::try_from(host.clone()).map_err(|_| FetchError::Tls {
            host: host.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "invalid server name"),
        })?;
        match timeout(limit, self.connector.connect(name, tcp)).await {
            Err(_) => Err(peer.timed_out(Phase::Handshaking)),
            Ok(Err(source)) => Err(FetchError::Tls { host, source }),
            Ok(Ok(tls)) => Ok(tls),
        }
    }
}

impl fmt::Debug for VerifyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyContext")
            .field("roots", &self.roots)
            .finish()
    }
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// A host and port to dial, and whether the link is TLS from the first byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl Endpoint {
    pub fn new(host: &str, port: u16, tls: bool) -> Self {
        Self {
            host: host.to_string(),
            port,
            tls,
        }
    }

    /// Host without IPv6 brackets, for resolution.
    pub fn dial_host(&self) -> &str {
        strip_brackets(&self.host)
    }

    pub(crate) fn timed_out(&self, phase: Phase) -> FetchError {
        FetchError::Timeout {
            phase,
            host: self.host.clone(),
            port: self.port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Resolve the endpoint's addresses.
pub(crate) async fn resolve(
    endpoint: &Endpoint,
    limit: Duration,
) -> Result<Vec<SocketAddr>, FetchError> {
    let lookup = tokio::net::lookup_host((endpoint.dial_host(), endpoint.port));
    let addrs: Vec<SocketAddr> = match timeout(limit, lookup).await {
        Err(_) => return Err(endpoint.timed_out(Phase::Resolving)),
        Ok(Err(source)) => {
            return Err(FetchError::Resolve {
                host: endpoint.host.clone(),
                port: endpoint.port,
                source,
            })
        }
        Ok(Ok(addrs)) => addrs.collect(),
    };
    if addrs.is_empty() {
        return Err(FetchError::Resolve {
            host: endpoint.host.clone(),
            port: endpoint.port,
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
        });
    }
    Ok(addrs)
}

/// Connect to the first resolved address that accepts.
pub(crate) async fn connect(
    endpoint: &Endpoint,
    addrs: &[SocketAddr],
    limit: Duration,
) -> Result<TcpStream, FetchError> {
    let attempt = async {
        let mut last = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(tcp) => return Ok(tcp),
                Err(e) => {
                    debug!(%addr, error = %e, "connect attempt failed");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses")))
    };
    match timeout(limit, attempt).await {
        Err(_) => Err(endpoint.timed_out(Phase::Connecting)),
        Ok(Err(source)) => Err(FetchError::Connect {
            host: endpoint.host.clone(),
            port: endpoint.port,
            source,
        }),
        Ok(Ok(tcp)) => Ok(tcp),
    }
}

/// Shutdown errors meaning the peer is already gone.
pub fn is_benign_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    )
}

/// Byte stream over one socket: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub enum Transport {
    Plain(TcpStream),
    Encrypted(Box<TlsStream<TcpStream>>),
}

impl Transport {
    pub fn kind(&self) -> &'static str {
        match self {
            Transport::Plain(_) => "plain",
            Transport::Encrypted(_) => "tls",
        }
    }

    /// Promote a plain transport to TLS over the same socket. Consumes `self`; the handshake
    /// runs before this returns. `server_name` is the host whose certificate must verify.
    pub async fn splice_to_tls(
        self,
        verify: &VerifyContext,
        server_name: &str,
        peer: &Endpoint,
        limit: Duration,
    ) -> Result<Transport, FetchError> {
        match self {
            Transport::Plain(tcp) => {
                let tls = verify.handshake(tcp, server_name, peer, limit).await?;
                debug!(peer = %peer, server_name, "TLS established");
                Ok(Transport::Encrypted(Box::new(tls)))
            }
            Transport::Encrypted(_) => Err(FetchError::Tls {
                host: server_name.to_string(),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "transport is already encrypted",
                ),
            }),
        }
    }

    /// Protocol-level close: close_notify then socket shutdown for TLS, socket shutdown for
    /// plain. A peer that is already gone is not an error.
    pub async fn shutdown(mut self) {
        let kind = self.kind();
        match AsyncWriteExt::shutdown(&mut self).await {
            Ok(()) => {}
            Err(e) if is_benign_disconnect(&e) => {
                debug!(transport = kind, error = %e, "peer already disconnected");
            }
            Err(e) => error!(transport = kind, error = %e, "shutdown failed"),
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transport").field(&self.kind()).finish()
    }
}

impl AsyncRead for Transport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            Transport::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Transport::Encrypted(s) => Pin::new(&mut **s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            Transport::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Transport::Encrypted(s) => Pin::new(&mut **s).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Transport::Plain(s) => Pin::new(s).poll_flush(cx),
            Transport::Encrypted(s) => Pin::new(&mut **s).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Transport::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Transport::Encrypted(s) => Pin::new(&mut **s).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benign_disconnects() {
        assert!(is_benign_disconnect(&io::Error::from(io::ErrorKind::NotConnected)));
        assert!(is_benign_disconnect(&io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(!is_benign_disconnect(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[test]
    fn endpoint_dial_host_strips_ipv6_brackets() {
        let e = Endpoint::new("[::1]", 8080, false);
        assert_eq!(e.dial_host(), "::1");
        assert_eq!(e.to_string(), "[::1]:8080");
        assert_eq!(Endpoint::new("example.org", 80, false).dial_host(), "example.org");
    }

    #[test]
    fn webpki_roots_are_not_empty() {
        assert!(VerifyContext::with_webpki_roots().root_count() > 0);
    }

    #[tokio::test]
    async fn resolve_localhost() {
        let addrs = resolve(
            &Endpoint::new("127.0.0.1", 80, false),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(addrs[0].port(), 80);
    }

    #[tokio::test]
    async fn connect_refused_is_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let endpoint = Endpoint::new("127.0.0.1", addr.port(), false);
        let err = connect(&endpoint, &[addr], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Connect { port, .. } if port == addr.port()));
    }
}
