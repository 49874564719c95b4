/*
 * support/mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Scripted TCP peers for integration tests: each accepts one connection and plays a
 * fixed role (origin server or proxy) with raw bytes, so the exact request heads the
 * retriever sends can be checked.
 */

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rcgen::{generate_simple_self_signed, CertifiedKey};
use retriever_core::{ProxyConfig, Retriever, RetrieverSettings, VerifyContext};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

/// Retriever with a short I/O timeout, for tests.
pub fn retriever(proxy: ProxyConfig) -> Retriever {
    retriever_with_timeout(proxy, Duration::from_secs(5))
}

pub fn retriever_with_timeout(proxy: ProxyConfig, io_timeout: Duration) -> Retriever {
    Retriever::new(
        VerifyContext::with_webpki_roots(),
        proxy,
        RetrieverSettings::default().with_timeout(io_timeout),
    )
}

/// Retriever that trusts exactly `verify`'s roots.
pub fn retriever_trusting(verify: VerifyContext, proxy: ProxyConfig) -> Retriever {
    Retriever::new(
        verify,
        proxy,
        RetrieverSettings::default().with_timeout(Duration::from_secs(5)),
    )
}

/// Self-signed certificate for `host`: a server-side acceptor presenting it and a client
/// verify context trusting it.
pub fn self_signed(host: &str) -> (TlsAcceptor, VerifyContext) {
    let CertifiedKey { cert, key_pair } = generate_simple_self_signed(vec![host.to_string()]).unwrap();
    let cert_der: CertificateDer<'static> = cert.der().clone();
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der)
        .unwrap();

    let mut roots = RootCertStore::empty();
    roots.add(cert_der).unwrap();
    (
        TlsAcceptor::from(Arc::new(config)),
        VerifyContext::with_roots(roots),
    )
}

/// Bind 127.0.0.1 on an ephemeral port and run `script` against the first connection.
/// Returns the port and the script's result.
pub async fn peer<F, Fut, T>(script: F) -> (u16, JoinHandle<T>)
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        script(stream).await
    });
    (port, handle)
}

/// Origin that reads one request head, answers with `reply`, then waits for the client
/// to close. Returns the request head.
pub async fn origin(reply: &'static [u8]) -> (u16, JoinHandle<String>) {
    peer(move |mut stream| async move {
        let head = read_head(&mut stream).await;
        stream.write_all(reply).await.unwrap();
        drain(&mut stream).await;
        head
    })
    .await
}

/// Origin that answers and then closes its side at once.
pub async fn origin_then_close(reply: &'static [u8]) -> (u16, JoinHandle<String>) {
    peer(move |mut stream| async move {
        let head = read_head(&mut stream).await;
        stream.write_all(reply).await.unwrap();
        stream.shutdown().await.unwrap();
        head
    })
    .await
}

/// Read up to and including the blank line that ends a request head.
pub async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).await {
            Ok(0) | Err(_) => break,
            Ok(_) => head.push(byte[0]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Read until the client closes. Returns everything received.
pub async fn drain<S: AsyncRead + Unpin>(stream: &mut S) -> Vec<u8> {
    let mut rest = Vec::new();
    let _ = stream.read_to_end(&mut rest).await;
    rest
}
