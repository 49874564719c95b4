/*
 * connection.rs
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

//! Connection engine: one transport, one request queue, driven from resolve to close.
//!
//! Resolving → Connecting → (Handshaking) → Sending → ReadingHeader → Deciding, then one of
//! ReadingBody (deliver, pop, send the next queued request), TunnelSplice (hand the plain
//! socket back for TLS), or Redirecting (close and report the location). Every error closes
//! the transport. The engine never re-enters itself: whatever comes next is returned as a
//! [`NextAction`] for the caller to act on.

use std::fmt;
use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::config::RetrieverSettings;
use crate::error::{FetchError, Phase};
use crate::net::{self, Endpoint, Transport, VerifyContext};
use crate::protocol::http::h1::{BodyMode, H1ResponseHandler, ParseState, ResponseParser};
use crate::protocol::http::queue::RequestQueue;
use crate::protocol::http::response::{is_redirect_status, Response};

const READ_CHUNK: usize = 8192;

/// What the caller must do once an engine has run.
#[derive(Debug)]
pub enum NextAction {
    /// Queue drained and transport closed. One response per request sent, in order.
    Done { responses: Vec<Response> },
    /// Follow `location` with a new engine. The transport is already closed and the rest of
    /// the queue abandoned.
    Redirect {
        location: String,
        redirects_remaining: u32,
    },
    /// A CONNECT succeeded. `transport` is the plain socket to the proxy, still open, to be
    /// spliced to TLS toward the origin; `queue` holds the requests to send through it.
    Splice {
        transport: Transport,
        queue: RequestQueue,
    },
}

/// Pick how the body after a response head is delimited.
pub fn body_mode(response: &Response) -> Result<BodyMode, String> {
    let code = response.code;
    if (100..200).contains(&code) || code == 204 || code == 304 {
        return Ok(BodyMode::Empty);
    }
    if response.is_chunked() {
        return Ok(BodyMode::Chunked);
    }
    match response.content_length() {
        Some(Ok(n)) => Ok(BodyMode::Length(n)),
        Some(Err(_)) => Err(format!(
            "invalid Content-Length {:?}",
            response.header("content-length").unwrap_or("")
        )),
        // A 2xx head without framing is complete as it stands.
        None if response.is_success() => Ok(BodyMode::Empty),
        None => Ok(BodyMode::UntilClose),
    }
}

/// Builds a Response from parser events.
struct Collector {
    response: Response,
    body: BytesMut,
}

impl Collector {
    fn new() -> Self {
        Self {
            response: Response::new(0),
            body: BytesMut::new(),
        }
    }

    fn into_response(self) -> Response {
        let mut response = self.response;
        response.body = self.body.freeze();
        response
    }
}

impl H1ResponseHandler for Collector {
    fn status(&mut self, code: u16, reason: Option<&str>) {
        self.response.code = code;
        self.response.reason = reason.map(str::to_string);
    }

    fn header(&mut self, name: &str, value: &str) {
        self.response.headers.push((name.to_string(), value.to_string()));
    }

    fn body_chunk(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    fn trailer(&mut self, name: &str, value: &str) {
        self.response.trailers.push((name.to_string(), value.to_string()));
    }
}

/// Outcome of one request/response exchange.
enum Exchange {
    Delivered { response: Response, reusable: bool },
    Redirect(String),
    Tunnel(Response),
}

/// State machine for one connection. Consumed by [`ConnectionEngine::run`].
pub struct ConnectionEngine {
    /// Where the socket goes (the proxy when proxied). Also the context for errors.
    peer: Endpoint,
    /// Already-established transport (spliced tunnel). None means dial `peer`.
    transport: Option<Transport>,
    queue: RequestQueue,
    redirects_remaining: u32,
    verify: VerifyContext,
    io_timeout: Duration,
    state: Phase,
    read_buf: BytesMut,
    parser: ResponseParser,
}

impl ConnectionEngine {
    /// Engine that dials `peer` itself; TLS from the first byte iff `peer.tls`.
    pub fn new(
        peer: Endpoint,
        queue: RequestQueue,
        redirects_remaining: u32,
        verify: VerifyContext,
        settings: &RetrieverSettings,
    ) -> Self {
        Self {
            peer,
            transport: None,
            queue,
            redirects_remaining,
            verify,
            io_timeout: settings.io_timeout,
            state: Phase::Resolving,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            parser: ResponseParser::new(),
        }
    }

    /// Engine over an already-connected (and, if needed, handshaken) transport.
    pub fn over(
        transport: Transport,
        peer: Endpoint,
        queue: RequestQueue,
        redirects_remaining: u32,
        verify: VerifyContext,
        settings: &RetrieverSettings,
    ) -> Self {
        let mut engine = Self::new(peer, queue, redirects_remaining, verify, settings);
        engine.transport = Some(transport);
        engine.state = Phase::Sending;
        engine
    }

    pub fn state(&self) -> Phase {
        self.state
    }

    fn enter(&mut self, next: Phase) {
        trace!(peer = %self.peer, from = %self.state, to = %next, "engine state");
        self.state = next;
    }

    /// Drive the connection until the queue is drained, a redirect or tunnel is reached, or
    /// an error closes it.
    pub async fn run(mut self) -> Result<NextAction, FetchError> {
        let transport = match self.transport.take() {
            Some(transport) => transport,
            None => match self.establish().await {
                Ok(transport) => transport,
                Err(e) => {
                    self.enter(Phase::Closed);
                    return Err(e);
                }
            },
        };
        self.drive(transport).await
    }

    async fn establish(&mut self) -> Result<Transport, FetchError> {
        self.enter(Phase::Resolving);
        let addrs = net::resolve(&self.peer, self.io_timeout).await?;
        self.enter(Phase::Connecting);
        let tcp = net::connect(&self.peer, &addrs, self.io_timeout).await?;
        debug!(peer = %self.peer, "connection established");
        let transport = Transport::Plain(tcp);
        if !self.peer.tls {
            return Ok(transport);
        }
        self.enter(Phase::Handshaking);
        transport
            .splice_to_tls(&self.verify, &self.peer.host, &self.peer, self.io_timeout)
            .await
    }

    async fn drive(&mut self, mut transport: Transport) -> Result<NextAction, FetchError> {
        let mut responses = Vec::new();
        while let Some(request) = self.queue.front() {
            let head = request.encode();
            let is_connect = request.is_connect();
            debug!(
                peer = %self.peer,
                transport = transport.kind(),
                request = %request.request_line(),
                "sending request"
            );
            match self.exchange(&mut transport, &head, is_connect).await {
                Ok(Exchange::Delivered { response, reusable }) => {
                    self.queue.pop_front();
                    responses.push(response);
                    if !reusable {
                        if !self.queue.is_empty() {
                            warn!(
                                peer = %self.peer,
                                dropped = self.queue.len(),
                                "connection not reusable, dropping queued requests"
                            );
                        }
                        break;
                    }
                }
                Ok(Exchange::Redirect(location)) => {
                    self.enter(Phase::Redirecting);
                    if self.redirects_remaining == 0 {
                        self.close(transport).await;
                        return Err(FetchError::RedirectLimitExceeded { location });
                    }
                    self.close(transport).await;
                    return Ok(NextAction::Redirect {
                        location,
                        redirects_remaining: self.redirects_remaining - 1,
                    });
                }
                Ok(Exchange::Tunnel(response)) => {
                    self.queue.pop_front();
                    self.enter(Phase::TunnelSplice);
                    debug!(
                        peer = %self.peer,
                        code = response.code,
                        pending = self.queue.len(),
                        "tunnel established"
                    );
                    return Ok(NextAction::Splice {
                        transport,
                        queue: std::mem::take(&mut self.queue),
                    });
                }
                Err(e) => {
                    self.close(transport).await;
                    return Err(e);
                }
            }
        }
        self.close(transport).await;
        Ok(NextAction::Done { responses })
    }

    async fn exchange(
        &mut self,
        transport: &mut Transport,
        head: &[u8],
        is_connect: bool,
    ) -> Result<Exchange, FetchError> {
        self.enter(Phase::Sending);
        self.write(transport, head).await?;

        self.enter(Phase::ReadingHeader);
        let mut collector = Collector::new();
        loop {
            self.parser.reset();
            self.read_head(transport, &mut collector).await?;
            let code = collector.response.code;
            // Interim responses (100 Continue, 103 Early Hints) precede the real one.
            if (100..200).contains(&code) && code != 101 {
                debug!(peer = %self.peer, code, "skipping interim response");
                collector = Collector::new();
                continue;
            }
            break;
        }

        self.enter(Phase::Deciding);
        let code = collector.response.code;
        debug!(
            peer = %self.peer,
            code,
            reason = collector.response.reason.as_deref().unwrap_or(""),
            headers = ?collector.response.headers,
            "response header"
        );

        if is_redirect_status(code) {
            let location = collector
                .response
                .header("location")
                .map(str::to_string)
                .ok_or_else(|| self.malformed("redirect without Location header"))?;
            debug!(peer = %self.peer, code, location = %location, "redirect");
            return Ok(Exchange::Redirect(location));
        }

        let success = collector.response.is_success();
        if is_connect && success {
            return Ok(Exchange::Tunnel(collector.into_response()));
        }

        let mode = body_mode(&collector.response).map_err(|reason| self.malformed(reason))?;
        if mode != BodyMode::Empty {
            self.enter(Phase::ReadingBody);
        }
        self.parser.set_body_mode(mode);
        self.read_body(transport, &mut collector).await?;
        let response = collector.into_response();

        if is_connect {
            return Err(FetchError::TunnelRejected {
                host: self.peer.host.clone(),
                port: self.peer.port,
                status: response.code,
            });
        }

        let reusable = mode != BodyMode::UntilClose && !response.closes_connection();
        debug!(
            peer = %self.peer,
            code = response.code,
            bytes = response.body.len(),
            "response complete"
        );
        Ok(Exchange::Delivered { response, reusable })
    }

    async fn read_head(
        &mut self,
        transport: &mut Transport,
        collector: &mut Collector,
    ) -> Result<(), FetchError> {
        loop {
            self.parser
                .receive(&mut self.read_buf, collector)
                .map_err(|e| self.malformed(e))?;
            if self.parser.state() == ParseState::HeadersComplete {
                return Ok(());
            }
            if self.fill(transport, Phase::ReadingHeader).await? == 0 {
                return Err(self.read_failed(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before response header was complete",
                )));
            }
        }
    }

    async fn read_body(
        &mut self,
        transport: &mut Transport,
        collector: &mut Collector,
    ) -> Result<(), FetchError> {
        loop {
            self.parser
                .receive(&mut self.read_buf, collector)
                .map_err(|e| self.malformed(e))?;
            if self.parser.is_complete() {
                return Ok(());
            }
            if self.fill(transport, Phase::ReadingBody).await? == 0 {
                return self.parser.finish().map_err(|e| self.read_failed(e));
            }
        }
    }

    /// Read more bytes into the buffer. 0 means the peer closed.
    async fn fill(&mut self, transport: &mut Transport, phase: Phase) -> Result<usize, FetchError> {
        self.read_buf.reserve(READ_CHUNK);
        match timeout(self.io_timeout, transport.read_buf(&mut self.read_buf)).await {
            Err(_) => Err(self.peer.timed_out(phase)),
            Ok(Err(e)) => Err(self.read_failed(e)),
            Ok(Ok(n)) => {
                trace!(peer = %self.peer, bytes = n, "read");
                Ok(n)
            }
        }
    }

    async fn write(&self, transport: &mut Transport, head: &[u8]) -> Result<(), FetchError> {
        let write = async {
            transport.write_all(head).await?;
            transport.flush().await
        };
        match timeout(self.io_timeout, write).await {
            Err(_) => Err(self.peer.timed_out(Phase::Sending)),
            Ok(Err(source)) => Err(FetchError::Write {
                host: self.peer.host.clone(),
                port: self.peer.port,
                source,
            }),
            Ok(Ok(())) => Ok(()),
        }
    }

    /// Shut the transport down. Taking it by value makes this happen once.
    async fn close(&mut self, transport: Transport) {
        self.enter(Phase::Closed);
        transport.shutdown().await;
        debug!(peer = %self.peer, "connection closed");
    }

    fn read_failed(&self, source: io::Error) -> FetchError {
        FetchError::Read {
            host: self.peer.host.clone(),
            port: self.peer.port,
            source,
        }
    }

    fn malformed(&self, reason: impl fmt::Display) -> FetchError {
        FetchError::MalformedResponse {
            host: self.peer.host.clone(),
            port: self.peer.port,
            reason: reason.to_string(),
        }
    }
}
