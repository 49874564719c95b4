/*
 * error.rs
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

//! Fetch errors and the engine phases they are reported against.

use std::fmt;
use std::io;

use thiserror::Error;

/// Connection engine phase. Used both as the engine's current state and as error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolving,
    Connecting,
    Handshaking,
    Sending,
    ReadingHeader,
    Deciding,
    ReadingBody,
    TunnelSplice,
    Redirecting,
    Closed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Resolving => "resolve",
            Phase::Connecting => "connect",
            Phase::Handshaking => "handshake",
            Phase::Sending => "send",
            Phase::ReadingHeader => "read header",
            Phase::Deciding => "decide",
            Phase::ReadingBody => "read body",
            Phase::TunnelSplice => "tunnel splice",
            Phase::Redirecting => "redirect",
            Phase::Closed => "closed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every way a single fetch can fail. Each one is terminal for the engine that produced it.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed, has no host, or uses a scheme other than http/https.
    #[error("malformed URL {url:?}: {reason}")]
    MalformedUrl { url: String, reason: String },

    /// Proxy spec given on the command line could not be decoded.
    #[error("invalid proxy configuration {spec:?}: {reason}")]
    ProxyConfig { spec: String, reason: String },

    #[error("cannot resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("cannot connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Handshake failure, including certificate verification failure.
    #[error("TLS handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("writing request to {host}:{port} failed: {source}")]
    Write {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("reading response from {host}:{port} failed: {source}")]
    Read {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("{phase} timed out for {host}:{port}")]
    Timeout { phase: Phase, host: String, port: u16 },

    #[error("malformed response from {host}:{port}: {reason}")]
    MalformedResponse {
        host: String,
        port: u16,
        reason: String,
    },

    /// A redirect arrived with no redirect budget left.
    #[error("redirect limit exceeded, not following {location}")]
    RedirectLimitExceeded { location: String },

    #[error("tunneling through TLS proxy {host}:{port} is not supported")]
    UnsupportedProxyTls { host: String, port: u16 },

    /// Proxy answered CONNECT with a non-2xx status.
    #[error("proxy {host}:{port} refused tunnel with status {status}")]
    TunnelRejected { host: String, port: u16, status: u16 },
}

impl FetchError {
    pub(crate) fn malformed_url(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::MalformedUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn proxy_config(spec: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::ProxyConfig {
            spec: spec.into(),
            reason: reason.to_string(),
        }
    }

    /// Engine phase the error belongs to, if it came from a connection.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            FetchError::Resolve { .. } => Some(Phase::Resolving),
            FetchError::Connect { .. } => Some(Phase::Connecting),
            FetchError::Tls { .. } => Some(Phase::Handshaking),
            FetchError::Write { .. } => Some(Phase::Sending),
            FetchError::Read { .. } => Some(Phase::ReadingHeader),
            FetchError::Timeout { phase, .. } => Some(*phase),
            FetchError::MalformedResponse { .. } => Some(Phase::Deciding),
            FetchError::RedirectLimitExceeded { .. } => Some(Phase::Redirecting),
            FetchError::TunnelRejected { .. } => Some(Phase::Deciding),
            FetchError::MalformedUrl { .. }
            | FetchError::ProxyConfig { .. }
            | FetchError::UnsupportedProxyTls { .. } => None,
        }
    }
}
