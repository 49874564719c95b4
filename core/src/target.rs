/*
 * target.rs
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

//! Fetch targets: raw URL strings normalized to scheme, host, port and request path, and the
//! route (direct, proxy relay, proxy tunnel) used to reach them.
//!
//! A URL without `://` has no scheme. It is read as `http`, unless its explicit port is 443
//! or 8443, in which case it is `https`. A missing port is the scheme's default.

use std::fmt;

use url::Url;

use crate::error::FetchError;
use crate::proxy::ProxyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    /// Ports that imply https when a URL or proxy authority carries no scheme.
    pub fn implied_by_port(port: u16) -> Scheme {
        if port == 443 || port == 8443 {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when `raw` starts with `scheme://`. Only the text before the first `/`, `?` or
/// `#` counts, so a URL carried in a query string does not make one.
fn has_scheme(raw: &str) -> bool {
    let end = raw.find(['/', '?', '#']).unwrap_or(raw.len());
    let Some(scheme) = raw[..end].strip_suffix(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    raw[end..].starts_with("//")
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Parse a raw URL string, inferring the scheme when it is missing.
/// The returned URL always has an http or https scheme and a host.
pub fn parse_url(raw: &str) -> Result<Url, FetchError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FetchError::malformed_url(raw, "empty URL"));
    }
    if has_scheme(raw) {
        let url = Url::parse(raw).map_err(|e| FetchError::malformed_url(raw, e))?;
        check_url(raw, &url)?;
        return Ok(url);
    }
    let mut url =
        Url::parse(&format!("http://{}", raw)).map_err(|e| FetchError::malformed_url(raw, e))?;
    if let Some(port) = url.port() {
        if Scheme::implied_by_port(port) == Scheme::Https {
            url.set_scheme("https")
                .map_err(|_| FetchError::malformed_url(raw, "cannot switch scheme to https"))?;
        }
    }
    check_url(raw, &url)?;
    Ok(url)
}

fn check_url(raw: &str, url: &Url) -> Result<(), FetchError> {
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(FetchError::malformed_url(
                raw,
                format!("unsupported scheme {}", other),
            ))
        }
    }
    match url.host_str() {
        Some(h) if !h.is_empty() => Ok(()),
        _ => Err(FetchError::malformed_url(raw, "missing host")),
    }
}

/// Resolve a redirect `Location` against the URL of the response that carried it.
pub fn resolve_location(base: &Url, location: &str) -> Result<Url, FetchError> {
    let location = location.trim();
    let url = base
        .join(location)
        .map_err(|e| FetchError::malformed_url(location, e))?;
    check_url(location, &url)?;
    Ok(url)
}

/// Fully resolved fetch target. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: Scheme,
    /// Host as it appears in the URL (IPv6 literals keep their brackets).
    pub host: String,
    pub port: u16,
    /// Origin-form request target: path plus query, never empty.
    pub path: String,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        Self::from_url(&parse_url(raw)?)
    }

    pub fn from_url(url: &Url) -> Result<Self, FetchError> {
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(FetchError::malformed_url(
                    url.as_str(),
                    format!("unsupported scheme {}", other),
                ))
            }
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FetchError::malformed_url(url.as_str(), "missing host"))?
            .to_string();
        let port = url.port().unwrap_or_else(|| scheme.default_port());
        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok(Self {
            scheme,
            host,
            port,
            path,
        })
    }

    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::Https
    }

    /// `host:port`, as used in a CONNECT request line.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Host header value: the port is omitted when it is the scheme default.
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            self.authority()
        }
    }

    /// Absolute-form request target, as sent to a relaying proxy.
    pub fn absolute_url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host_header(), self.path)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.absolute_url())
    }
}

/// How a target is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Dial the target itself; TLS iff the scheme is https.
    Direct,
    /// Dial the proxy and send the request in absolute form.
    ProxyRelay,
    /// Dial the proxy, CONNECT to the target, then TLS to the target over the same socket.
    ProxyTunnel,
}

impl Route {
    pub fn select(scheme: Scheme, proxy: &ProxyConfig) -> Route {
        match (scheme, proxy.enabled) {
            (_, false) => Route::Direct,
            (Scheme::Http, true) => Route::ProxyRelay,
            (Scheme::Https, true) => Route::ProxyTunnel,
        }
    }
}
