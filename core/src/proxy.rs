/*
 * proxy.rs
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

//! Forward proxy configuration: decoding `host:port` / `http[s]://host:port` specs and
//! Basic credentials for the Proxy-Authorization header.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use url::Url;

use crate::error::FetchError;
use crate::net::Endpoint;
use crate::target::Scheme;

/// Port used when a bare `host` proxy spec has no port.
const DEFAULT_PROXY_PORT: u16 = 8080;

/// Forward proxy settings. Built once at startup; cloned into every fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// The proxy itself speaks TLS.
    pub ssl: bool,
    /// Base64-encoded `user:pass`, if credentials were given.
    pub auth: Option<String>,
}

impl ProxyConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build an enabled proxy config from a spec and optional `user:pass` credentials.
    pub fn from_spec(spec: &str, credentials: Option<&str>) -> Result<Self, FetchError> {
        let (host, port, ssl) = decode(spec)?;
        Ok(Self {
            enabled: true,
            host,
            port,
            ssl,
            auth: credentials.map(encode_credentials),
        })
    }

    /// Value for the Proxy-Authorization header.
    pub fn authorization(&self) -> Option<String> {
        self.auth.as_ref().map(|encoded| format!("Basic {}", encoded))
    }

    /// Where to dial the proxy. Tunnels always dial it in plain text.
    pub fn endpoint(&self, tls: bool) -> Endpoint {
        Endpoint::new(&self.host, self.port, tls)
    }
}

/// Decode a proxy spec into `(host, port, ssl)`.
///
/// URL form (`http://host:port`, `https://host:port`) takes ssl from the scheme. Bare
/// authority form (`host:port`) takes ssl from the port: 443 and 8443 mean TLS.
pub fn decode(spec: &str) -> Result<(String, u16, bool), FetchError> {
    let spec = spec.trim();
    if spec.contains("://") {
        let url = Url::parse(spec).map_err(|e| FetchError::proxy_config(spec, e))?;
        let ssl = match url.scheme() {
            "http" => false,
            "https" => true,
            other => {
                return Err(FetchError::proxy_config(
                    spec,
                    format!("unsupported proxy scheme {}", other),
                ))
            }
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FetchError::proxy_config(spec, "missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| FetchError::proxy_config(spec, "missing port"))?;
        return Ok((host.to_string(), port, ssl));
    }

    let (host, port) = split_authority(spec)?;
    let port = match port {
        Some(p) => p
            .parse::<u16>()
            .map_err(|_| FetchError::proxy_config(spec, format!("invalid port {:?}", p)))?,
        None => DEFAULT_PROXY_PORT,
    };
    let ssl = Scheme::implied_by_port(port) == Scheme::Https;
    Ok((host.to_string(), port, ssl))
}

/// Split `host[:port]`, keeping brackets around IPv6 literals.
fn split_authority(spec: &str) -> Result<(&str, Option<&str>), FetchError> {
    let (host, port) = if spec.starts_with('[') {
        let close = spec
            .find(']')
            .ok_or_else(|| FetchError::proxy_config(spec, "unterminated IPv6 literal"))?;
        let rest = &spec[close + 1..];
        let port = match rest.strip_prefix(':') {
            Some(p) => Some(p),
            None if rest.is_empty() => None,
            None => return Err(FetchError::proxy_config(spec, "garbage after host")),
        };
        (&spec[..=close], port)
    } else {
        match spec.split_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (spec, None),
        }
    };
    if host.is_empty() || host.contains('/') || host.contains('@') {
        return Err(FetchError::proxy_config(spec, "invalid host"));
    }
    Ok((host, port))
}

/// Base64 (standard alphabet, padded) of `user:pass`.
pub fn encode_credentials(user_pass: &str) -> String {
    STANDARD.encode(user_pass.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_url_form() {
        assert_eq!(
            decode("http://proxy.local:3128").unwrap(),
            ("proxy.local".to_string(), 3128, false)
        );
        assert_eq!(
            decode("https://proxy.local").unwrap(),
            ("proxy.local".to_string(), 443, true)
        );
        assert_eq!(
            decode("http://proxy.local").unwrap(),
            ("proxy.local".to_string(), 80, false)
        );
    }

    #[test]
    fn decode_authority_form_infers_ssl_from_port() {
        assert_eq!(decode("proxy:8080").unwrap(), ("proxy".to_string(), 8080, false));
        assert_eq!(decode("proxy:443").unwrap(), ("proxy".to_string(), 443, true));
        assert_eq!(decode("proxy:8443").unwrap(), ("proxy".to_string(), 8443, true));
        assert_eq!(decode("proxy").unwrap(), ("proxy".to_string(), 8080, false));
        assert_eq!(decode("[::1]:3128").unwrap(), ("[::1]".to_string(), 3128, false));
    }

    #[test]
    fn decode_rejects_bad_specs() {
        assert!(matches!(decode(":8080"), Err(FetchError::ProxyConfig { .. })));
        assert!(matches!(decode("proxy:http"), Err(FetchError::ProxyConfig { .. })));
        assert!(matches!(decode("proxy:99999"), Err(FetchError::ProxyConfig { .. })));
        assert!(matches!(
            decode("socks5://proxy:1080"),
            Err(FetchError::ProxyConfig { .. })
        ));
        assert!(matches!(decode("[::1"), Err(FetchError::ProxyConfig { .. })));
    }

    #[test]
    fn credentials_use_standard_basic_form() {
        let config = ProxyConfig::from_spec("proxy:8080", Some("user:pass")).unwrap();
        assert!(config.enabled);
        assert_eq!(config.auth.as_deref(), Some("dXNlcjpwYXNz"));
        assert_eq!(config.authorization().as_deref(), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn no_credentials_no_header() {
        let config = ProxyConfig::from_spec("proxy:8080", None).unwrap();
        assert_eq!(config.authorization(), None);
        assert!(!ProxyConfig::disabled().enabled);
    }
}
