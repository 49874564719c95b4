/*
 * response.rs
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

//! HTTP response as delivered by the connection engine.

use std::num::ParseIntError;

use bytes::Bytes;

/// Statuses that make the engine follow `Location`.
pub fn is_redirect_status(code: u16) -> bool {
    matches!(code, 300 | 301 | 302 | 303 | 304 | 307 | 308)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub reason: Option<String>,
    /// Header fields in arrival order; names may repeat.
    pub headers: Vec<(String, String)>,
    /// Trailer fields of a chunked body.
    pub trailers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(code: u16) -> Self {
        Self {
            code,
            reason: None,
            headers: Vec::new(),
            trailers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_reason(code: u16, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(code)
        }
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Content-Length, if present. An error when it is not a number.
    pub fn content_length(&self) -> Option<Result<u64, ParseIntError>> {
        self.header("content-length").map(|v| v.trim().parse::<u64>())
    }

    pub fn is_chunked(&self) -> bool {
        self.headers.iter().any(|(k, v)| {
            k.eq_ignore_ascii_case("transfer-encoding")
                && v.split(',')
                    .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
        })
    }

    /// `Connection: close` was announced.
    pub fn closes_connection(&self) -> bool {
        self.headers.iter().any(|(k, v)| {
            k.eq_ignore_ascii_case("connection")
                && v.split(',').any(|t| t.trim().eq_ignore_ascii_case("close"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_statuses() {
        for code in [300, 301, 302, 303, 304, 307, 308] {
            assert!(is_redirect_status(code), "{}", code);
        }
        for code in [200, 204, 305, 306, 400, 404, 500] {
            assert!(!is_redirect_status(code), "{}", code);
        }
    }

    #[test]
    fn framing_headers() {
        let mut r = Response::with_reason(200, "OK");
        r.headers.push(("Transfer-Encoding".into(), "gzip, Chunked".into()));
        r.headers.push(("content-length".into(), "12".into()));
        r.headers.push(("Connection".into(), "keep-alive, close".into()));
        assert!(r.is_chunked());
        assert_eq!(r.content_length(), Some(Ok(12)));
        assert!(r.closes_connection());
        assert!(r.is_success());

        let mut bad = Response::new(200);
        bad.headers.push(("Content-Length".into(), "ten".into()));
        assert!(matches!(bad.content_length(), Some(Err(_))));
        assert_eq!(Response::new(204).content_length(), None);
    }
}
