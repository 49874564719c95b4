/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked, or
//! until close).
//!
//! The parser stops after the header block (`HeadersComplete`) so the caller can decide
//! what to do with the response before any body byte is consumed. Bytes past the end of a
//! message stay in the buffer for the next pipelined response.

use bytes::{Buf, BytesMut};
use std::io;

/// Longest status, header, chunk-size or trailer line accepted.
const MAX_LINE: usize = 16 * 1024;

/// Largest status line plus header block (or trailer block) accepted, CRLFs included.
const MAX_HEADER_BLOCK: usize = 64 * 1024;

/// Callback for HTTP/1.1 response events.
pub trait H1ResponseHandler {
    fn status(&mut self, code: u16, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn trailer(&mut self, name: &str, value: &str);
}

/// How the body after a header block is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// No body at all.
    Empty,
    Length(u64),
    Chunked,
    /// Everything until the peer closes.
    UntilClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Message complete.
    Idle,
    StatusLine,
    Headers,
    /// Headers done; caller must call set_body_mode().
    HeadersComplete,
    Body,
    UntilClose,
    ChunkSize,
    ChunkData,
    /// CRLF after chunk data.
    ChunkDataEnd,
    ChunkTrailer,
}

/// Push parser for one HTTP/1.1 response at a time. Feed bytes via `receive`.
pub struct ResponseParser {
    state: ParseState,
    /// Bytes left in the current Content-Length body or chunk.
    remaining: u64,
    /// Bytes of head or trailer lines consumed so far.
    head_bytes: usize,
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            remaining: 0,
            head_bytes: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == ParseState::Idle
    }

    /// Prepare for the next response on the same connection.
    pub fn reset(&mut self) {
        self.state = ParseState::StatusLine;
        self.remaining = 0;
        self.head_bytes = 0;
    }

    /// Account for one head or trailer line and enforce the block limit.
    fn count_head_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.head_bytes += line.len() + 2;
        if self.head_bytes > MAX_HEADER_BLOCK {
            return Err(invalid("header block too large"));
        }
        Ok(())
    }

    /// Split one CRLF-terminated line off the front of buf, without the CRLF.
    fn take_line(buf: &mut BytesMut) -> io::Result<Option<BytesMut>> {
        match buf.windows(2).position(|w| w == b"\r\n") {
            Some(end) => {
                let line = buf.split_to(end);
                buf.advance(2);
                Ok(Some(line))
            }
            None if buf.len() > MAX_LINE => Err(invalid("line too long")),
            None => Ok(None),
        }
    }

    /// `HTTP/1.1 200 OK` or `HTTP/1.1 200`.
    fn parse_status_line(line: &[u8]) -> io::Result<(u16, Option<String>)> {
        let line =
            std::str::from_utf8(line).map_err(|_| invalid("invalid status line UTF-8"))?;
        let mut parts = line.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        if !version.starts_with("HTTP/1.") {
            return Err(invalid(format!("not an HTTP/1.x status line: {:?}", line)));
        }
        let code = parts
            .next()
            .filter(|c| c.len() == 3)
            .and_then(|c| c.parse::<u16>().ok())
            .filter(|c| (100..=999).contains(c))
            .ok_or_else(|| invalid(format!("invalid status code in {:?}", line)))?;
        let reason = parts
            .next()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        Ok((code, reason))
    }

    fn parse_field(line: &[u8]) -> io::Result<(String, String)> {
        let line = String::from_utf8_lossy(line);
        let colon = line
            .find(':')
            .ok_or_else(|| invalid(format!("header without colon: {:?}", line)))?;
        let name = line[..colon].trim();
        if name.is_empty() {
            return Err(invalid("empty header name"));
        }
        Ok((name.to_string(), line[colon + 1..].trim().to_string()))
    }

    /// Consume and parse as much as possible from buf. Handler is called for each complete
    /// token. Partial data remains in buf.
    pub fn receive<H: H1ResponseHandler>(
        &mut self,
        buf: &mut BytesMut,
        handler: &mut H,
    ) -> io::Result<()> {
        loop {
            match self.state {
                ParseState::Idle | ParseState::HeadersComplete => return Ok(()),
                ParseState::StatusLine => {
                    let Some(line) = Self::take_line(buf)? else {
                        return Ok(());
                    };
                    self.count_head_line(&line)?;
                    let (code, reason) = Self::parse_status_line(&line)?;
                    handler.status(code, reason.as_deref());
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(line) = Self::take_line(buf)? else {
                        return Ok(());
                    };
                    self.count_head_line(&line)?;
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    let (name, value) = Self::parse_field(&line)?;
                    handler.header(&name, &value);
                }
                ParseState::Body | ParseState::ChunkData => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let take = usize::try_from(self.remaining)
                        .unwrap_or(usize::MAX)
                        .min(buf.len());
                    let chunk = buf.split_to(take);
                    handler.body_chunk(&chunk);
                    self.remaining -= take as u64;
                    if self.remaining == 0 {
                        self.state = if self.state == ParseState::Body {
                            ParseState::Idle
                        } else {
                            ParseState::ChunkDataEnd
                        };
                    }
                }
                ParseState::UntilClose => {
                    if !buf.is_empty() {
                        let chunk = buf.split();
                        handler.body_chunk(&chunk);
                    }
                    return Ok(());
                }
                ParseState::ChunkSize => {
                    let Some(line) = Self::take_line(buf)? else {
                        return Ok(());
                    };
                    let line = std::str::from_utf8(&line)
                        .map_err(|_| invalid("invalid chunk size"))?;
                    let hex = line.split(';').next().unwrap_or("").trim();
                    let size = u64::from_str_radix(hex, 16)
                        .map_err(|_| invalid(format!("invalid chunk size {:?}", hex)))?;
                    if size == 0 {
                        self.head_bytes = 0;
                        self.state = ParseState::ChunkTrailer;
                    } else {
                        self.remaining = size;
                        self.state = ParseState::ChunkData;
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(invalid("missing CRLF after chunk data"));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let Some(line) = Self::take_line(buf)? else {
                        return Ok(());
                    };
                    self.count_head_line(&line)?;
                    if line.is_empty() {
                        self.state = ParseState::Idle;
                    } else {
                        let (name, value) = Self::parse_field(&line)?;
                        handler.trailer(&name, &value);
                    }
                }
            }
        }
    }

    /// Called once the header block is parsed (state HeadersComplete).
    pub fn set_body_mode(&mut self, mode: BodyMode) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        self.state = match mode {
            BodyMode::Empty | BodyMode::Length(0) => ParseState::Idle,
            BodyMode::Length(n) => {
                self.remaining = n;
                ParseState::Body
            }
            BodyMode::Chunked => ParseState::ChunkSize,
            BodyMode::UntilClose => ParseState::UntilClose,
        };
    }

    /// The peer closed the connection. Completes a read-until-close body; anything else
    /// still in progress is a truncated response.
    pub fn finish(&mut self) -> io::Result<()> {
        match self.state {
            ParseState::Idle => Ok(()),
            ParseState::UntilClose => {
                self.state = ParseState::Idle;
                Ok(())
            }
            ParseState::StatusLine | ParseState::Headers => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before response header was complete",
            )),
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before response body was complete",
            )),
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        status: Option<(u16, Option<String>)>,
        headers: Vec<(String, String)>,
        trailers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    impl H1ResponseHandler for Recorder {
        fn status(&mut self, code: u16, reason: Option<&str>) {
            self.status = Some((code, reason.map(str::to_string)));
        }
        fn header(&mut self, name: &str, value: &str) {
            self.headers.push((name.into(), value.into()));
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
        fn trailer(&mut self, name: &str, value: &str) {
            self.trailers.push((name.into(), value.into()));
        }
    }

    #[test]
    fn stops_after_headers_until_body_mode_is_set() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(parser.state(), ParseState::HeadersComplete);
        assert_eq!(rec.status, Some((200, Some("OK".into()))));
        assert_eq!(&buf[..], b"hello");

        parser.set_body_mode(BodyMode::Length(5));
        parser.receive(&mut buf, &mut rec).unwrap();
        assert!(parser.is_complete());
        assert_eq!(rec.body, b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn leaves_pipelined_bytes_in_buffer() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\n\r\nHTTP/1.1 404 Not Found\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(BodyMode::Empty);
        assert!(parser.is_complete());
        assert_eq!(&buf[..], b"HTTP/1.1 404 Not Found\r\n");
    }

    #[test]
    fn chunked_body_split_across_reads() {
        let wire: &[u8] = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
            4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\nX-Checksum: abc\r\n\r\n";
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::new();
        for piece in wire.chunks(3) {
            buf.extend_from_slice(piece);
            parser.receive(&mut buf, &mut rec).unwrap();
            if parser.state() == ParseState::HeadersComplete {
                parser.set_body_mode(BodyMode::Chunked);
                parser.receive(&mut buf, &mut rec).unwrap();
            }
        }
        assert!(parser.is_complete());
        assert_eq!(rec.body, b"Wikipedia");
        assert_eq!(rec.trailers, vec![("X-Checksum".to_string(), "abc".to_string())]);
    }

    #[test]
    fn until_close_completes_on_finish() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.0 404 Not Found\r\n\r\ngone"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(BodyMode::UntilClose);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(parser.state(), ParseState::UntilClose);
        parser.finish().unwrap();
        assert!(parser.is_complete());
        assert_eq!(rec.body, b"gone");
    }

    #[test]
    fn truncated_body_is_an_error() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\n\r\nabc"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(BodyMode::Length(10));
        parser.receive(&mut buf, &mut rec).unwrap();
        let err = parser.finish().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn rejects_bad_status_line_and_chunk_size() {
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"SSH-2.0-OpenSSH\r\n"[..]);
        assert!(ResponseParser::new().receive(&mut buf, &mut rec).is_err());

        let mut buf = BytesMut::from(&b"HTTP/1.1 2000 OK\r\n"[..]);
        assert!(ResponseParser::new().receive(&mut buf, &mut rec).is_err());

        let mut parser = ResponseParser::new();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\n\r\nzz\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        parser.set_body_mode(BodyMode::Chunked);
        assert!(parser.receive(&mut buf, &mut rec).is_err());
    }

    #[test]
    fn many_short_headers_hit_the_block_limit() {
        let mut wire = b"HTTP/1.1 200 OK\r\n".to_vec();
        for i in 0..5000 {
            wire.extend_from_slice(format!("X-Filler-{}: v\r\n", i).as_bytes());
        }
        wire.extend_from_slice(b"\r\n");
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&wire[..]);
        let err = ResponseParser::new().receive(&mut buf, &mut rec).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(rec.headers.len() < 5000);

        let mut parser = ResponseParser::new();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nA: 1\r\nB: 2\r\n\r\n"[..]);
        parser.receive(&mut buf, &mut Recorder::default()).unwrap();
        assert_eq!(parser.state(), ParseState::HeadersComplete);
    }

    #[test]
    fn status_without_reason() {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 204\r\n\r\n"[..]);
        parser.receive(&mut buf, &mut rec).unwrap();
        assert_eq!(rec.status, Some((204, None)));
    }
}
