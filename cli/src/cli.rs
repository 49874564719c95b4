/*
 * cli.rs
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

//! Command-line arguments.

use std::fmt;

use clap::Parser;

use retriever_core::{DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT};

/// Fetch URLs over HTTP and HTTPS, optionally through a forward proxy.
///
/// The body of each final response is written to standard output. Status, headers and
/// failures are logged to standard error.
#[derive(Parser)]
#[command(name = "retriever")]
#[command(author, version, about)]
pub struct Args {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long)]
    pub debug: bool,

    /// Forward proxy: http://host:port, https://host:port or host:port
    #[arg(short, long, value_name = "SPEC")]
    pub proxy: Option<String>,

    /// Proxy credentials, sent as Basic authorization
    #[arg(long, value_name = "USER:PASS")]
    pub proxy_auth: Option<String>,

    /// Redirects followed per URL before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS)]
    pub max_redirects: u32,

    /// Seconds allowed for each connect, handshake, read or write
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// URLs to fetch, in order
    pub urls: Vec<String>,
}

// Credentials never reach the logs.
impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("debug", &self.debug)
            .field("proxy", &self.proxy)
            .field("proxy_auth", &self.proxy_auth.as_ref().map(|_| "<redacted>"))
            .field("max_redirects", &self.max_redirects)
            .field("timeout", &self.timeout)
            .field("urls", &self.urls)
            .finish()
    }
}
