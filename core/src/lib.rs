/*
 * lib.rs
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

//! Retriever core: fetch http and https URLs directly or through a forward proxy.
//!
//! [`Retriever`] plans a route per URL (direct, proxy relay, or CONNECT tunnel), drives one
//! [`protocol::http::ConnectionEngine`] per connection, and follows redirects up to a limit.
//! All I/O is async on tokio; TLS is rustls via tokio-rustls.

pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod proxy;
pub mod target;

pub use config::{RetrieverSettings, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT, USER_AGENT};
pub use error::{FetchError, Phase};
pub use net::{Endpoint, Transport, VerifyContext};
pub use protocol::http::{Fetched, Plan, Response, Retriever};
pub use proxy::ProxyConfig;
pub use target::{parse_url, Route, Scheme, Target};
