/*
 * mod.rs
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

//! HTTP/1.1 retrieval: request queue, connection engine, and the redirect/tunnel driver.
//!
//! - Requests are encoded in full and sent one at a time; the next goes out only after the
//!   previous response has been read to its end.
//! - Responses are push-parsed from a `BytesMut` buffer (`h1::ResponseParser`).
//! - A connection engine never recurses: redirects and tunnel splices come back to
//!   [`Retriever`] as a [`NextAction`].

mod queue;
mod request;
mod response;

pub mod client;
pub mod connection;
pub mod h1;

pub use client::{Fetched, Plan, Retriever};
pub use connection::{ConnectionEngine, NextAction};
pub use h1::H1ResponseHandler;
pub use queue::RequestQueue;
pub use request::{Method, Request};
pub use response::{is_redirect_status, Response};
