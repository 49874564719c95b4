/*
 * queue.rs
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

//! Ordered requests sent one at a time over a single transport.
//!
//! The front request stays queued until its response has been fully consumed, so the byte
//! stream framing stays aligned. Once handed to a connection engine the queue can no
//! longer be appended to.

use std::collections::VecDeque;

use crate::protocol::http::request::Request;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQueue {
    items: VecDeque<Request>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, request: Request) {
        self.items.push_back(request);
    }

    /// Request in flight, or next to send.
    pub fn front(&self) -> Option<&Request> {
        self.items.front()
    }

    pub fn pop_front(&mut self) -> Option<Request> {
        self.items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.items.iter()
    }
}

impl FromIterator<Request> for RequestQueue {
    fn from_iter<I: IntoIterator<Item = Request>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
