/*
 * config.rs
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

//! Runtime settings shared by every fetch. Built once by the driver from command-line flags.

use std::time::Duration;

/// Redirect budget when none is given.
pub const DEFAULT_MAX_REDIRECTS: u32 = 3;

/// Inactivity deadline applied to each I/O phase.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const USER_AGENT: &str = concat!("retriever/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    /// Value of the User-Agent header on every request.
    pub user_agent: String,
    /// Deadline for resolve, connect, handshake and for each read or write.
    pub io_timeout: Duration,
}

impl RetrieverSettings {
    pub fn with_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            io_timeout: DEFAULT_TIMEOUT,
        }
    }
}
