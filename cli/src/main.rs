/*
 * main.rs
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

//! retriever: fetch each URL given on the command line, one after another.

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use retriever_core::{Fetched, ProxyConfig, Retriever, RetrieverSettings, VerifyContext};
use tracing::{debug, error, info, warn};

mod cli;

use cli::Args;

/// Exit status for usage errors (no URLs, bad proxy spec).
const EXIT_USAGE: u8 = 255;

fn main() -> ExitCode {
    // Before tracing, so --help and --version print cleanly.
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "arguments parsed");

    if args.urls.is_empty() {
        error!("no URLs given");
        eprintln!("{}", Args::command().render_usage());
        return ExitCode::from(EXIT_USAGE);
    }

    let proxy = match args.proxy.as_deref() {
        Some(spec) => match ProxyConfig::from_spec(spec, args.proxy_auth.as_deref()) {
            Ok(proxy) => proxy,
            Err(e) => {
                error!(error = %e, "invalid proxy");
                return ExitCode::from(EXIT_USAGE);
            }
        },
        None => {
            if args.proxy_auth.is_some() {
                warn!("--proxy-auth given without --proxy, ignoring");
            }
            ProxyConfig::disabled()
        }
    };
    if proxy.enabled {
        info!(host = %proxy.host, port = proxy.port, ssl = proxy.ssl, "using proxy");
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "cannot start runtime");
            return ExitCode::FAILURE;
        }
    };

    let verify = VerifyContext::load();
    let settings = RetrieverSettings::default().with_timeout(Duration::from_secs(args.timeout));
    let retriever = Retriever::new(verify, proxy, settings);

    for url in &args.urls {
        match runtime.block_on(retriever.fetch(url, args.max_redirects)) {
            Ok(fetched) => report(&fetched),
            Err(e) => {
                let phase = e.phase().map(|p| p.as_str()).unwrap_or("setup");
                error!(url = %url, phase, error = %e, "fetch failed");
            }
        }
    }

    ExitCode::SUCCESS
}

/// Log the final status and headers, then copy the body to stdout.
fn report(fetched: &Fetched) {
    let response = &fetched.response;
    info!(
        url = %fetched.url,
        status = response.code,
        reason = response.reason.as_deref().unwrap_or(""),
        redirects = fetched.redirects,
        "response"
    );
    for (name, value) in &response.headers {
        info!("{}: {}", name, value);
    }
    let mut stdout = io::stdout().lock();
    if let Err(e) = stdout.write_all(&response.body).and_then(|()| stdout.flush()) {
        error!(url = %fetched.url, error = %e, "cannot write body to stdout");
    }
}
