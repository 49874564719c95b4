/*
 * client.rs
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

//! Retriever: plan a route for a URL, then run connection engines until a final response.
//!
//! Redirects and tunnel splices are handled here in a loop, one engine at a time, so the
//! stack never grows with the number of hops.

use tracing::{debug, info};
use url::Url;

use crate::config::RetrieverSettings;
use crate::error::FetchError;
use crate::net::{Endpoint, VerifyContext};
use crate::protocol::http::connection::{ConnectionEngine, NextAction};
use crate::protocol::http::queue::RequestQueue;
use crate::protocol::http::request::{Method, Request};
use crate::protocol::http::response::Response;
use crate::proxy::ProxyConfig;
use crate::target::{parse_url, resolve_location, Route, Target};

/// Everything needed to start fetching one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub route: Route,
    pub target: Target,
    /// Where the first socket goes: the origin, or the proxy.
    pub endpoint: Endpoint,
    pub queue: RequestQueue,
}

/// Final outcome of a fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// URL the response came from, after redirects.
    pub url: Url,
    pub response: Response,
    /// Redirects followed to get here.
    pub redirects: u32,
}

#[derive(Debug, Clone)]
pub struct Retriever {
    verify: VerifyContext,
    proxy: ProxyConfig,
    settings: RetrieverSettings,
}

impl Retriever {
    pub fn new(verify: VerifyContext, proxy: ProxyConfig, settings: RetrieverSettings) -> Self {
        Self {
            verify,
            proxy,
            settings,
        }
    }

    fn request(&self, method: Method, target: impl Into<String>, host: String) -> Request {
        let mut request = Request::new(method, target);
        request
            .header("Host", host)
            .header("User-Agent", self.settings.user_agent.as_str());
        if method == Method::Get {
            request.header("Accept", "*/*");
        }
        request
    }

    /// Choose the route for `url` and build the request queue for it.
    pub fn plan(&self, url: &Url) -> Result<Plan, FetchError> {
        let target = Target::from_url(url)?;
        let route = Route::select(target.scheme, &self.proxy);
        let mut queue = RequestQueue::new();
        let endpoint = match route {
            Route::Direct => {
                queue.push_back(self.request(Method::Get, target.path.as_str(), target.host_header()));
                Endpoint::new(&target.host, target.port, target.is_tls())
            }
            Route::ProxyRelay => {
                let mut get = self.request(Method::Get, target.absolute_url(), target.host_header());
                if let Some(auth) = self.proxy.authorization() {
                    get.header("Proxy-Authorization", auth);
                }
                queue.push_back(get);
                self.proxy.endpoint(self.proxy.ssl)
            }
            Route::ProxyTunnel => {
                if self.proxy.ssl {
                    return Err(FetchError::UnsupportedProxyTls {
                        host: self.proxy.host.clone(),
                        port: self.proxy.port,
                    });
                }
                let mut connect = self.request(Method::Connect, target.authority(), target.authority());
                if let Some(auth) = self.proxy.authorization() {
                    connect.header("Proxy-Authorization", auth);
                }
                queue.push_back(connect);
                queue.push_back(self.request(Method::Get, target.path.as_str(), target.host_header()));
                self.proxy.endpoint(false)
            }
        };
        Ok(Plan {
            route,
            target,
            endpoint,
            queue,
        })
    }

    /// Fetch `raw`, following at most `max_redirects` redirects.
    pub async fn fetch(&self, raw: &str, max_redirects: u32) -> Result<Fetched, FetchError> {
        let url = parse_url(raw)?;
        self.fetch_url(url, max_redirects).await
    }

    pub async fn fetch_url(&self, url: Url, max_redirects: u32) -> Result<Fetched, FetchError> {
        let mut url = url;
        let mut remaining = max_redirects;
        'redirects: loop {
            let plan = self.plan(&url)?;
            info!(url = %url, route = ?plan.route, via = %plan.endpoint, "fetching");
            for request in plan.queue.iter() {
                debug!(request = %request.request_line(), "queued");
            }
            let mut engine = ConnectionEngine::new(
                plan.endpoint.clone(),
                plan.queue,
                remaining,
                self.verify.clone(),
                &self.settings,
            );
            loop {
                match engine.run().await? {
                    NextAction::Done { mut responses } => {
                        let response = responses.pop().ok_or_else(|| FetchError::MalformedResponse {
                            host: plan.endpoint.host.clone(),
                            port: plan.endpoint.port,
                            reason: "connection closed with no response".to_string(),
                        })?;
                        return Ok(Fetched {
                            url,
                            response,
                            redirects: max_redirects - remaining,
                        });
                    }
                    NextAction::Redirect {
                        location,
                        redirects_remaining,
                    } => {
                        let next = resolve_location(&url, &location)?;
                        info!(from = %url, to = %next, remaining = redirects_remaining, "following redirect");
                        url = next;
                        remaining = redirects_remaining;
                        continue 'redirects;
                    }
                    NextAction::Splice { transport, queue } => {
                        let peer = Endpoint {
                            tls: true,
                            ..plan.endpoint.clone()
                        };
                        let transport = transport
                            .splice_to_tls(
                                &self.verify,
                                &plan.target.host,
                                &peer,
                                self.settings.io_timeout,
                            )
                            .await?;
                        engine = ConnectionEngine::over(
                            transport,
                            peer,
                            queue,
                            remaining,
                            self.verify.clone(),
                            &self.settings,
                        );
                    }
                }
            }
        }
    }
}
