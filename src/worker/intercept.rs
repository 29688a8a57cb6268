//! Request interception
//!
//! One decision per request. The only shared state is the cache store.
//!
//! | Request | Strategy |
//! |---------|----------|
//! | non-GET | passthrough |
//! | cross-origin, outside scope | passthrough |
//! | cached | served from cache |
//! | image | network, placeholder 404 on failure |
//! | anything else | network, entry point on failed navigation |

use super::ServiceWorker;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::fetch::{Destination, Request, Response, ResponseKind};
use std::sync::Arc;
use tracing::{debug, warn};
use ureq::http::Method;

/// What the interceptor decided to do with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not handled; the caller sends the request to the network itself
    Passthrough,
    /// Answered by the worker
    Respond(Response),
}

impl ServiceWorker {
    /// Handle one intercepted request
    pub async fn handle_fetch(&self, request: &Request) -> ShellcacheResult<FetchOutcome> {
        if !self.state().can_intercept_fetch() {
            return Ok(FetchOutcome::Passthrough);
        }

        if request.method() != Method::GET {
            return Ok(FetchOutcome::Passthrough);
        }

        let site = &self.settings.site;
        if request.origin() != &site.origin && !site.in_scope(request.path()) {
            return Ok(FetchOutcome::Passthrough);
        }

        if let Some(cached) = self.lookup(request.url()).await {
            debug!("Cache hit: {}", request.url());
            return Ok(FetchOutcome::Respond(cached));
        }

        let response = if request.destination() == Destination::Image {
            self.fetch_image(request).await
        } else {
            self.fetch_other(request).await?
        };
        Ok(FetchOutcome::Respond(response))
    }

    async fn fetch_image(&self, request: &Request) -> Response {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 {
                    self.store_runtime(request.url(), &response);
                }
                response
            }
            Err(e) => {
                debug!("Image fetch failed, serving placeholder: {}", e);
                Response::not_found().with_url(request.url())
            }
        }
    }

    async fn fetch_other(&self, request: &Request) -> ShellcacheResult<Response> {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 && response.kind == ResponseKind::Basic {
                    self.store_runtime(request.url(), &response);
                }
                Ok(response)
            }
            Err(e) if request.destination() == Destination::Document => {
                let entry_point = self.settings.site.entry_point_key();
                debug!(
                    "Navigation to {} failed ({}), falling back to {}",
                    request.url(),
                    e,
                    entry_point
                );
                self.lookup(&entry_point)
                    .await
                    .ok_or_else(|| ShellcacheError::Offline {
                        url: request.url().to_string(),
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// Cache lookup; a store that cannot be read counts as a miss
    async fn lookup(&self, key: &str) -> Option<Response> {
        match self.storage.match_any(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Cache lookup for {} failed: {}", key, e);
                None
            }
        }
    }

    /// Best-effort runtime capture in the background; the response is
    /// returned without waiting for the write
    fn store_runtime(&self, key: &str, response: &Response) {
        let storage = Arc::clone(&self.storage);
        let generation = self.settings.generations.runtime_name.clone();
        let key = key.to_string();
        let response = response.clone();

        self.track_runtime_write(async move {
            match storage.put(&generation, &key, &response).await {
                Ok(()) => debug!("Stored {} in {}", key, generation),
                Err(e) => warn!("Could not store {} in {}: {}", key, generation, e),
            }
        });
    }
}
