//! Network access for cache misses and pass-through requests
//!
//! The `Network` trait is the seam the worker fetches through, so tests can
//! substitute an in-process network. `HttpNetwork` is the real one.

use super::{Origin, Request, Response, ResponseKind};
use crate::config::Config;
use crate::error::{ShellcacheError, ShellcacheResult};
use async_trait::async_trait;
use tracing::debug;

/// Request headers that are not forwarded upstream
const SKIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "content-length",
    "accept-encoding",
];

/// Response headers that describe the upstream connection rather than the body
const SKIPPED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
    "upgrade",
    "trailer",
];

/// Abstract network interface
///
/// A fetch resolves with whatever status the server answered; only
/// transport failures (DNS, refused connection, reset) are errors.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request and buffer the full response
    async fn fetch(&self, request: &Request) -> ShellcacheResult<Response>;
}

/// HTTP network backed by a `ureq` agent
///
/// Requests run on tokio's blocking pool. No timeouts are configured: a hung
/// upstream only stalls the request it serves.
#[derive(Clone)]
pub struct HttpNetwork {
    agent: ureq::Agent,
    site_origin: Origin,
    user_agent: String,
    max_response_bytes: u64,
}

impl HttpNetwork {
    /// Create a network client for the given site origin
    pub fn new(site_origin: Origin, user_agent: impl Into<String>, max_response_bytes: u64) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            site_origin,
            user_agent: user_agent.into(),
            max_response_bytes,
        }
    }

    /// Network client for the site and limits in `config`
    pub fn from_config(config: &Config) -> ShellcacheResult<Self> {
        Ok(Self::new(
            config.site()?.origin,
            config.network.user_agent.clone(),
            config.network.max_response_bytes,
        ))
    }

    fn response_kind(&self, request: &Request) -> ResponseKind {
        if request.origin() == &self.site_origin {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        }
    }

    fn fetch_blocking(
        agent: &ureq::Agent,
        request: &Request,
        user_agent: &str,
        limit: u64,
    ) -> Result<(u16, Vec<(String, String)>, Vec<u8>), String> {
        let mut builder = ureq::http::Request::builder()
            .method(request.method().clone())
            .uri(request.url())
            .header("user-agent", user_agent);

        for (name, value) in request.headers() {
            if is_skipped(name, SKIPPED_REQUEST_HEADERS) || name.eq_ignore_ascii_case("user-agent")
            {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = if request.body().is_empty() {
            let http_request = builder.body(()).map_err(|e| e.to_string())?;
            agent.run(http_request)
        } else {
            let http_request = builder
                .body(request.body().to_vec())
                .map_err(|e| e.to_string())?;
            agent.run(http_request)
        }
        .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_skipped(name.as_str(), SKIPPED_RESPONSE_HEADERS))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let (_, mut body) = response.into_parts();
        let bytes = body
            .with_config()
            .limit(limit)
            .read_to_vec()
            .map_err(|e| e.to_string())?;

        Ok((status, headers, bytes))
    }
}

fn is_skipped(name: &str, list: &[&str]) -> bool {
    list.iter().any(|skip| name.eq_ignore_ascii_case(skip))
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> ShellcacheResult<Response> {
        let agent = self.agent.clone();
        let owned = request.clone();
        let user_agent = self.user_agent.clone();
        let limit = self.max_response_bytes;

        debug!("{} {}", request.method(), request.url());

        let (status, headers, body) = tokio::task::spawn_blocking(move || {
            Self::fetch_blocking(&agent, &owned, &user_agent, limit)
        })
        .await
        .map_err(|e| ShellcacheError::Internal(format!("fetch task panicked: {}", e)))?
        .map_err(|reason| ShellcacheError::network(request.url(), reason))?;

        debug!("{} {} -> {}", request.method(), request.url(), status);

        Ok(Response {
            status,
            kind: self.response_kind(request),
            url: request.url().to_string(),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> HttpNetwork {
        HttpNetwork::new(
            Origin::parse("http://127.0.0.1:1").unwrap(),
            "shellcache-test",
            1024,
        )
    }

    #[test]
    fn same_origin_is_basic() {
        let net = network();
        let request = Request::get("http://127.0.0.1:1/index.html").unwrap();
        assert_eq!(net.response_kind(&request), ResponseKind::Basic);

        let request = Request::get("http://cdn.example.com/lib.js").unwrap();
        assert_eq!(net.response_kind(&request), ResponseKind::Cors);
    }

    #[test]
    fn hop_by_hop_headers_skipped() {
        assert!(is_skipped("Connection", SKIPPED_REQUEST_HEADERS));
        assert!(is_skipped("Accept-Encoding", SKIPPED_REQUEST_HEADERS));
        assert!(!is_skipped("Accept", SKIPPED_REQUEST_HEADERS));
        assert!(is_skipped("Transfer-Encoding", SKIPPED_RESPONSE_HEADERS));
        assert!(!is_skipped("Content-Type", SKIPPED_RESPONSE_HEADERS));
    }

    #[test]
    fn from_config_uses_site_origin() {
        let net = HttpNetwork::from_config(&Config::default()).unwrap();
        assert_eq!(net.site_origin.to_string(), "http://127.0.0.1:8080");
        assert!(net.user_agent.starts_with("shellcache/"));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let net = network();
        let request = Request::get("http://127.0.0.1:1/index.html").unwrap();
        let err = net.fetch(&request).await.unwrap_err();
        assert!(err.is_network());
    }
}
