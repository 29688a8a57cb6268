//! Local HTTP front for the offline worker
//!
//! Every request that is not a control endpoint goes through the active
//! worker. Pages subscribe to worker messages over server-sent events and
//! post control messages as JSON.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /__shellcache/message` | deliver a page message (`SKIP_WAITING`) |
//! | `GET /__shellcache/events` | SSE stream of worker messages |
//! | `GET /__shellcache/health` | liveness and active worker state |
//! | anything else | intercepted fetch |

use crate::error::{ShellcacheError, ShellcacheResult};
use crate::fetch::{Destination, Network, Request, Response, Site};
use crate::worker::{ClientRegistry, ControlMessage, FetchOutcome, Registration};
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Prefix reserved for control endpoints
pub const CONTROL_PREFIX: &str = "/__shellcache";

#[derive(Clone)]
pub struct ProxyState {
    registration: Arc<Registration>,
    clients: Arc<ClientRegistry>,
    network: Arc<dyn Network>,
    site: Site,
}

impl ProxyState {
    pub fn new(
        registration: Arc<Registration>,
        clients: Arc<ClientRegistry>,
        network: Arc<dyn Network>,
        site: Site,
    ) -> Self {
        Self {
            registration,
            clients,
            network,
            site,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    state: String,
    waiting: bool,
}

#[derive(Serialize)]
struct MessageResponse {
    activated: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

async fn health(State(state): State<ProxyState>) -> impl IntoResponse {
    let active = state
        .registration
        .active()
        .await
        .map_or_else(|| "none".to_string(), |w| w.state().to_string());

    Json(HealthResponse {
        status: "ok".to_string(),
        state: active,
        waiting: state.registration.waiting().await.is_some(),
    })
}

async fn post_message(
    State(state): State<ProxyState>,
    Json(payload): Json<serde_json::Value>,
) -> axum::response::Response {
    let Some(message) = ControlMessage::from_value(&payload) else {
        debug!("Ignoring unrecognized message: {}", payload);
        return (
            StatusCode::ACCEPTED,
            Json(MessageResponse { activated: false }),
        )
            .into_response();
    };

    match state.registration.post_message(message).await {
        Ok(report) => (
            StatusCode::ACCEPTED,
            Json(MessageResponse {
                activated: report.is_some(),
            }),
        )
            .into_response(),
        Err(e) => {
            warn!("Message handling failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn events(State(state): State<ProxyState>) -> impl IntoResponse {
    let client = state.clients.connect().await;
    if let Some(active) = state.registration.active().await {
        state.clients.claim(active.id()).await;
    }
    info!("Client {} subscribed", client.id());

    let stream = UnboundedReceiverStream::new(client.into_receiver())
        .map(|message| Event::default().event("message").json_data(message));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn intercept(
    State(state): State<ProxyState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let url = match uri.scheme() {
        Some(_) => uri.to_string(),
        None => {
            let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
            format!("{}{}", state.site.origin, path)
        }
    };

    let request = match build_request(method, &url, &headers, body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let outcome = state.registration.handle_fetch(&request).await;
    let result = match outcome {
        Ok(FetchOutcome::Respond(response)) => Ok(response),
        Ok(FetchOutcome::Passthrough) => {
            debug!("Passthrough: {} {}", request.method(), request.url());
            state.network.fetch(&request).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => into_http(response),
        Err(e) => {
            warn!("{} {} failed: {}", request.method(), request.url(), e);
            error_response(StatusCode::BAD_GATEWAY, &e)
        }
    }
}

fn build_request(
    method: Method,
    url: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> ShellcacheResult<Request> {
    let mut request = Request::new(method, url)?
        .with_destination(destination_of(headers))
        .with_body(body.to_vec());

    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }
    Ok(request)
}

/// `Sec-Fetch-Dest` when the browser sent it, otherwise a guess from `Accept`
fn destination_of(headers: &HeaderMap) -> Destination {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    match header("sec-fetch-dest") {
        Some(dest) => Destination::from_header(dest),
        None => header("accept").map_or(Destination::Empty, Destination::from_accept),
    }
}

fn into_http(response: Response) -> axum::response::Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut http = axum::response::Response::new(Body::from(response.body));
    *http.status_mut() = status;

    let headers = http.headers_mut();
    for (name, value) in &response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => debug!("Dropping invalid response header {}", name),
        }
    }
    http
}

fn error_response(status: StatusCode, error: &ShellcacheError) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// Build the proxy router
pub fn router(state: ProxyState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(&format!("{}/message", CONTROL_PREFIX), post(post_message))
        .route(&format!("{}/events", CONTROL_PREFIX), get(events))
        .route(&format!("{}/health", CONTROL_PREFIX), get(health))
        .fallback(intercept)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Bind the listening socket
pub async fn bind(host: &str, port: u16) -> ShellcacheResult<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| ShellcacheError::Server(format!("invalid address {}:{}: {}", host, port, e)))?;
    TcpListener::bind(addr)
        .await
        .map_err(|e| ShellcacheError::io(format!("binding {}", addr), e))
}

/// Serve until the listener fails
pub async fn serve(
    listener: TcpListener,
    state: ProxyState,
    max_body_bytes: usize,
) -> ShellcacheResult<()> {
    axum::serve(listener, router(state, max_body_bytes))
        .await
        .map_err(|e| ShellcacheError::Server(e.to_string()))
}
