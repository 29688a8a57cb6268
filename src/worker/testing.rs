//! Test doubles shared by the worker and proxy tests

use super::{ClientRegistry, ServiceWorker, WorkerSettings};
use crate::cache::{CacheStorage, GenerationInfo, Generations, MemoryStorage};
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::fetch::{cache_key, Network, Request, Response, ResponseKind, Site};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub(crate) const ORIGIN: &str = "http://site.test";

/// In-process network with canned responses
///
/// Unrouted URLs answer 404. While offline every fetch fails like a refused
/// connection.
pub(crate) struct StubNetwork {
    routes: Mutex<HashMap<String, Response>>,
    failing: Mutex<Vec<String>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl StubNetwork {
    pub(crate) fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serve `body` with status 200 for `url`
    pub(crate) fn route(&self, url: &str, body: &str) {
        self.route_response(url, Response::new(200, body).with_kind(ResponseKind::Basic));
    }

    pub(crate) fn route_response(&self, url: &str, response: Response) {
        let key = cache_key(url).unwrap();
        self.routes
            .lock()
            .unwrap()
            .insert(key.clone(), response.with_url(key));
    }

    /// Make a single URL fail at the transport level
    pub(crate) fn fail(&self, url: &str) {
        self.failing.lock().unwrap().push(cache_key(url).unwrap());
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> ShellcacheResult<Response> {
        self.calls.lock().unwrap().push(request.url().to_string());

        if self.offline.load(Ordering::SeqCst)
            || self.failing.lock().unwrap().iter().any(|u| u == request.url())
        {
            return Err(ShellcacheError::network(request.url(), "connection refused"));
        }

        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(request.url())
            .cloned()
            .unwrap_or_else(|| {
                Response::new(404, "not found")
                    .with_kind(ResponseKind::Basic)
                    .with_url(request.url())
            }))
    }
}

/// Settings for a site living under `/EAD-web/` on `ORIGIN`
pub(crate) fn settings() -> WorkerSettings {
    settings_for(Generations::new("ead-static-v1", "ead-runtime-v1"))
}

pub(crate) fn settings_for(generations: Generations) -> WorkerSettings {
    WorkerSettings {
        site: Site::new(ORIGIN, "/EAD-web/", "/EAD-web/index.html").unwrap(),
        generations,
        assets: vec![
            "/EAD-web/".to_string(),
            "/EAD-web/index.html".to_string(),
            "/EAD-web/styles.css".to_string(),
            "/EAD-web/main.js".to_string(),
            "/EAD-web/Logo simple Taller (snf blanco).png".to_string(),
            "/EAD-web/manifest.json".to_string(),
        ],
        skip_waiting: true,
        update_message: "A new version is available. Reload the page to update.".to_string(),
    }
}

/// Route every asset of `settings` on the stub network
pub(crate) fn serve_assets(network: &StubNetwork, settings: &WorkerSettings) {
    for asset in &settings.assets {
        network.route(&settings.site.resolve(asset), &format!("content of {}", asset));
    }
}

pub(crate) fn worker(
    settings: WorkerSettings,
    storage: Arc<dyn CacheStorage>,
    network: Arc<StubNetwork>,
) -> Arc<ServiceWorker> {
    worker_with_clients(settings, storage, network, Arc::new(ClientRegistry::new()))
}

pub(crate) fn worker_with_clients(
    settings: WorkerSettings,
    storage: Arc<dyn CacheStorage>,
    network: Arc<StubNetwork>,
    clients: Arc<ClientRegistry>,
) -> Arc<ServiceWorker> {
    Arc::new(ServiceWorker::new(settings, storage, network, clients))
}

/// Install and activate a worker against a network that serves every asset
pub(crate) async fn active_worker(
    storage: Arc<dyn CacheStorage>,
    network: Arc<StubNetwork>,
) -> Arc<ServiceWorker> {
    let settings = settings();
    serve_assets(&network, &settings);
    let w = worker(settings, storage, network.clone());
    w.install().await.unwrap();
    w.activate().await.unwrap();
    network.clear_calls();
    w
}

/// Storage call a `GatedStorage` can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Keys,
    Put,
}

/// Memory storage that parks one call of the gated kind until released
pub(crate) struct GatedStorage {
    inner: MemoryStorage,
    gate: Gate,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedStorage {
    pub(crate) fn new(gate: Gate) -> Self {
        Self {
            inner: MemoryStorage::new(),
            gate,
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// The next gated call blocks until `release`
    pub(crate) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Resolves once a gated call is parked
    pub(crate) async fn entered(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self, call: Gate) {
        if call == self.gate && self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

#[async_trait]
impl CacheStorage for GatedStorage {
    async fn open(&self, generation: &str) -> ShellcacheResult<()> {
        self.inner.open(generation).await
    }
    async fn has(&self, generation: &str) -> ShellcacheResult<bool> {
        self.inner.has(generation).await
    }
    async fn keys(&self) -> ShellcacheResult<Vec<String>> {
        self.pass(Gate::Keys).await;
        self.inner.keys().await
    }
    async fn delete(&self, generation: &str) -> ShellcacheResult<bool> {
        self.inner.delete(generation).await
    }
    async fn match_in(&self, generation: &str, key: &str) -> ShellcacheResult<Option<Response>> {
        self.inner.match_in(generation, key).await
    }
    async fn put(&self, generation: &str, key: &str, response: &Response) -> ShellcacheResult<()> {
        self.pass(Gate::Put).await;
        self.inner.put(generation, key, response).await
    }
    async fn put_all(
        &self,
        generation: &str,
        entries: &[(String, Response)],
    ) -> ShellcacheResult<()> {
        self.inner.put_all(generation, entries).await
    }
    async fn entries(&self, generation: &str) -> ShellcacheResult<Vec<String>> {
        self.inner.entries(generation).await
    }
    async fn info(&self) -> ShellcacheResult<Vec<GenerationInfo>> {
        self.inner.info().await
    }
}
