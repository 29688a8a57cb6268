//! The active and waiting worker of a site

use super::{
    ActivationReport, ControlMessage, FetchOutcome, InstallReport, ServiceWorker, WorkerState,
};
use crate::error::ShellcacheResult;
use crate::fetch::Request;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// What happened to a newly registered worker after it installed
#[derive(Debug, Clone)]
pub enum RegisterOutcome {
    /// It took over as the active worker
    Activated(ActivationReport),
    /// It waits for `SKIP_WAITING` before taking over
    Waiting,
}

/// Tracks which worker version controls the site
#[derive(Default)]
pub struct Registration {
    active: RwLock<Option<Arc<ServiceWorker>>>,
    waiting: RwLock<Option<Arc<ServiceWorker>>>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new worker version and activate it when allowed.
    ///
    /// A failed install leaves the current active worker in place.
    pub async fn register(
        &self,
        worker: Arc<ServiceWorker>,
    ) -> ShellcacheResult<(InstallReport, RegisterOutcome)> {
        let installed = worker.install().await?;
        self.settle(worker, installed).await
    }

    /// Like `register`, with a progress callback for each precached asset
    pub async fn register_with_progress(
        &self,
        worker: Arc<ServiceWorker>,
        on_asset: &(dyn Fn(&str) + Send + Sync),
    ) -> ShellcacheResult<(InstallReport, RegisterOutcome)> {
        let installed = worker.install_with_progress(on_asset).await?;
        self.settle(worker, installed).await
    }

    async fn settle(
        &self,
        worker: Arc<ServiceWorker>,
        installed: InstallReport,
    ) -> ShellcacheResult<(InstallReport, RegisterOutcome)> {
        let no_active = self.active.read().await.is_none();
        if no_active || worker.skip_waiting_requested() {
            let superseded = self.waiting().await;
            let report = self.promote(worker, superseded).await?;
            return Ok((installed, RegisterOutcome::Activated(report)));
        }

        info!("Worker {} installed and waiting", worker.id());
        if let Some(previous) = self.waiting.write().await.replace(worker) {
            previous.set_state(WorkerState::Redundant);
        }
        Ok((installed, RegisterOutcome::Waiting))
    }

    /// Activate a worker from an install a previous run committed. Returns
    /// `None` when the stored static generation is missing or incomplete.
    pub async fn resume(
        &self,
        worker: Arc<ServiceWorker>,
    ) -> ShellcacheResult<Option<ActivationReport>> {
        if !worker.restore().await? {
            return Ok(None);
        }
        let superseded = self.waiting().await;
        self.promote(worker, superseded).await.map(Some)
    }

    /// Deliver a page message. Returns the activation report when the
    /// message caused the waiting worker to take over.
    pub async fn post_message(
        &self,
        message: ControlMessage,
    ) -> ShellcacheResult<Option<ActivationReport>> {
        match message {
            ControlMessage::SkipWaiting => {
                let waiting = self.waiting.write().await.take();
                let Some(worker) = waiting else {
                    debug!("SKIP_WAITING with no waiting worker");
                    return Ok(None);
                };
                worker.skip_waiting();
                self.promote(worker, None).await.map(Some)
            }
        }
    }

    /// Route a request to the active worker, if any
    pub async fn handle_fetch(&self, request: &Request) -> ShellcacheResult<FetchOutcome> {
        let active = self.active().await;
        match active {
            Some(worker) => worker.handle_fetch(request).await,
            None => Ok(FetchOutcome::Passthrough),
        }
    }

    pub async fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.active.read().await.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<ServiceWorker>> {
        self.waiting.read().await.clone()
    }

    /// Make `worker` the active worker. `superseded` is the waiting worker
    /// it replaces; one registered while the activation runs stays waiting.
    async fn promote(
        &self,
        worker: Arc<ServiceWorker>,
        superseded: Option<Arc<ServiceWorker>>,
    ) -> ShellcacheResult<ActivationReport> {
        if let Some(current) = self.active().await {
            current.flush_runtime_writes().await;
        }

        let report = worker.activate().await?;

        if let Some(previous) = self.active.write().await.replace(worker.clone()) {
            previous.set_state(WorkerState::Redundant);
        }

        let mut waiting = self.waiting.write().await;
        match waiting.take() {
            Some(w) if Arc::ptr_eq(&w, &worker) => {}
            Some(w) if superseded.as_ref().is_some_and(|s| Arc::ptr_eq(&w, s)) => {
                w.set_state(WorkerState::Redundant);
            }
            other => *waiting = other,
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{
        serve_assets, settings, settings_for, worker, Gate, GatedStorage, StubNetwork,
    };
    use super::*;
    use crate::cache::{CacheStorage, Generations, MemoryStorage};
    use crate::fetch::Request;

    fn v2() -> super::super::WorkerSettings {
        let mut settings = settings_for(Generations::new("ead-static-v2", "ead-runtime-v2"));
        settings.skip_waiting = false;
        settings
    }

    #[tokio::test]
    async fn first_worker_activates() {
        let registration = Registration::new();
        let network = Arc::new(StubNetwork::new());
        let mut s = settings();
        s.skip_waiting = false;
        serve_assets(&network, &s);

        let w = worker(s, Arc::new(MemoryStorage::new()), network);
        let (_, outcome) = registration.register(w.clone()).await.unwrap();

        assert!(matches!(outcome, RegisterOutcome::Activated(_)));
        assert_eq!(w.state(), WorkerState::Activated);
        assert!(registration.waiting().await.is_none());
    }

    #[tokio::test]
    async fn skip_waiting_replaces_active() {
        let registration = Registration::new();
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(StubNetwork::new());
        let s1 = settings();
        serve_assets(&network, &s1);
        let first = worker(s1, storage.clone(), network.clone());
        registration.register(first.clone()).await.unwrap();

        let mut s2 = settings_for(Generations::new("ead-static-v2", "ead-runtime-v2"));
        s2.skip_waiting = true;
        let second = worker(s2, storage.clone(), network);
        let (_, outcome) = registration.register(second.clone()).await.unwrap();

        match outcome {
            RegisterOutcome::Activated(report) => {
                assert!(report.deleted.contains(&"ead-static-v1".to_string()))
            }
            RegisterOutcome::Waiting => panic!("expected activation"),
        }
        assert_eq!(first.state(), WorkerState::Redundant);
        assert_eq!(registration.active().await.unwrap().id(), second.id());
        assert_eq!(storage.keys().await.unwrap(), vec!["ead-static-v2"]);
    }

    #[tokio::test]
    async fn worker_waits_until_skip_waiting_message() {
        let registration = Registration::new();
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(StubNetwork::new());
        let s1 = settings();
        serve_assets(&network, &s1);
        let first = worker(s1, storage.clone(), network.clone());
        registration.register(first.clone()).await.unwrap();

        let second = worker(v2(), storage.clone(), network);
        let (_, outcome) = registration.register(second.clone()).await.unwrap();
        assert!(matches!(outcome, RegisterOutcome::Waiting));
        assert_eq!(second.state(), WorkerState::Installed);
        assert_eq!(registration.active().await.unwrap().id(), first.id());

        let report = registration
            .post_message(ControlMessage::SkipWaiting)
            .await
            .unwrap()
            .unwrap();
        assert!(!report.deleted.is_empty());
        assert_eq!(second.state(), WorkerState::Activated);
        assert_eq!(first.state(), WorkerState::Redundant);
        assert!(registration.waiting().await.is_none());
    }

    #[tokio::test]
    async fn newer_waiting_worker_replaces_older_one() {
        let registration = Registration::new();
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(StubNetwork::new());
        let s1 = settings();
        serve_assets(&network, &s1);
        registration
            .register(worker(s1, storage.clone(), network.clone()))
            .await
            .unwrap();

        let older = worker(v2(), storage.clone(), network.clone());
        registration.register(older.clone()).await.unwrap();
        let newer = worker(v2(), storage, network);
        registration.register(newer.clone()).await.unwrap();

        assert_eq!(older.state(), WorkerState::Redundant);
        assert_eq!(registration.waiting().await.unwrap().id(), newer.id());
    }

    #[tokio::test]
    async fn worker_registered_during_promotion_stays_waiting() {
        let registration = Arc::new(Registration::new());
        let network = Arc::new(StubNetwork::new());
        let s1 = settings();
        serve_assets(&network, &s1);
        let first = worker(s1, Arc::new(MemoryStorage::new()), network.clone());
        registration.register(first.clone()).await.unwrap();

        let gated = Arc::new(GatedStorage::new(Gate::Keys));
        let second = worker(v2(), gated.clone(), network.clone());
        registration.register(second.clone()).await.unwrap();
        gated.arm();

        let promoting = {
            let registration = registration.clone();
            tokio::spawn(async move { registration.post_message(ControlMessage::SkipWaiting).await })
        };
        gated.entered().await;

        let third = worker(v2(), Arc::new(MemoryStorage::new()), network);
        let (_, outcome) = registration.register(third.clone()).await.unwrap();
        assert!(matches!(outcome, RegisterOutcome::Waiting));

        gated.release();
        assert!(promoting.await.unwrap().unwrap().is_some());

        assert_eq!(second.state(), WorkerState::Activated);
        assert_eq!(first.state(), WorkerState::Redundant);
        assert_eq!(third.state(), WorkerState::Installed);
        assert_eq!(registration.active().await.unwrap().id(), second.id());
        assert_eq!(registration.waiting().await.unwrap().id(), third.id());
    }

    #[tokio::test]
    async fn skip_waiting_activation_retires_older_waiting_worker() {
        let registration = Registration::new();
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(StubNetwork::new());
        let s1 = settings();
        serve_assets(&network, &s1);
        registration
            .register(worker(s1, storage.clone(), network.clone()))
            .await
            .unwrap();

        let parked = worker(v2(), storage.clone(), network.clone());
        registration.register(parked.clone()).await.unwrap();

        let mut eager = v2();
        eager.skip_waiting = true;
        let eager = worker(eager, storage, network);
        let (_, outcome) = registration.register(eager.clone()).await.unwrap();

        assert!(matches!(outcome, RegisterOutcome::Activated(_)));
        assert_eq!(parked.state(), WorkerState::Redundant);
        assert!(registration.waiting().await.is_none());
    }

    #[tokio::test]
    async fn skip_waiting_without_waiting_worker_is_noop() {
        let registration = Registration::new();
        assert!(registration
            .post_message(ControlMessage::SkipWaiting)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn failed_install_keeps_active_worker() {
        let registration = Registration::new();
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(StubNetwork::new());
        let s1 = settings();
        serve_assets(&network, &s1);
        let first = worker(s1, storage.clone(), network.clone());
        registration.register(first.clone()).await.unwrap();

        network.set_offline(true);
        let second = worker(v2(), storage, network);
        assert!(registration.register(second.clone()).await.is_err());

        assert_eq!(second.state(), WorkerState::Redundant);
        assert_eq!(registration.active().await.unwrap().id(), first.id());
        assert!(registration.waiting().await.is_none());
    }

    #[tokio::test]
    async fn resume_activates_from_stored_generation() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(StubNetwork::new());
        let s = settings();
        serve_assets(&network, &s);
        worker(s.clone(), storage.clone(), network.clone())
            .install()
            .await
            .unwrap();

        network.set_offline(true);
        let registration = Registration::new();
        let w = worker(s, storage, network);
        assert!(registration.resume(w.clone()).await.unwrap().is_some());
        assert_eq!(registration.active().await.unwrap().id(), w.id());
    }

    #[tokio::test]
    async fn fetch_without_active_worker_passes_through() {
        let registration = Registration::new();
        let request = Request::get("http://site.test/EAD-web/").unwrap();
        assert_eq!(
            registration.handle_fetch(&request).await.unwrap(),
            FetchOutcome::Passthrough
        );
    }
}
