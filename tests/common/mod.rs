#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use swcache::cache::CacheStorage;
use swcache::config::Config;
use swcache::network::{FetchError, FetchFuture, Network};
use swcache::notify::{ClientRegistry, NotificationCenter};
use swcache::offline::OfflineCacheManager;
use swcache::worker::{EventLoop, Registration, WorkerHandle};
use swcache::{Request, Response, StatusCode};

#[derive(Clone)]
enum Scripted {
    Respond(StatusCode, String, &'static str),
    Fail,
}

/// A scripted upstream that records every URL it is asked for.
///
/// Unscripted URLs answer `404`. While offline, everything fails.
#[derive(Default)]
pub struct FakeNetwork {
    script: Mutex<HashMap<String, Scripted>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answers every URL of the default manifests with `200`.
    pub fn serving_defaults() -> Arc<Self> {
        let network = Self::new();
        let config = Config::default();
        for url in &config.static_manifest {
            network.text(url, &format!("asset {url}"));
        }
        for url in &config.api_manifest {
            network.json(url, &serde_json::json!({ "url": url, "fresh": 1 }));
        }
        network
    }

    pub fn text(&self, url: &str, body: &str) {
        self.respond(url, StatusCode::OK, body, "text/plain");
    }

    pub fn json(&self, url: &str, body: &Value) {
        self.respond(url, StatusCode::OK, &body.to_string(), "application/json");
    }

    pub fn respond(&self, url: &str, status: StatusCode, body: &str, content_type: &'static str) {
        self.script
            .lock()
            .unwrap()
            .insert(url.to_owned(), Scripted::Respond(status, body.to_owned(), content_type));
    }

    pub fn fail(&self, url: &str) {
        self.script.lock().unwrap().insert(url.to_owned(), Scripted::Fail);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Network for FakeNetwork {
    fn fetch<'a>(&'a self, request: &'a Request) -> FetchFuture<'a> {
        Box::pin(async move {
            let url = request.url().to_owned();
            self.calls.lock().unwrap().push(url.clone());
            tokio::task::yield_now().await;

            if self.offline.load(Ordering::SeqCst) {
                return Err(FetchError::Offline(url));
            }
            let scripted = self.script.lock().unwrap().get(&url).cloned();
            match scripted {
                Some(Scripted::Respond(status, body, content_type)) => Ok(Response::new(status)
                    .header("Content-Type", content_type)
                    .body(body)),
                Some(Scripted::Fail) => Err(FetchError::Offline(url)),
                None => Ok(Response::new(StatusCode::NOT_FOUND)),
            }
        })
    }
}

pub struct Harness {
    pub network: Arc<FakeNetwork>,
    pub manager: Arc<OfflineCacheManager>,
    pub registration: Arc<Registration>,
    pub worker: WorkerHandle,
}

impl Harness {
    /// Registers a worker for `config` against `network` and starts its event loop.
    pub async fn start(config: Config, network: Arc<FakeNetwork>) -> Self {
        Self::with_storage(config, network, Arc::new(CacheStorage::new())).await
    }

    pub async fn with_storage(
        config: Config,
        network: Arc<FakeNetwork>,
        storage: Arc<CacheStorage>,
    ) -> Self {
        let manager = Arc::new(OfflineCacheManager::new(
            config,
            storage,
            network.clone(),
            Arc::new(NotificationCenter::new()),
            Arc::new(ClientRegistry::new()),
        ));
        let registration = Arc::new(Registration::new("/"));
        registration
            .register(Arc::new(Arc::clone(&manager).into_worker()))
            .await
            .expect("worker installs");
        let (worker, _task) = EventLoop::spawn(Arc::clone(&registration), 32);
        Self {
            network,
            manager,
            registration,
            worker,
        }
    }

    pub async fn fetch(&self, request: Request) -> Result<Response, swcache::worker::WorkerError> {
        self.worker.fetch(request).await
    }
}
