//! The offline cache manager.
//!
//! Decides, per intercepted request, whether to answer from the network or a
//! cache namespace, keeps the namespaces warm, and synthesizes degraded
//! responses when neither is available:
//!
//! | Request                         | Strategy      | When both fail              |
//! |---------------------------------|---------------|-----------------------------|
//! | path under the API prefix       | network-first | canned JSON, status 200     |
//! | navigation                      | cache-first   | embedded offline page       |
//! | any other                       | cache-first   | the network error           |
//!
//! [`OfflineCacheManager::handlers`] wires the manager into a worker's
//! [`HandlerTable`]; the async methods can also be called directly.

pub mod fallback;
pub mod strategy;

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStorage};
use crate::config::{Config, NamespaceNames};
use crate::http::{Request, Response};
use crate::network::{FetchError, Network};
use crate::notify::{Client, ClientRegistry, NotificationCenter, NotificationClick, PushPayload};
use crate::worker::{
    Event, EventKind, EventOutcome, ExtendableEvent, HandlerTable, ServiceWorker, WorkerError,
};

use strategy::Source;

/// Outcome of one background data sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// URLs whose entry was overwritten with a fresh 2xx response.
    pub refreshed: Vec<String>,
    /// URLs that answered with a non-2xx status; their entry is untouched.
    pub skipped: Vec<String>,
    /// URLs whose fetch failed outright.
    pub failed: Vec<String>,
}

impl SyncReport {
    pub fn attempted(&self) -> usize {
        self.refreshed.len() + self.skipped.len() + self.failed.len()
    }
}

pub struct OfflineCacheManager {
    config: Config,
    names: NamespaceNames,
    storage: Arc<CacheStorage>,
    network: Arc<dyn Network>,
    notifications: Arc<NotificationCenter>,
    clients: Arc<ClientRegistry>,
}

impl OfflineCacheManager {
    pub fn new(
        config: Config,
        storage: Arc<CacheStorage>,
        network: Arc<dyn Network>,
        notifications: Arc<NotificationCenter>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        let names = config.namespaces();
        Self {
            config,
            names,
            storage,
            network,
            notifications,
            clients,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn namespaces(&self) -> &NamespaceNames {
        &self.names
    }

    pub fn storage(&self) -> &Arc<CacheStorage> {
        &self.storage
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// Builds a worker generation driven by this manager.
    pub fn into_worker(self: Arc<Self>) -> ServiceWorker {
        let version = self.config.version.clone();
        ServiceWorker::new(version, self.handlers())
    }

    /// The handler table binding every worker event to this manager.
    pub fn handlers(self: &Arc<Self>) -> HandlerTable {
        let mut table = HandlerTable::new();

        let manager = Arc::clone(self);
        table.on(EventKind::Install, move |event: ExtendableEvent| {
            let manager = Arc::clone(&manager);
            async move {
                event.wait_until(async move { manager.install().await });
                Ok(EventOutcome::Handled)
            }
        });

        let manager = Arc::clone(self);
        table.on(EventKind::Activate, move |event: ExtendableEvent| {
            let manager = Arc::clone(&manager);
            async move {
                event.wait_until(async move {
                    manager.activate().await;
                    Ok(())
                });
                Ok(EventOutcome::Handled)
            }
        });

        let manager = Arc::clone(self);
        table.on(EventKind::Fetch, move |event: ExtendableEvent| {
            let manager = Arc::clone(&manager);
            async move {
                match event.into_event() {
                    Event::Fetch(request) => {
                        let response = manager.handle_fetch(&request).await?;
                        Ok(EventOutcome::Responded(response))
                    }
                    _ => Ok(EventOutcome::Ignored),
                }
            }
        });

        let manager = Arc::clone(self);
        table.on(EventKind::Sync, move |event: ExtendableEvent| {
            let manager = Arc::clone(&manager);
            async move {
                let Event::Sync { tag } = event.event() else {
                    return Ok(EventOutcome::Ignored);
                };
                if *tag != manager.config.sync_tag {
                    debug!(tag = %tag, "ignoring sync event with unknown tag");
                    return Ok(EventOutcome::Ignored);
                }
                event.wait_until(async move {
                    manager.sync_api_data().await;
                    Ok(())
                });
                Ok(EventOutcome::Handled)
            }
        });

        let manager = Arc::clone(self);
        table.on(EventKind::Push, move |event: ExtendableEvent| {
            let manager = Arc::clone(&manager);
            async move {
                let Event::Push { data } = event.event() else {
                    return Ok(EventOutcome::Ignored);
                };
                let Some(data) = data.clone() else {
                    return Ok(EventOutcome::Ignored);
                };
                event.wait_until(async move {
                    manager.handle_push(&data).await?;
                    Ok(())
                });
                Ok(EventOutcome::Handled)
            }
        });

        let manager = Arc::clone(self);
        table.on(EventKind::NotificationClick, move |event: ExtendableEvent| {
            let manager = Arc::clone(&manager);
            async move {
                let Event::NotificationClick(click) = event.event() else {
                    return Ok(EventOutcome::Ignored);
                };
                let click = click.clone();
                event.wait_until(async move {
                    manager.handle_notification_click(&click).await;
                    Ok(())
                });
                Ok(EventOutcome::Handled)
            }
        });

        table
    }

    /// Install step: static manifest all-or-nothing, API manifest best-effort,
    /// both concurrently.
    pub async fn install(&self) -> Result<(), WorkerError> {
        let (static_result, api_cached) = tokio::join!(self.precache_static(), self.precache_api());
        let static_cached = static_result?;
        info!(
            version = %self.config.version,
            static_cached,
            api_cached,
            "install complete"
        );
        Ok(())
    }

    /// Fetches every static manifest URL and stores them in one batch.
    ///
    /// Any fetch error or non-2xx response aborts the whole step and nothing
    /// from the manifest is stored.
    pub async fn precache_static(&self) -> Result<usize, WorkerError> {
        info!(count = self.config.static_manifest.len(), "caching static files");
        let namespace = self.storage.open(&self.names.static_assets).await;

        let mut batch = Vec::with_capacity(self.config.static_manifest.len());
        for url in &self.config.static_manifest {
            let request = Request::get(url.as_str());
            let response = self.network.fetch(&request).await.map_err(|source| {
                WorkerError::PrecacheFetch {
                    url: url.clone(),
                    source,
                }
            })?;
            if !response.is_success() {
                return Err(WorkerError::PrecacheStatus {
                    url: url.clone(),
                    status: response.status(),
                });
            }
            batch.push((CacheKey::from(&request), response));
        }

        let count = batch.len();
        namespace.put_all(batch).await;
        Ok(count)
    }

    /// Fetches every API manifest URL concurrently, storing the 2xx ones.
    /// Failures are logged and skipped. Returns how many were stored.
    pub async fn precache_api(&self) -> usize {
        info!(count = self.config.api_manifest.len(), "pre-caching API endpoints");
        let namespace = self.storage.open(&self.names.api).await;

        let mut tasks = JoinSet::new();
        for url in self.config.api_manifest.iter().cloned() {
            let network = Arc::clone(&self.network);
            let namespace = Arc::clone(&namespace);
            tasks.spawn(async move {
                let request = Request::get(url.as_str());
                match network.fetch(&request).await {
                    Ok(response) if response.is_success() => {
                        namespace.put(&request, response).await;
                        true
                    }
                    Ok(response) => {
                        debug!(url = %url, status = %response.status(), "not pre-caching non-2xx response");
                        false
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "failed to pre-cache");
                        false
                    }
                }
            });
        }

        let mut cached = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => cached += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "pre-cache task failed"),
            }
        }
        cached
    }

    /// Activate step: drop foreign namespaces, then claim open clients.
    ///
    /// Returns the names of the namespaces that were deleted.
    pub async fn activate(&self) -> Vec<String> {
        let deleted = self.prune_namespaces().await;
        let claimed = self.clients.claim(&self.config.version).await;
        info!(
            version = %self.config.version,
            deleted = deleted.len(),
            claimed,
            "activated"
        );
        deleted
    }

    /// Deletes every namespace whose name is not one of the three current names.
    pub async fn prune_namespaces(&self) -> Vec<String> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await {
            if self.names.contains(&name) {
                continue;
            }
            info!(namespace = %name, "deleting old cache");
            if self.storage.delete(&name).await {
                deleted.push(name);
            }
        }
        deleted
    }

    /// Routes a request to the strategy for its path.
    ///
    /// Only a non-navigation request outside the API prefix can fail; every
    /// other failure is answered with cached or synthesized content.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if self.config.is_api_path(request.path()) {
            Ok(self.handle_api_request(request).await)
        } else {
            self.handle_static_request(request).await
        }
    }

    /// Network-first against the API namespace, then the fallback table.
    pub async fn handle_api_request(&self, request: &Request) -> Response {
        let namespace = self.storage.open(&self.names.api).await;
        match strategy::network_first(self.network.as_ref(), &namespace, request).await {
            Ok((response, source)) => {
                if source == Source::Cache {
                    debug!(path = %request.path(), "served API request from cache");
                }
                response
            }
            Err(e) => {
                info!(path = %request.path(), error = %e, "serving offline API response");
                fallback::offline_api_response(request.path())
            }
        }
    }

    /// Cache-first against the static namespace, then the offline page for
    /// navigations.
    pub async fn handle_static_request(&self, request: &Request) -> Result<Response, FetchError> {
        let namespace = self.storage.open(&self.names.static_assets).await;
        match strategy::cache_first(self.network.as_ref(), &namespace, request).await {
            Ok((response, _)) => Ok(response),
            Err(e) if request.is_navigation() => {
                info!(url = %request.url(), error = %e, "serving offline page");
                Ok(fallback::offline_page())
            }
            Err(e) => {
                info!(url = %request.url(), error = %e, "both cache and network failed");
                Err(e)
            }
        }
    }

    /// Re-fetches every API manifest URL in order, overwriting entries that
    /// come back 2xx. One URL's failure never stops the others.
    pub async fn sync_api_data(&self) -> SyncReport {
        info!("syncing data in background");
        let namespace = self.storage.open(&self.names.api).await;
        let mut report = SyncReport::default();

        for url in &self.config.api_manifest {
            let request = Request::get(url.as_str());
            match self.network.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    namespace.put(&request, response).await;
                    debug!(url = %url, "synced");
                    report.refreshed.push(url.clone());
                }
                Ok(response) => {
                    debug!(url = %url, status = %response.status(), "sync skipped non-2xx response");
                    report.skipped.push(url.clone());
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "failed to sync");
                    report.failed.push(url.clone());
                }
            }
        }

        info!(
            refreshed = report.refreshed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "background sync finished"
        );
        report
    }

    /// Shows the notification described by a push payload. Returns its id.
    pub async fn handle_push(&self, data: &Bytes) -> Result<u64, WorkerError> {
        let payload = PushPayload::from_slice(data)?;
        let notification = payload.into_notification(&self.config.notification);
        Ok(self.notifications.show(notification).await)
    }

    /// Closes the clicked notification; on the `open` action, opens or
    /// focuses the application root. Returns that client, if any.
    pub async fn handle_notification_click(&self, click: &NotificationClick) -> Option<Client> {
        if let Some(id) = click.notification_id {
            self.notifications.close(id).await;
        }
        if !click.is_open() {
            debug!(action = ?click.action, "notification dismissed");
            return None;
        }
        let client = self
            .clients
            .open_window(&self.config.app_root, Some(&self.config.version))
            .await;
        Some(client)
    }
}

impl std::fmt::Debug for OfflineCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineCacheManager")
            .field("version", &self.config.version)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::FetchFuture;

    struct Unreachable;

    impl Network for Unreachable {
        fn fetch<'a>(&'a self, request: &'a Request) -> FetchFuture<'a> {
            let url = request.url().to_owned();
            Box::pin(async move { Err(FetchError::Offline(url)) })
        }
    }

    fn manager() -> OfflineCacheManager {
        OfflineCacheManager::new(
            Config::default(),
            Arc::new(CacheStorage::new()),
            Arc::new(Unreachable),
            Arc::new(NotificationCenter::new()),
            Arc::new(ClientRegistry::new()),
        )
    }

    #[tokio::test]
    async fn prune_keeps_only_current_names() {
        let manager = manager();
        for name in ["forex-academy-static-v0", "forex-academy-api-v1", "unrelated", "forex-academy-v1"] {
            manager.storage().open(name).await;
        }

        let mut deleted = manager.prune_namespaces().await;
        deleted.sort();
        assert_eq!(deleted, vec!["forex-academy-static-v0", "unrelated"]);
        assert_eq!(
            manager.storage().keys().await,
            vec!["forex-academy-api-v1", "forex-academy-v1"]
        );
    }

    #[tokio::test]
    async fn offline_api_without_cache_is_synthesized() {
        let manager = manager();
        let response = manager.handle_api_request(&Request::get("/api/health")).await;
        assert!(response.is_synthesized());
        assert!(manager.storage().open("forex-academy-api-v1").await.is_empty().await);
    }

    #[tokio::test]
    async fn dismiss_click_only_closes() {
        let manager = manager();
        let id = manager
            .handle_push(&Bytes::from_static(br#"{"title":"EURUSD"}"#))
            .await
            .unwrap();
        let click = NotificationClick {
            notification_id: Some(id),
            action: Some("dismiss".into()),
        };

        assert!(manager.handle_notification_click(&click).await.is_none());
        assert!(manager.notifications().list().await.is_empty());
        assert!(manager.clients().list().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_push_payload_is_an_error() {
        let manager = manager();
        let result = manager.handle_push(&Bytes::from_static(b"not json")).await;
        assert!(matches!(result, Err(WorkerError::Notify(_))));
    }
}
