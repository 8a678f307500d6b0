use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use super::{ServiceWorker, WorkerError};

/// Owns the active worker generation for a scope.
///
/// Registering a new generation installs it, then, without waiting for
/// clients to reload, swaps it in as the active worker, retires the previous
/// one and activates it. A failed install leaves the previous generation in
/// charge.
#[derive(Debug)]
pub struct Registration {
    scope: String,
    active: RwLock<Option<Arc<ServiceWorker>>>,
}

impl Registration {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            active: RwLock::new(None),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Installs and activates `worker`, superseding the current generation.
    pub async fn register(&self, worker: Arc<ServiceWorker>) -> Result<(), WorkerError> {
        info!(scope = %self.scope, version = %worker.version(), "installing worker");
        worker.install().await?;

        let previous = self.active.write().await.replace(Arc::clone(&worker));
        if let Some(previous) = previous {
            if !Arc::ptr_eq(&previous, &worker) {
                previous.retire();
            }
        }

        worker.activate().await?;
        info!(scope = %self.scope, version = %worker.version(), "worker activated");
        Ok(())
    }

    /// The generation currently receiving functional events.
    pub async fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.active.read().await.clone()
    }

    /// Retires the active generation and leaves the scope without a worker.
    pub async fn unregister(&self) -> bool {
        match self.active.write().await.take() {
            Some(worker) => {
                worker.retire();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;
    use crate::worker::{EventKind, EventOutcome, ExtendableEvent, HandlerTable, LifecycleState};

    fn table(fail_install: bool) -> HandlerTable {
        let mut table = HandlerTable::new();
        table.on(EventKind::Install, move |event: ExtendableEvent| async move {
            if fail_install {
                event.wait_until(async {
                    Err(WorkerError::PrecacheStatus {
                        url: "/static/js/main.js".into(),
                        status: StatusCode::NOT_FOUND,
                    })
                });
            }
            Ok(EventOutcome::Handled)
        });
        table
    }

    #[tokio::test]
    async fn new_generation_supersedes_old() {
        let registration = Registration::new("/");
        let v1 = Arc::new(ServiceWorker::new("v1", table(false)));
        let v2 = Arc::new(ServiceWorker::new("v2", table(false)));

        registration.register(Arc::clone(&v1)).await.unwrap();
        registration.register(Arc::clone(&v2)).await.unwrap();

        assert_eq!(v1.state(), LifecycleState::Redundant);
        assert_eq!(v2.state(), LifecycleState::Activated);
        assert_eq!(registration.active().await.unwrap().version(), "v2");
    }

    #[tokio::test]
    async fn failed_install_keeps_previous_generation() {
        let registration = Registration::new("/");
        let v1 = Arc::new(ServiceWorker::new("v1", table(false)));
        let v2 = Arc::new(ServiceWorker::new("v2", table(true)));

        registration.register(Arc::clone(&v1)).await.unwrap();
        assert!(registration.register(Arc::clone(&v2)).await.is_err());

        assert_eq!(v1.state(), LifecycleState::Activated);
        assert_eq!(v2.state(), LifecycleState::Redundant);
        assert_eq!(registration.active().await.unwrap().version(), "v1");
    }

    #[tokio::test]
    async fn unregister_retires_active() {
        let registration = Registration::new("/");
        let v1 = Arc::new(ServiceWorker::new("v1", table(false)));
        registration.register(Arc::clone(&v1)).await.unwrap();

        assert!(registration.unregister().await);
        assert!(!registration.unregister().await);
        assert!(registration.active().await.is_none());
        assert_eq!(v1.state(), LifecycleState::Redundant);
    }
}
