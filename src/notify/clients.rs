use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::debug;

/// A window or tab running the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: u64,
    pub url: String,
    pub focused: bool,
    /// Version of the worker controlling this client, if any.
    pub controller: Option<String>,
}

/// The open clients within the worker's scope.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: RwLock<Vec<Client>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a client that loaded `url` without being controlled.
    pub async fn add(&self, url: impl Into<String>) -> Client {
        let client = Client {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            url: url.into(),
            focused: false,
            controller: None,
        };
        self.clients.write().await.push(client.clone());
        client
    }

    /// Makes `controller` the controller of every open client.
    ///
    /// Returns the number of clients that changed controller.
    pub async fn claim(&self, controller: &str) -> usize {
        let mut clients = self.clients.write().await;
        let mut claimed = 0;
        for client in clients.iter_mut() {
            if client.controller.as_deref() != Some(controller) {
                client.controller = Some(controller.to_owned());
                claimed += 1;
            }
        }
        debug!(controller, claimed, "claimed clients");
        claimed
    }

    /// Focuses the client already at `url`, or opens a new one there.
    ///
    /// The returned client is the only focused one afterwards.
    pub async fn open_window(&self, url: &str, controller: Option<&str>) -> Client {
        let mut clients = self.clients.write().await;
        for client in clients.iter_mut() {
            client.focused = false;
        }

        if let Some(existing) = clients.iter_mut().find(|c| c.url == url) {
            existing.focused = true;
            debug!(id = existing.id, url, "focused existing client");
            return existing.clone();
        }

        let client = Client {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            url: url.to_owned(),
            focused: true,
            controller: controller.map(str::to_owned),
        };
        debug!(id = client.id, url, "opened new client");
        clients.push(client.clone());
        client
    }

    pub async fn list(&self) -> Vec<Client> {
        self.clients.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_takes_every_client_once() {
        let registry = ClientRegistry::new();
        registry.add("/").await;
        registry.add("/courses").await;

        assert_eq!(registry.claim("v1").await, 2);
        assert_eq!(registry.claim("v1").await, 0);
        assert_eq!(registry.claim("v2").await, 2);
        assert!(
            registry
                .list()
                .await
                .iter()
                .all(|c| c.controller.as_deref() == Some("v2"))
        );
    }

    #[tokio::test]
    async fn open_window_focuses_existing() {
        let registry = ClientRegistry::new();
        let home = registry.add("/").await;
        registry.add("/courses").await;

        let opened = registry.open_window("/", Some("v1")).await;
        assert_eq!(opened.id, home.id);
        assert!(opened.focused);
        assert_eq!(registry.list().await.len(), 2);
    }

    #[tokio::test]
    async fn open_window_opens_when_absent() {
        let registry = ClientRegistry::new();
        let opened = registry.open_window("/", Some("v1")).await;
        assert_eq!(opened.controller.as_deref(), Some("v1"));

        let clients = registry.list().await;
        assert_eq!(clients.len(), 1);
        assert_eq!(clients.iter().filter(|c| c.focused).count(), 1);
    }
}
