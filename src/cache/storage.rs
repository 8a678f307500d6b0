use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::Namespace;
use crate::http::{Request, Response};

/// The set of namespaces, keyed by name.
///
/// # Examples
///
/// ```
/// use swcache::cache::CacheStorage;
/// use swcache::http::{Request, Response, StatusCode};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let storage = CacheStorage::new();
/// let api = storage.open("forex-academy-api-v1").await;
/// api.put(&Request::get("/api/health"), Response::new(StatusCode::OK)).await;
///
/// assert!(storage.has("forex-academy-api-v1").await);
/// assert!(storage.delete("forex-academy-api-v1").await);
/// assert!(storage.keys().await.is_empty());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct CacheStorage {
    namespaces: RwLock<BTreeMap<String, Arc<Namespace>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the namespace called `name`, creating it if it does not exist.
    pub async fn open(&self, name: &str) -> Arc<Namespace> {
        if let Some(existing) = self.namespaces.read().await.get(name) {
            return Arc::clone(existing);
        }

        let mut namespaces = self.namespaces.write().await;
        let namespace = namespaces.entry(name.to_owned()).or_insert_with(|| {
            debug!(namespace = %name, "creating cache namespace");
            Arc::new(Namespace::new(name))
        });
        Arc::clone(namespace)
    }

    /// `true` if a namespace called `name` exists.
    pub async fn has(&self, name: &str) -> bool {
        self.namespaces.read().await.contains_key(name)
    }

    /// Deletes the namespace called `name` and every entry in it.
    ///
    /// Handles already returned by [`open`](Self::open) keep working but are
    /// no longer reachable from the storage.
    pub async fn delete(&self, name: &str) -> bool {
        self.namespaces.write().await.remove(name).is_some()
    }

    /// Names of all namespaces, in sorted order.
    pub async fn keys(&self) -> Vec<String> {
        self.namespaces.read().await.keys().cloned().collect()
    }

    /// Looks the request up in every namespace, returning the first hit in name order.
    pub async fn match_any(&self, request: &Request) -> Option<Response> {
        let namespaces: Vec<Arc<Namespace>> =
            self.namespaces.read().await.values().cloned().collect();
        for namespace in namespaces {
            if let Some(hit) = namespace.match_request(request).await {
                return Some(hit);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;

    #[tokio::test]
    async fn open_is_idempotent() {
        let storage = CacheStorage::new();
        let a = storage.open("forex-academy-static-v1").await;
        let b = storage.open("forex-academy-static-v1").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(storage.keys().await, vec!["forex-academy-static-v1"]);
    }

    #[tokio::test]
    async fn delete_drops_entries() {
        let storage = CacheStorage::new();
        let ns = storage.open("old").await;
        ns.put(&Request::get("/"), Response::new(StatusCode::OK)).await;

        assert!(storage.delete("old").await);
        assert!(!storage.has("old").await);
        assert!(storage.open("old").await.is_empty().await);
    }

    #[tokio::test]
    async fn match_any_searches_all_namespaces() {
        let storage = CacheStorage::new();
        storage
            .open("b")
            .await
            .put(&Request::get("/x"), Response::new(StatusCode::OK).body("b"))
            .await;
        storage
            .open("a")
            .await
            .put(&Request::get("/y"), Response::new(StatusCode::OK).body("a"))
            .await;

        assert_eq!(storage.match_any(&Request::get("/x")).await.unwrap().text(), "b");
        assert_eq!(storage.match_any(&Request::get("/y")).await.unwrap().text(), "a");
        assert!(storage.match_any(&Request::get("/z")).await.is_none());
    }
}
