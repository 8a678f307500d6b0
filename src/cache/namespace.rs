use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::trace;

use super::CacheKey;
use crate::http::{Request, Response};

/// A stored response together with the moment it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub response: Response,
    pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            cached_at: Utc::now(),
        }
    }

    pub fn age_seconds(&self) -> i64 {
        (Utc::now() - self.cached_at).num_seconds().max(0)
    }
}

/// One named partition of cached request/response pairs.
///
/// At most one entry exists per key; [`put`](Self::put) replaces whatever was
/// there. Concurrent writers to the same key resolve last-write-wins.
#[derive(Debug)]
pub struct Namespace {
    name: String,
    entries: RwLock<HashMap<CacheKey, CachedResponse>>,
}

impl Namespace {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores `response` under the request's key, replacing any prior entry.
    pub async fn put(&self, request: &Request, response: Response) {
        self.put_key(CacheKey::from(request), response).await;
    }

    /// Like [`put`](Self::put) with an explicit key.
    pub async fn put_key(&self, key: CacheKey, response: Response) {
        trace!(namespace = %self.name, key = %key, "cache put");
        self.entries
            .write()
            .await
            .insert(key, CachedResponse::new(response));
    }

    /// Stores a batch of entries under a single write lock, so readers see
    /// either none or all of them.
    pub async fn put_all(&self, batch: Vec<(CacheKey, Response)>) {
        let mut entries = self.entries.write().await;
        for (key, response) in batch {
            entries.insert(key, CachedResponse::new(response));
        }
    }

    /// Returns a clone of the stored response for the request, if any.
    pub async fn match_request(&self, request: &Request) -> Option<Response> {
        self.lookup(&CacheKey::from(request))
            .await
            .map(|entry| entry.response)
    }

    /// Returns the full entry, including when it was stored.
    pub async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        self.entries.read().await.get(key).cloned()
    }

    /// Removes the entry for `key`. Returns `true` if one existed.
    pub async fn delete(&self, key: &CacheKey) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn keys(&self) -> Vec<CacheKey> {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, StatusCode};

    fn text(body: &str) -> Response {
        Response::new(StatusCode::OK).body(body.to_owned())
    }

    #[tokio::test]
    async fn put_replaces_previous_entry() {
        let ns = Namespace::new("forex-academy-api-v1");
        let req = Request::get("/api/courses");
        ns.put(&req, text("first")).await;
        ns.put(&req, text("second")).await;

        assert_eq!(ns.len().await, 1);
        let hit = ns.match_request(&req).await.unwrap();
        assert_eq!(hit.text(), "second");
    }

    #[tokio::test]
    async fn match_is_exact_on_method_and_url() {
        let ns = Namespace::new("static");
        ns.put(&Request::get("/manifest.json"), text("{}")).await;

        assert!(ns.match_request(&Request::get("/manifest.json")).await.is_some());
        assert!(ns.match_request(&Request::get("/manifest.json?v=2")).await.is_none());
        assert!(
            ns.match_request(&Request::new(Method::Head, "/manifest.json"))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn put_all_and_delete() {
        let ns = Namespace::new("static");
        ns.put_all(vec![
            (CacheKey::new(Method::Get, "/"), text("index")),
            (CacheKey::new(Method::Get, "/static/css/main.css"), text("css")),
        ])
        .await;
        assert_eq!(ns.len().await, 2);

        assert!(ns.delete(&CacheKey::new(Method::Get, "/")).await);
        assert!(!ns.delete(&CacheKey::new(Method::Get, "/")).await);
        assert_eq!(ns.keys().await, vec![CacheKey::new(Method::Get, "/static/css/main.css")]);
    }

    #[tokio::test]
    async fn fresh_entry_has_zero_age() {
        let entry = CachedResponse::new(text("x"));
        assert!(entry.age_seconds() <= 1);
    }
}
