//! Cache storage: named namespaces of request/response pairs.
//!
//! The model follows the browser Cache API: a [`CacheStorage`] holds any
//! number of [`Namespace`]s addressed by name, and each namespace maps a
//! [`CacheKey`] (method + URL) to exactly one [`CachedResponse`].
//!
//! Nothing here is global. The storage is constructed explicitly and shared
//! by `Arc` between the worker generations that use it, which is what lets a
//! newly activated worker see, and prune, the namespaces of its predecessor.

mod namespace;
mod storage;

pub use namespace::{CachedResponse, Namespace};
pub use storage::CacheStorage;

use std::fmt;

use crate::http::{Method, Request};

/// Identity of a cached request: its method and its URL as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: Method,
    url: String,
}

impl CacheKey {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl From<&Request> for CacheKey {
    fn from(request: &Request) -> Self {
        Self::new(request.method().clone(), request.url())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_from_request_uses_method_and_full_url() {
        let req = Request::get("/api/market/news?limit=5");
        let key = CacheKey::from(&req);
        assert_eq!(key.method(), &Method::Get);
        assert_eq!(key.url(), "/api/market/news?limit=5");
        assert_eq!(key.to_string(), "GET /api/market/news?limit=5");
    }

    #[test]
    fn method_distinguishes_keys() {
        let get = CacheKey::new(Method::Get, "/api/courses");
        let head = CacheKey::new(Method::Head, "/api/courses");
        assert_ne!(get, head);
    }
}
