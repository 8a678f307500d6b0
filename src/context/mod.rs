//! Per-request context handed to route handlers.

use std::collections::HashMap;

use crate::Request;

/// Path parameters captured by the matched route pattern.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A request plus whatever the router learned while matching it.
#[derive(Debug)]
pub struct Context {
    request: Request,
    params: PathParams,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self::with_params(request, PathParams::new())
    }

    pub fn with_params(request: Request, params: PathParams) -> Self {
        Self { request, params }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Shorthand for a query-string parameter of the request.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.request.query_param(key)
    }

    /// Gives the request back, e.g. to forward it as a fetch event.
    pub fn into_request(self) -> Request {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_and_request_are_reachable() {
        let request = Request::new(crate::Method::Post, "/__sw/push?tag=x").with_body(r#"{"title":"t"}"#);
        let ctx = Context::new(request);
        assert_eq!(ctx.query("tag"), Some("x"));
        assert!(ctx.params().is_empty());
        assert_eq!(ctx.into_request().path(), "/__sw/push");
    }
}
