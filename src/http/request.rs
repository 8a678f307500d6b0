//! Requests: parsed off the wire by the proxy front (via [`httparse`]) or
//! built directly when the worker fetches manifest URLs itself.

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// How the request was issued, following the Fetch standard's request modes.
///
/// Only [`RequestMode::Navigate`] changes caching behaviour: a failed
/// navigation gets the offline page instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// A top-level page load.
    Navigate,
    #[default]
    SameOrigin,
    NoCors,
    Cors,
}

impl RequestMode {
    /// Reads a `Sec-Fetch-Mode` header value.
    pub fn from_fetch_mode(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "navigate" => Some(Self::Navigate),
            "same-origin" => Some(Self::SameOrigin),
            "no-cors" => Some(Self::NoCors),
            "cors" => Some(Self::Cors),
            _ => None,
        }
    }
}

/// An HTTP request as seen by the worker.
///
/// `url` is kept exactly as the client sent it (origin-relative like
/// `/api/courses` or absolute like `https://fonts.googleapis.com/css2?...`);
/// together with the method it forms the cache key.
///
/// # Examples
///
/// ```
/// use swcache::http::{Request, RequestMode};
///
/// let raw = b"GET /api/courses?level=beginner HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.url(), "/api/courses?level=beginner");
/// assert_eq!(request.path(), "/api/courses");
/// assert_eq!(request.query_param("level"), Some("beginner"));
///
/// let page = Request::get("/").with_mode(RequestMode::Navigate);
/// assert!(page.is_navigation());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    path: String,
    query: Option<String>,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    mode: RequestMode,
    body: Bytes,
    params: HashMap<String, String>,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Builds a request for `url` with no headers and an empty body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let url = url.into();
        let (path, query) = split_target(&url);
        let params = query.as_deref().map(parse_query_string).unwrap_or_default();
        Self {
            method,
            url,
            path,
            query,
            version: 1,
            headers: Headers::new(),
            mode: RequestMode::default(),
            body: Bytes::new(),
            params,
        }
    }

    /// Shorthand for a `GET` request, the shape every manifest prefetch takes.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins.
    /// The body is bounded by `Content-Length`; bytes past it belong to the next
    /// pipelined request and are left alone.
    ///
    /// The request mode comes from `Sec-Fetch-Mode` when present. Without it, a
    /// `GET` that accepts `text/html` is treated as a navigation.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: more data is needed to complete the request headers.
    /// - [`RequestError::Parse`]: the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`]: a required field (method, path, version) is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = match raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse::<Method>()
        {
            Ok(method) => method,
            Err(never) => match never {},
        };

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let mode = header_map
            .get("sec-fetch-mode")
            .and_then(RequestMode::from_fetch_mode)
            .unwrap_or_else(|| {
                let wants_html = header_map
                    .get("accept")
                    .is_some_and(|accept| accept.contains("text/html"));
                if method == Method::Get && wants_html {
                    RequestMode::Navigate
                } else {
                    RequestMode::default()
                }
            });

        let content_length = header_map
            .get("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let body_end = buf.len().min(body_offset.saturating_add(content_length));
        let body = Bytes::copy_from_slice(&buf[body_offset..body_end]);

        let mut request = Self::new(method, target);
        request.version = version;
        request.headers = header_map;
        request.mode = mode;
        request.body = body;

        Ok((request, body_offset))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request target exactly as given.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the URL path component, also for absolute URLs.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    /// `true` when this is a top-level page load.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns a parsed query parameter value by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }
}

/// Splits a request target into its path and query components.
///
/// Origin-relative targets are split on `?`. Absolute targets go through
/// [`url::Url`] so `https://host/css2?x=1` yields `/css2`.
fn split_target(target: &str) -> (String, Option<String>) {
    if !target.starts_with('/') {
        if let Ok(parsed) = url::Url::parse(target) {
            return (
                parsed.path().to_owned(),
                parsed.query().map(str::to_owned),
            );
        }
    }

    match target.split_once('?') {
        Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
        None => (target.to_owned(), None),
    }
}

/// Parses a URL query string (`key=value&key2=value2`) into a `HashMap`.
///
/// `+` decodes to a space; values are otherwise taken verbatim.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.replace('+', " ");
            let value = parts.next().unwrap_or("").replace('+', " ");
            Some((key, value))
        })
        .collect()
}
