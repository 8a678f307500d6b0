//! Responses: built fluently, cloned into cache namespaces, and serialized
//! to HTTP/1.1 wire format by the proxy front.

use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Serialize, de::DeserializeOwned};

use super::{Headers, StatusCode};

/// Header attached to every response the worker synthesizes itself.
pub const SERVED_BY_HEADER: &str = "X-Served-By";

/// Value of [`SERVED_BY_HEADER`] on synthesized responses.
pub const SERVED_BY_WORKER: &str = "ServiceWorker";

/// An HTTP response.
///
/// The body is a [`Bytes`] buffer, so cloning a response into a cache
/// namespace shares the payload instead of copying it.
///
/// # Examples
///
/// ```
/// use swcache::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// let bytes = response.clone().into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// assert_eq!(response.text(), r#"{"status":"ok"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
            keep_alive: true,
        }
    }

    /// Builds a `200` JSON response from any serializable value.
    ///
    /// Serializing the fixed payloads used here cannot fail; should a caller
    /// hand in something that does, the body falls back to `null`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"null".to_vec());
        Self::new(StatusCode::OK)
            .header("Content-Type", "application/json")
            .body_bytes(body)
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place, for middleware that decorates a response it
    /// received from downstream.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Replaces the whole header map.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the response body from a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Bytes::from(body.into());
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserializes the body as JSON.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// `true` for a 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// `true` if the worker produced this response itself rather than the
    /// network or a cache.
    pub fn is_synthesized(&self) -> bool {
        self.headers.get(SERVED_BY_HEADER) == Some(SERVED_BY_WORKER)
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/plain; charset=utf-8` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Content-Length: <n>` (always written; any stored value is replaced).
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }

        self.headers.strip_hop_by_hop();
        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.insert("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or("")
            )
            .as_bytes(),
        );

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);

        if !self.body.is_empty() {
            buf.put(self.body);
        }

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn json_response_shape() {
        let r = Response::json(&serde_json::json!({ "offline": true }));
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(r.headers().get("content-type"), Some("application/json"));
        let value: serde_json::Value = r.parse_json().unwrap();
        assert_eq!(value["offline"], true);
    }

    #[test]
    fn stored_content_length_is_replaced() {
        let r = Response::new(StatusCode::OK)
            .header("Content-Length", "999")
            .header("Transfer-Encoding", "chunked")
            .body("abc");
        let s = to_string(r.into_bytes());
        assert!(s.contains("Content-Length: 3\r\n"));
        assert!(!s.contains("999"));
        assert!(!s.contains("chunked"));
    }

    #[test]
    fn unknown_status_has_empty_reason() {
        let r = Response::new(StatusCode::from_u16(599).unwrap());
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 599 \r\n"));
    }

    #[test]
    fn no_body_no_content_type() {
        let r = Response::new(StatusCode::NO_CONTENT);
        let s = to_string(r.into_bytes());
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn connection_close() {
        let r = Response::new(StatusCode::BAD_GATEWAY).keep_alive(false);
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 502 Bad Gateway\r\n"));
        assert!(s.contains("Connection: close\r\n"));
    }

    #[test]
    fn synthesized_marker() {
        let plain = Response::new(StatusCode::OK);
        assert!(!plain.is_synthesized());
        let marked = plain.header(SERVED_BY_HEADER, SERVED_BY_WORKER);
        assert!(marked.is_synthesized());
    }

    #[test]
    fn clone_shares_body() {
        let r = Response::new(StatusCode::OK).body_bytes(Bytes::from_static(b"payload"));
        let copy = r.clone();
        assert_eq!(r, copy);
        assert_eq!(copy.bytes().as_ptr(), r.bytes().as_ptr());
    }
}
