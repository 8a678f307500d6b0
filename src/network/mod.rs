//! The network seam: everything the worker knows about "fetch".
//!
//! The cache manager never talks to sockets directly; it holds an
//! `Arc<dyn Network>`. [`HttpNetwork`] is the production implementation,
//! forwarding to the upstream backend with [`reqwest`]. Tests substitute a
//! scripted implementation.
//!
//! A [`FetchError`] means the exchange itself failed (offline, refused,
//! unresolvable). A `404` or `500` is not an error at this layer: it comes
//! back as an ordinary [`Response`] and the caller decides what to do with it.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::http::{Headers, Request, Response, StatusCode};

/// Errors produced when a request cannot be completed over the network.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid request URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported request method {0}")]
    InvalidMethod(String),

    #[error("upstream returned an unrepresentable status code {0}")]
    InvalidStatus(u16),

    #[error("network unavailable: {0}")]
    Offline(String),
}

/// Boxed future returned by [`Network::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Response, FetchError>> + Send + 'a>>;

/// Something that can perform a request over the network.
///
/// # Contract
///
/// - Returns `Ok` for every response the server produced, whatever its status.
/// - Returns `Err` only when no response was obtained.
/// - Never consults or writes any cache.
pub trait Network: Send + Sync {
    fn fetch<'a>(&'a self, request: &'a Request) -> FetchFuture<'a>;
}

/// Forwards requests to an upstream origin over HTTP(S).
///
/// Origin-relative URLs (`/api/courses`) are resolved against `origin`;
/// absolute URLs (`https://fonts.googleapis.com/...`) are fetched as-is.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: Url,
}

impl HttpNetwork {
    /// Creates a network bound to `origin`, e.g. `http://127.0.0.1:8001`.
    pub fn new(origin: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin,
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolves a request URL against the upstream origin.
    pub fn resolve(&self, url: &str) -> Result<Url, FetchError> {
        self.origin.join(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_owned(),
            source,
        })
    }

    async fn forward(&self, request: &Request) -> Result<Response, FetchError> {
        let url = self.resolve(request.url())?;
        let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
            .map_err(|_| FetchError::InvalidMethod(request.method().to_string()))?;

        let mut builder = self.client.request(method, url.clone());
        for (name, value) in request.headers().iter() {
            if name.eq_ignore_ascii_case("host")
                || crate::http::headers::HOP_BY_HOP
                    .iter()
                    .any(|h| name.eq_ignore_ascii_case(h))
            {
                continue;
            }
            builder = builder.header(name, value);
        }
        if !request.body().is_empty() {
            builder = builder.body(request.body().clone());
        }

        let transport = |source: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let upstream = builder.send().await.map_err(transport)?;

        let code = upstream.status().as_u16();
        let status = StatusCode::from_u16(code).ok_or(FetchError::InvalidStatus(code))?;

        let mut headers: Headers = upstream
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();
        headers.strip_hop_by_hop();

        let body: Bytes = upstream.bytes().await.map_err(transport)?;
        debug!(url = %url, status = code, bytes = body.len(), "upstream responded");

        Ok(Response::new(status).with_headers(headers).body_bytes(body))
    }
}

impl Network for HttpNetwork {
    fn fetch<'a>(&'a self, request: &'a Request) -> FetchFuture<'a> {
        Box::pin(self.forward(request))
    }
}
