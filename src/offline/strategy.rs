//! The two caching strategies, independent of routing and fallbacks.

use tracing::debug;

use crate::cache::Namespace;
use crate::http::{Request, Response};
use crate::network::{FetchError, Network};

/// Where a strategy got its answer from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Network,
    Cache,
}

/// Network first, namespace on transport failure.
///
/// A 2xx answer to a cacheable request is stored before it is returned.
/// Non-2xx answers are returned unchanged and never stored. The error is
/// only returned when the namespace has nothing for the request either.
pub async fn network_first(
    network: &dyn Network,
    namespace: &Namespace,
    request: &Request,
) -> Result<(Response, Source), FetchError> {
    match network.fetch(request).await {
        Ok(response) => {
            store_if_success(namespace, request, &response).await;
            Ok((response, Source::Network))
        }
        Err(err) => {
            debug!(url = %request.url(), error = %err, "network failed, trying cache");
            match namespace.match_request(request).await {
                Some(cached) => Ok((cached, Source::Cache)),
                None => Err(err),
            }
        }
    }
}

/// Namespace first, network on a miss.
///
/// A hit never touches the network. On a miss, a 2xx answer to a cacheable
/// request is stored before it is returned.
pub async fn cache_first(
    network: &dyn Network,
    namespace: &Namespace,
    request: &Request,
) -> Result<(Response, Source), FetchError> {
    if let Some(cached) = namespace.match_request(request).await {
        return Ok((cached, Source::Cache));
    }

    let response = network.fetch(request).await?;
    store_if_success(namespace, request, &response).await;
    Ok((response, Source::Network))
}

async fn store_if_success(namespace: &Namespace, request: &Request, response: &Response) {
    if response.is_success() && request.method().is_cacheable() {
        namespace.put(request, response.clone()).await;
    }
}
