//! Middleware pipeline in front of the router.
//!
//! Each middleware wraps the next layer and may inspect the request,
//! short-circuit with its own response, or decorate the downstream response.
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining chain; call [`Next::run`] to advance.
//! - [`Pipeline`]: an ordered stack of middleware ending in a [`Router`].
//! - [`LoggerMiddleware`]: one log line per request, naming which layer served it.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::time::Instant;
use tracing::info;

use crate::http::response::SERVED_BY_HEADER;
use crate::router::Router;
use crate::{Request, Response, StatusCode, context::Context};

/// Boxed future every middleware returns.
pub type MiddlewareFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> MiddlewareFuture + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware can forward a
/// request at most once.
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    index: usize,
}

impl Next {
    pub fn new(middlewares: impl Into<Arc<[MiddlewareHandler]>>) -> Self {
        Self {
            middlewares: middlewares.into(),
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// An exhausted chain answers `500 Internal Server Error`.
    pub async fn run(mut self, ctx: Context) -> Response {
        match self.middlewares.get(self.index).cloned() {
            Some(handler) => {
                self.index += 1;
                handler(ctx, self).await
            }
            None => Response::new(StatusCode::INTERNAL_SERVER_ERROR)
                .body("No response generated by middleware pipeline"),
        }
    }
}

/// The core trait for all middleware.
///
/// Implementations are shared across connection tasks, so they must be
/// `Send + Sync` and must not hold locks across an `.await`.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> MiddlewareFuture;
}

/// An ordered middleware stack terminated by a router.
///
/// ```rust
/// use swcache::middleware::{LoggerMiddleware, Pipeline};
/// use swcache::{Request, Response, Router, StatusCode};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut router = Router::new();
/// router.get("/ping", |_ctx| async { Response::new(StatusCode::OK).body("pong") });
///
/// let pipeline = Pipeline::new(router).with(LoggerMiddleware);
/// let response = pipeline.handle(Request::get("/ping")).await;
/// assert_eq!(response.text(), "pong");
/// # }
/// ```
pub struct Pipeline {
    chain: Arc<[MiddlewareHandler]>,
    layers: Vec<MiddlewareHandler>,
    router: Arc<Router>,
}

impl Pipeline {
    pub fn new(router: Router) -> Self {
        let router = Arc::new(router);
        let layers = Vec::new();
        Self {
            chain: build_chain(&layers, &router),
            layers,
            router,
        }
    }

    /// Appends `middleware`; earlier layers run first.
    #[must_use]
    pub fn with<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.layers.push(from_middleware(Arc::new(middleware)));
        self.chain = build_chain(&self.layers, &self.router);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Runs `request` through every layer and the router.
    pub async fn handle(&self, request: Request) -> Response {
        Next::new(Arc::clone(&self.chain)).run(Context::new(request)).await
    }
}

fn build_chain(layers: &[MiddlewareHandler], router: &Arc<Router>) -> Arc<[MiddlewareHandler]> {
    let router = Arc::clone(router);
    let endpoint: MiddlewareHandler = Arc::new(move |ctx: Context, _next: Next| -> MiddlewareFuture {
        let router = Arc::clone(&router);
        Box::pin(async move { router.route(ctx.into_request()).await })
    });
    let mut chain = layers.to_vec();
    chain.push(endpoint);
    Arc::from(chain)
}

/// Logs each request's method, path, status, serving layer and duration.
///
/// ```text
/// GET /api/courses - 200 via ServiceWorker (1.2ms)
/// ```
///
/// Responses without an `X-Served-By` header are reported as `upstream`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> MiddlewareFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().clone();
            let path = ctx.request().path().to_owned();

            let response = next.run(ctx).await;

            let served_by = response.headers().get(SERVED_BY_HEADER).unwrap_or("upstream");
            info!(
                "{} {} - {} via {} ({:?})",
                method,
                path,
                response.status().as_u16(),
                served_by,
                start.elapsed()
            );

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn handle(&self, ctx: Context, next: Next) -> MiddlewareFuture {
            let tag = self.0;
            Box::pin(async move {
                let response = next.run(ctx).await;
                response.header("X-Layer", tag)
            })
        }
    }

    struct Reject;

    impl Middleware for Reject {
        fn handle(&self, _ctx: Context, _next: Next) -> MiddlewareFuture {
            Box::pin(async { Response::new(StatusCode::SERVICE_UNAVAILABLE) })
        }
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.get("/ok", |_ctx| async { Response::new(StatusCode::OK) });
        router
    }

    #[tokio::test]
    async fn empty_chain_is_a_500() {
        let response = Next::new(Vec::<MiddlewareHandler>::new()).run(Context::new(Request::get("/"))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn layers_wrap_in_order() {
        let pipeline = Pipeline::new(router()).with(Tag("outer")).with(Tag("inner"));
        assert_eq!(pipeline.len(), 2);

        let response = pipeline.handle(Request::get("/ok")).await;
        let layers: Vec<_> = response.headers().get_all("x-layer").collect();
        assert_eq!(layers, vec!["inner", "outer"]);
    }

    #[tokio::test]
    async fn a_layer_can_short_circuit() {
        let pipeline = Pipeline::new(router()).with(Reject);
        let response = pipeline.handle(Request::get("/ok")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn logger_passes_responses_through() {
        let pipeline = Pipeline::new(router()).with(LoggerMiddleware);
        assert_eq!(pipeline.handle(Request::get("/ok")).await.status(), StatusCode::OK);
        assert_eq!(
            pipeline.handle(Request::get("/missing")).await.status(),
            StatusCode::NOT_FOUND
        );
    }
}
