//! # swcache
//!
//! A service-worker style offline cache manager, plus a from-scratch async
//! HTTP/1.1 front that runs it as a caching proxy.
//!
//! A [`ServiceWorker`](worker::ServiceWorker) generation moves through an
//! explicit lifecycle and receives typed events. The
//! [`OfflineCacheManager`](offline::OfflineCacheManager) supplies its
//! handlers: it pre-populates cache namespaces on install, prunes foreign
//! ones on activate, answers fetches network-first (API) or cache-first
//! (everything else), refreshes API data on background sync, and turns push
//! messages into notifications.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use swcache::cache::CacheStorage;
//! use swcache::config::Config;
//! use swcache::network::HttpNetwork;
//! use swcache::notify::{ClientRegistry, NotificationCenter};
//! use swcache::offline::OfflineCacheManager;
//! use swcache::worker::{EventLoop, Registration};
//! use swcache::Request;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let network = Arc::new(HttpNetwork::new(config.upstream_url()?));
//!     let manager = Arc::new(OfflineCacheManager::new(
//!         config,
//!         Arc::new(CacheStorage::new()),
//!         network,
//!         Arc::new(NotificationCenter::new()),
//!         Arc::new(ClientRegistry::new()),
//!     ));
//!
//!     let registration = Arc::new(Registration::new("/"));
//!     registration.register(Arc::new(manager.into_worker())).await?;
//!
//!     let (worker, _loop) = EventLoop::spawn(registration, 64);
//!     let response = worker.fetch(Request::get("/api/health")).await?;
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```

pub mod background;
pub mod cache;
pub mod config;
pub mod context;
pub mod http;
pub mod middleware;
pub mod network;
pub mod notify;
pub mod offline;
pub mod router;
pub mod server;
pub mod worker;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
