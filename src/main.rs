//! `swcache`: runs the offline cache manager as a caching HTTP proxy.
//!
//! Every request that is not a `/__sw/` control route is delivered to the
//! worker as a fetch event; the worker answers from the upstream origin, a
//! cache namespace, or an offline fallback.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use swcache::Server;
use swcache::background::SyncScheduler;
use swcache::cache::CacheStorage;
use swcache::config::Config;
use swcache::middleware::{LoggerMiddleware, Pipeline};
use swcache::network::HttpNetwork;
use swcache::notify::{ClientRegistry, NotificationCenter};
use swcache::offline::OfflineCacheManager;
use swcache::router::control;
use swcache::worker::{EventLoop, Registration};

/// Pending events the worker queue holds before senders wait.
const EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "swcache", version, about = "Service-worker style offline caching proxy")]
struct Args {
    /// JSON config file; defaults apply to anything it leaves out.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config.
    #[arg(short, long)]
    listen: Option<String>,

    /// Upstream origin, overriding the config.
    #[arg(short, long)]
    upstream: Option<String>,

    /// Periodic background sync interval in seconds, overriding the config.
    #[arg(long)]
    sync_interval: Option<u64>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref())
        .with_context(|| format!("loading config {:?}", args.config))?;
    if let Some(listen) = &args.listen {
        config.listen = listen.clone();
    }
    if let Some(upstream) = &args.upstream {
        config.upstream = upstream.clone();
    }
    if args.sync_interval.is_some() {
        config.sync_interval_secs = args.sync_interval;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = load_config(&args)?;
    info!(
        version = %config.version,
        upstream = %config.upstream,
        listen = %config.listen,
        "swcache starting"
    );

    let network = Arc::new(HttpNetwork::new(config.upstream_url()?));
    let manager = Arc::new(OfflineCacheManager::new(
        config.clone(),
        Arc::new(CacheStorage::new()),
        network,
        Arc::new(NotificationCenter::new()),
        Arc::new(ClientRegistry::new()),
    ));

    let registration = Arc::new(Registration::new(config.app_root.clone()));
    registration
        .register(Arc::new(Arc::clone(&manager).into_worker()))
        .await
        .context("installing worker")?;

    let (worker, event_loop) = EventLoop::spawn(Arc::clone(&registration), EVENT_QUEUE_CAPACITY);

    let scheduler = config.sync_interval_secs.map(|secs| {
        SyncScheduler::spawn(worker.clone(), config.sync_tag.clone(), Duration::from_secs(secs))
    });

    let router = control::routes(worker, Arc::clone(&manager));
    let pipeline = Arc::new(Pipeline::new(router).with(LoggerMiddleware));

    let server = Server::bind(&config.listen).await?;
    server
        .run_until(
            move |request| {
                let pipeline = Arc::clone(&pipeline);
                async move { pipeline.handle(request).await }
            },
            shutdown_signal(),
        )
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    registration.unregister().await;
    event_loop.abort();
    info!("swcache stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
