//! Server supervisor
//!
//! Builds the cache, sources, chain, and endpoint from configuration and
//! owns their lifetimes. Reconfiguration tears the whole hierarchy down
//! (cancel, drain) and builds a fresh one; in-flight handlers finish
//! first, bounded by the upstream deadline. A signal task turns
//! SIGINT/SIGTERM into the optional diagnostics dump plus shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::blocklist;
use crate::cache::{MemoryCache, ENTRY_COST, REAP_INTERVAL};
use crate::chain::{CacheFeeder, NamedSource, ResolverChain};
use crate::config::{Config, ExternalKind};
use crate::endpoint::UdpEndpoint;
use crate::error::Result;
use crate::source::{Blocker, CacheSource, Source, StaticMap, Upstream};

/// State of the currently running hierarchy, shared with the signal task
#[derive(Default)]
struct Active {
    shutdown_tx: Option<broadcast::Sender<()>>,
    cache: Option<Arc<MemoryCache>>,
}

/// Supervisor owning the resolution pipeline
#[derive(Default)]
pub struct Server {
    active: Arc<Mutex<Active>>,
    handles: Vec<JoinHandle<()>>,
    started: bool,
}

impl Server {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and start the hierarchy and install the signal handler
    pub async fn start(&mut self, conf: &Config) -> Result<()> {
        if self.started {
            warn!("server already started");
        }
        info!("starting server");
        self.started = true;

        spawn_signal_task(self.active.clone(), conf.memdump.clone());
        self.reconfigure(conf).await?;

        info!("server started");
        Ok(())
    }

    /// Replace the running hierarchy with one built from `conf`
    ///
    /// The previous hierarchy is cancelled and drained before anything new
    /// starts, so the listener port is free again and no handler is left
    /// talking to half-replaced objects.
    pub async fn reconfigure(&mut self, conf: &Config) -> Result<()> {
        self.stop().await;
        self.wait().await;

        let (shutdown_tx, _) = broadcast::channel(1);
        let mut handles = Vec::new();

        let cache = Arc::new(MemoryCache::new(
            conf.cache.size,
            conf.cache.basettl,
            conf.cache.force_basettl,
        ));
        if conf.cache.basettl > 0 && conf.cache.size >= ENTRY_COST {
            handles.push(cache.spawn_reaper(REAP_INTERVAL, shutdown_tx.subscribe()));
        }

        let blocker = Arc::new(Blocker::new());
        if !conf.blocking_lists.is_empty() {
            // Loads in the background; names appear as lists arrive
            tokio::spawn(blocklist::load_into(
                blocker.clone(),
                conf.blocking_lists.clone(),
            ));
        }

        let mut custom = StaticMap::new();
        for entry in &conf.custom {
            custom.add(&entry.name, entry.ip()?);
        }

        let mut resolvers = vec![
            NamedSource::new("block", blocker),
            NamedSource::new("custom", Arc::new(custom)),
            NamedSource::new("cache", Arc::new(CacheSource(cache.clone()))),
        ];
        if conf.allow_external {
            let upstream: Arc<dyn Source> = match conf.external.kind {
                ExternalKind::Udp => Arc::new(Upstream::udp(conf.upstream_addr()?)),
                ExternalKind::Doh => Arc::new(Upstream::doh(&conf.external.endpoint)?),
            };
            resolvers.push(NamedSource::new(
                "external",
                Arc::new(CacheFeeder::new(upstream, cache.clone())),
            ));
        }

        let endpoint = UdpEndpoint::new(conf.bind_addr()?, ResolverChain::new(resolvers));
        handles.push(endpoint.start(&shutdown_tx).await?);

        {
            let mut active = self.active.lock().await;
            active.shutdown_tx = Some(shutdown_tx);
            active.cache = Some(cache);
        }
        self.handles = handles;
        Ok(())
    }

    /// Signal every task of the running hierarchy to stop
    pub async fn stop(&self) {
        let active = self.active.lock().await;
        if let Some(tx) = &active.shutdown_tx {
            let _ = tx.send(());
        }
    }

    /// Await completion of every task of the current hierarchy
    pub async fn wait(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}

fn spawn_signal_task(active: Arc<Mutex<Active>>, memdump: Option<PathBuf>) {
    tokio::spawn(async move {
        wait_for_signal().await;

        let active = active.lock().await;
        if let Some(path) = &memdump {
            write_diagnostics(path, active.cache.as_deref()).await;
        }
        if let Some(tx) = &active.shutdown_tx {
            let _ = tx.send(());
        }
    });
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => info!("received SIGINT"),
                    _ = sigterm.recv() => info!("received SIGTERM"),
                }
                return;
            }
            _ => error!("failed to register unix signal handlers"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c"),
        Err(e) => {
            error!("failed to listen for ctrl-c: {}", e);
            // Shutdown stays reachable through Server::stop
            std::future::pending::<()>().await;
        }
    }
}

/// Write the diagnostics snapshot the `memdump` option asks for
async fn write_diagnostics(path: &Path, cache: Option<&MemoryCache>) {
    use std::fmt::Write;

    let mut report = String::from("vigil diagnostics\n");
    if let Some(cache) = cache {
        let stats = cache.stats().await;
        let _ = writeln!(report, "cache.entries: {}", stats.entries);
        let _ = writeln!(report, "cache.capacity: {}", stats.capacity);
        let _ = writeln!(report, "cache.remaining: {}", stats.remaining);
        let _ = writeln!(report, "cache.hits: {}", stats.hits);
        let _ = writeln!(report, "cache.misses: {}", stats.misses);
        let _ = writeln!(report, "cache.evicted: {}", stats.evicted);
        let _ = writeln!(report, "cache.expired: {}", stats.expired);
    }

    match tokio::fs::write(path, report).await {
        Ok(()) => info!("wrote diagnostics to {}", path.display()),
        Err(e) => error!("failed to write diagnostics to {}: {}", path.display(), e),
    }
}
