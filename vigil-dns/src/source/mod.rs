//! Resolution sources
//!
//! Every source answers the same capability set: resolve an A or AAAA
//! record for a name, optionally pass through questions it does not handle
//! locally, and optionally accept records learned elsewhere. The chain
//! composes sources in order; a source that cannot answer returns
//! [`Error::NotFound`](crate::Error::NotFound) so the next one gets a turn.

mod blocker;
mod static_map;
mod upstream;

pub use blocker::Blocker;
pub use static_map::StaticMap;
pub use upstream::{Upstream, UPSTREAM_TIMEOUT};

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::MemoryCache;
use crate::error::{Error, Result};
use crate::wire::{Question, Record};

/// A resolution source
#[async_trait]
pub trait Source: Send + Sync {
    /// Resolve an A record for `name`
    async fn resolve_v4(&self, name: &str) -> Result<Record>;

    /// Resolve an AAAA record for `name`
    async fn resolve_v6(&self, name: &str) -> Result<Record>;

    /// Pass through a question this server does not answer locally.
    /// Only forwarding sources override this.
    async fn forward(&self, question: &Question) -> Result<Vec<Record>> {
        Err(Error::NotFound(question.name.clone()))
    }

    /// Offer a record learned elsewhere; read-only sources ignore it
    async fn feed(&self, record: Record) {
        let _ = record;
    }
}

/// Thin adapter exposing the cache as a chain source
pub struct CacheSource(pub Arc<MemoryCache>);

#[async_trait]
impl Source for CacheSource {
    async fn resolve_v4(&self, name: &str) -> Result<Record> {
        self.0.resolve_v4(name).await
    }

    async fn resolve_v6(&self, name: &str) -> Result<Record> {
        self.0.resolve_v6(name).await
    }

    async fn feed(&self, record: Record) {
        self.0.feed(record).await;
    }
}
