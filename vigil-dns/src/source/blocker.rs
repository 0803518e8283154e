//! Blocked-name source
//!
//! Holds the set of blocked names. The blocklist loader fills the set
//! asynchronously after startup, so early queries simply miss; a name is
//! never falsely blocked. Blocked names answer with the unspecified
//! address of the queried family.

use std::net::{Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;
use rustc_hash::FxHashSet;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::source::Source;
use crate::wire::Record;
use crate::DEFAULT_TTL;

/// Set of blocked names, shared between the resolver and the loader
#[derive(Default)]
pub struct Blocker {
    domains: RwLock<FxHashSet<String>>,
}

impl Blocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a batch of names; called by the blocklist loader
    pub async fn extend(&self, names: impl IntoIterator<Item = String>) {
        let mut domains = self.domains.write().await;
        domains.extend(names);
    }

    /// Number of blocked names currently loaded
    pub async fn len(&self) -> usize {
        self.domains.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.domains.read().await.is_empty()
    }

    /// A name is blocked when it or any parent domain is in the set,
    /// so an entry for `ads.example` also covers `tracker.ads.example`.
    pub async fn is_blocked(&self, name: &str) -> bool {
        let domains = self.domains.read().await;
        let mut current = name;
        loop {
            if domains.contains(current) {
                return true;
            }
            match current.find('.') {
                Some(pos) => current = &current[pos + 1..],
                None => return false,
            }
        }
    }
}

#[async_trait]
impl Source for Blocker {
    async fn resolve_v4(&self, name: &str) -> Result<Record> {
        if self.is_blocked(name).await {
            Ok(Record::a(name, Ipv4Addr::UNSPECIFIED, DEFAULT_TTL))
        } else {
            Err(Error::NotFound(name.to_string()))
        }
    }

    async fn resolve_v6(&self, name: &str) -> Result<Record> {
        if self.is_blocked(name).await {
            Ok(Record::aaaa(name, Ipv6Addr::UNSPECIFIED, DEFAULT_TTL))
        } else {
            Err(Error::NotFound(name.to_string()))
        }
    }
}
