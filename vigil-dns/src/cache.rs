//! Bounded answer cache with TTL-ordered eviction
//!
//! Two structures live under one lock: a hash map from key to address for
//! lookups, and an expiry-ordered deadline queue that makes evicting the
//! earliest-expiring entry cheap and lets the periodic reaper stop at the
//! first live entry. Capacity is a byte budget at a fixed per-entry cost.

use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustc_hash::FxHasher;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Error, Result};
use crate::wire::{Record, RecordType};
use crate::DEFAULT_TTL;

/// Estimated cost of one entry in bytes; the capacity budget is spent in
/// units of this
pub const ENTRY_COST: i64 = 50;

/// Default interval between reaper sweeps
pub const REAP_INTERVAL: Duration = Duration::from_secs(60);

const V4_SUFFIX: &str = "_v4";
const V6_SUFFIX: &str = "_v6";

/// Entries are keyed by the 64-bit hash of `name` plus a family suffix.
/// Two distinct names hashing to the same key are treated as duplicates
/// and the first write wins; at 64 bits the birthday bound sits far beyond
/// any plausible cache population.
fn key_hash(name: &str, suffix: &str) -> u64 {
    let mut hasher = FxHasher::default();
    name.hash(&mut hasher);
    suffix.hash(&mut hasher);
    hasher.finish()
}

struct Deadline {
    expiry: Instant,
    key: u64,
}

struct CacheInner {
    entries: HashMap<u64, IpAddr>,
    /// Sorted by non-decreasing expiry; every map key has exactly one entry here
    deadlines: VecDeque<Deadline>,
    remaining: i64,
}

/// Counters snapshot for diagnostics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: i64,
    pub remaining: i64,
    pub hits: u64,
    pub misses: u64,
    pub evicted: u64,
    pub expired: u64,
}

/// In-memory cache of A and AAAA answers
pub struct MemoryCache {
    inner: RwLock<CacheInner>,
    capacity: i64,
    base_ttl: u32,
    force_base_ttl: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    evicted: AtomicU64,
    expired: AtomicU64,
}

impl MemoryCache {
    /// Create a cache with a byte budget and a TTL floor
    ///
    /// A `capacity` below [`ENTRY_COST`] disables caching entirely. Records
    /// whose TTL is under `base_ttl` are dropped, or raised to the floor
    /// when `force_base_ttl` is set.
    pub fn new(capacity: i64, base_ttl: u32, force_base_ttl: bool) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                entries: HashMap::new(),
                deadlines: VecDeque::with_capacity(64),
                remaining: capacity,
            }),
            capacity,
            base_ttl,
            force_base_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Look up an A entry. Served answers carry the fixed default TTL, not
    /// the remaining lifetime.
    pub async fn resolve_v4(&self, name: &str) -> Result<Record> {
        match self.lookup(name, V4_SUFFIX).await {
            Some(IpAddr::V4(addr)) => Ok(Record::a(name, addr, DEFAULT_TTL)),
            _ => Err(Error::NotFound(name.to_string())),
        }
    }

    /// Look up an AAAA entry
    pub async fn resolve_v6(&self, name: &str) -> Result<Record> {
        match self.lookup(name, V6_SUFFIX).await {
            Some(IpAddr::V6(addr)) => Ok(Record::aaaa(name, addr, DEFAULT_TTL)),
            _ => Err(Error::NotFound(name.to_string())),
        }
    }

    async fn lookup(&self, name: &str, suffix: &str) -> Option<IpAddr> {
        let key = key_hash(name, suffix);
        let found = {
            let inner = self.inner.read().await;
            inner.entries.get(&key).copied()
        };
        match found {
            Some(addr) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(addr)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert an upstream-learned record, best effort
    ///
    /// Only A and AAAA records are stored. A record under the TTL floor is
    /// dropped unless the floor is forced, in which case its TTL is raised.
    /// When the budget is spent, the entry with the earliest deadline makes
    /// room. Inserting an existing key keeps the first write.
    pub async fn feed(&self, record: Record) {
        let suffix = match record.rtype {
            RecordType::A => V4_SUFFIX,
            RecordType::Aaaa => V6_SUFFIX,
            RecordType::Other(_) => return,
        };
        let Some(addr) = record.ip() else { return };

        if self.capacity < ENTRY_COST {
            return;
        }

        let mut ttl = record.ttl;
        if ttl < self.base_ttl {
            if !self.force_base_ttl {
                return;
            }
            ttl = self.base_ttl;
        }

        let key = key_hash(&record.name, suffix);
        let expiry = Instant::now() + Duration::from_secs(u64::from(ttl));
        self.put(key, addr, expiry).await;
    }

    async fn put(&self, key: u64, addr: IpAddr, expiry: Instant) {
        let mut inner = self.inner.write().await;

        if inner.entries.contains_key(&key) {
            return;
        }

        if inner.remaining < ENTRY_COST {
            let CacheInner {
                entries,
                deadlines,
                remaining,
            } = &mut *inner;
            let Some(earliest) = deadlines.pop_front() else {
                return;
            };
            entries.remove(&earliest.key);
            *remaining += ENTRY_COST;
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }

        inner.remaining -= ENTRY_COST;
        inner.entries.insert(key, addr);
        let at = inner.deadlines.partition_point(|d| d.expiry <= expiry);
        inner.deadlines.insert(at, Deadline { expiry, key });
    }

    /// Drop every entry and restore the full budget
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.deadlines.clear();
        inner.remaining = self.capacity;
    }

    /// Remove every entry whose deadline has passed
    ///
    /// Walks the deadline queue from the front and stops at the first live
    /// entry; the sort order guarantees nothing expired remains beyond it.
    /// Returns the number of entries removed.
    pub async fn reap_expired(&self) -> usize {
        let start = Instant::now();
        let mut inner = self.inner.write().await;
        let now = Instant::now();

        let split = inner.deadlines.partition_point(|d| d.expiry < now);
        if split == 0 {
            return 0;
        }

        let CacheInner {
            entries,
            deadlines,
            remaining,
        } = &mut *inner;
        for deadline in deadlines.drain(..split) {
            entries.remove(&deadline.key);
        }
        *remaining += ENTRY_COST * split as i64;
        drop(inner);

        self.expired.fetch_add(split as u64, Ordering::Relaxed);
        debug!("reaped {} expired cache entries in {:?}", split, start.elapsed());
        split
    }

    /// Spawn the periodic reaper; it runs until the shutdown channel fires
    pub fn spawn_reaper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {
                        cache.reap_expired().await;
                    }
                }
            }
        })
    }

    /// Snapshot of the counters for diagnostics
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            entries: inner.entries.len(),
            capacity: self.capacity,
            remaining: inner.remaining,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}
