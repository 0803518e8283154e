//! vigil-dns - local DNS resolution pipeline
//!
//! This crate implements a local DNS resolver with ad/tracker blocking:
//! - A hand-rolled wire codec for the DNS message subset the server needs
//! - An ordered resolver chain: blocklist → static overrides → cache →
//!   upstream, with a decorator that feeds upstream answers back into the
//!   cache
//! - A bounded in-memory cache with TTL-ordered eviction and a periodic
//!   reaper
//! - A concurrent UDP endpoint (receive worker pool, single send worker)
//! - A supervisor that owns the hierarchy and supports atomic
//!   reconfiguration
//!
//! # Example
//!
//! ```no_run
//! use vigil_dns::{Config, Server};
//!
//! # async fn example() -> vigil_dns::Result<()> {
//! let config = Config::from_toml(r#"
//! [endpoint]
//! address = "127.0.0.1:5353"
//! "#)?;
//!
//! let mut server = Server::new();
//! server.start(&config).await?;
//! server.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod blocklist;
pub mod cache;
pub mod chain;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod server;
pub mod source;
pub mod wire;

pub use cache::{CacheStats, MemoryCache};
pub use chain::{CacheFeeder, NamedSource, ResolverChain};
pub use config::Config;
pub use endpoint::UdpEndpoint;
pub use error::{Error, Result};
pub use server::Server;
pub use source::{Blocker, CacheSource, Source, StaticMap, Upstream};
pub use wire::{Flags, Message, Question, Rcode, Record, RecordClass, RecordData, RecordType};

/// TTL stamped on answers served from local sources (blocker, static
/// overrides, cache hits)
pub const DEFAULT_TTL: u32 = 60;
