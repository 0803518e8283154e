//! Server configuration
//!
//! The configuration file uses TOML format. Everything has a default, so
//! an empty file yields a resolver on `127.0.0.1:53` forwarding to a
//! public upstream with a one-megabyte cache.
//!
//! # Example Configuration
//!
//! ```toml
//! [endpoint]
//! address = "127.0.0.1:53"
//!
//! [cache]
//! size = 1000000
//! basettl = 300
//! force_basettl = false
//!
//! [[custom]]
//! name = "router.lan"
//! address = "192.168.1.1"
//!
//! blocking_lists = ["https://example.com/hosts.txt"]
//!
//! allow_external = true
//!
//! [external]
//! type = "UDP"
//! endpoint = "1.1.1.1:53"
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// UDP listener settings
    #[serde(default)]
    pub endpoint: EndpointConf,

    /// Answer cache settings
    #[serde(default)]
    pub cache: CacheConf,

    /// Static name→address overrides
    #[serde(default)]
    pub custom: Vec<CustomEntry>,

    /// Blocklist URLs or file paths
    #[serde(default)]
    pub blocking_lists: Vec<String>,

    /// When false, no upstream is constructed and unknown names are NXDOMAIN
    #[serde(default = "default_true")]
    pub allow_external: bool,

    /// Upstream resolver settings, used when `allow_external` is set
    #[serde(default)]
    pub external: ExternalConf,

    /// Optional path for a diagnostics snapshot written on shutdown signal
    #[serde(default)]
    pub memdump: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: EndpointConf::default(),
            cache: CacheConf::default(),
            custom: Vec::new(),
            blocking_lists: Vec::new(),
            allow_external: true,
            external: ExternalConf::default(),
            memdump: None,
        }
    }
}

/// UDP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConf {
    /// `host:port` the listener binds
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for EndpointConf {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

/// Answer cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConf {
    /// Byte budget; below the per-entry cost caching is disabled
    #[serde(default = "default_cache_size")]
    pub size: i64,

    /// TTL floor in seconds; 0 also disables the periodic reaper
    #[serde(default = "default_base_ttl")]
    pub basettl: u32,

    /// Raise TTLs below the floor instead of dropping the record
    #[serde(default)]
    pub force_basettl: bool,
}

impl Default for CacheConf {
    fn default() -> Self {
        Self {
            size: default_cache_size(),
            basettl: default_base_ttl(),
            force_basettl: false,
        }
    }
}

/// One static override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomEntry {
    pub name: String,
    pub address: String,
}

impl CustomEntry {
    /// Parsed override address
    pub fn ip(&self) -> Result<IpAddr> {
        self.address.parse().map_err(|e| {
            Error::Config(format!(
                "invalid address '{}' for custom entry '{}': {e}",
                self.address, self.name
            ))
        })
    }
}

/// Upstream resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConf {
    /// Upstream protocol
    #[serde(rename = "type", default)]
    pub kind: ExternalKind,

    /// `host:port` for UDP, full `https://` URL for DoH
    #[serde(default = "default_external_endpoint")]
    pub endpoint: String,
}

impl Default for ExternalConf {
    fn default() -> Self {
        Self {
            kind: ExternalKind::default(),
            endpoint: default_external_endpoint(),
        }
    }
}

/// Upstream protocol selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExternalKind {
    #[default]
    Udp,
    Doh,
}

fn default_true() -> bool {
    true
}

fn default_address() -> String {
    "127.0.0.1:53".to_string()
}

fn default_cache_size() -> i64 {
    1_000_000
}

fn default_base_ttl() -> u32 {
    300
}

fn default_external_endpoint() -> String {
    "1.1.1.1:53".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration; any error here is fatal at startup
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        for entry in &self.custom {
            entry.ip()?;
        }

        if self.allow_external {
            match self.external.kind {
                ExternalKind::Doh => {
                    if !self.external.endpoint.starts_with("https://") {
                        return Err(Error::Config(format!(
                            "DoH endpoint '{}' must be an https:// URL",
                            self.external.endpoint
                        )));
                    }
                }
                ExternalKind::Udp => {
                    self.upstream_addr()?;
                }
            }
        }

        Ok(())
    }

    /// Parsed listener address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.endpoint.address.parse().map_err(|e| {
            Error::Config(format!(
                "invalid bind address '{}': {e}",
                self.endpoint.address
            ))
        })
    }

    /// Parsed UDP upstream address
    pub fn upstream_addr(&self) -> Result<SocketAddr> {
        self.external.endpoint.parse().map_err(|e| {
            Error::Config(format!(
                "invalid upstream address '{}': {e}",
                self.external.endpoint
            ))
        })
    }

    /// Generate a sample configuration
    pub fn sample() -> String {
        r#"# Vigil DNS resolver configuration

# UDP listener
[endpoint]
address = "127.0.0.1:53"

# Answer cache
[cache]
# Byte budget; entries cost 50 bytes each. Below 50 caching is off.
size = 1000000

# Minimum accepted TTL in seconds. Records under the floor are dropped
# (or raised, see force_basettl). 0 disables the periodic reaper.
basettl = 300

# Raise short TTLs to the floor instead of dropping the record
force_basettl = false

# Static overrides answered before cache and upstream
#[[custom]]
#name = "router.lan"
#address = "192.168.1.1"

# Blocklists: hosts files or bare domain lists, URLs or local paths
blocking_lists = [
    "https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts",
]

# Set to false to answer from local sources only
allow_external = true

# Upstream resolver; type is "UDP" or "DOH"
[external]
type = "UDP"
endpoint = "1.1.1.1:53"

# Uncomment to write a diagnostics snapshot on shutdown signal
#memdump = "/tmp/vigil-diag.txt"
"#
        .to_string()
    }
}
