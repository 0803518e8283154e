//! Static override source
//!
//! Name-to-address overrides taken from configuration. The map is built
//! once by the supervisor and immutable afterwards.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::source::Source;
use crate::wire::Record;
use crate::DEFAULT_TTL;

/// Config-defined name→IP overrides
#[derive(Default)]
pub struct StaticMap {
    v4: HashMap<String, Ipv4Addr>,
    v6: HashMap<String, Ipv6Addr>,
}

impl StaticMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an override; the address family decides which table it lands in
    pub fn add(&mut self, name: impl Into<String>, addr: IpAddr) {
        let name = name.into().to_ascii_lowercase();
        match addr {
            IpAddr::V4(v4) => {
                self.v4.insert(name, v4);
            }
            IpAddr::V6(v6) => {
                self.v6.insert(name, v6);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }
}

#[async_trait]
impl Source for StaticMap {
    async fn resolve_v4(&self, name: &str) -> Result<Record> {
        match self.v4.get(name) {
            Some(addr) => Ok(Record::a(name, *addr, DEFAULT_TTL)),
            None => Err(Error::NotFound(name.to_string())),
        }
    }

    async fn resolve_v6(&self, name: &str) -> Result<Record> {
        match self.v6.get(name) {
            Some(addr) => Ok(Record::aaaa(name, *addr, DEFAULT_TTL)),
            None => Err(Error::NotFound(name.to_string())),
        }
    }
}
