//! Upstream recursive resolver source
//!
//! Sends the query to a configured upstream over plain UDP or DoH
//! (DNS over HTTPS) and extracts the answer. The transport is chosen once
//! at startup. Every exchange carries a fresh transaction id and is
//! bounded by a deadline so a dead upstream degrades into a timeout, not
//! a hang.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::error::{Error, Result};
use crate::source::Source;
use crate::wire::{Message, Question, Rcode, Record, RecordType, MAX_DATAGRAM_SIZE};

/// Deadline for one upstream exchange
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(2);

enum Transport {
    Udp(SocketAddr),
    Doh { url: String, client: reqwest::Client },
}

/// Forwarding source backed by an external recursive resolver
pub struct Upstream {
    transport: Transport,
}

impl Upstream {
    /// Upstream speaking plain DNS over UDP
    pub fn udp(addr: SocketAddr) -> Self {
        Self {
            transport: Transport::Udp(addr),
        }
    }

    /// Upstream speaking DoH; `url` is the full `https://` query endpoint
    pub fn doh(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to create DoH client: {e}")))?;
        Ok(Self {
            transport: Transport::Doh {
                url: url.into(),
                client,
            },
        })
    }

    async fn exchange(&self, query: &Message) -> Result<Message> {
        let payload = query.encode();
        let bytes = match &self.transport {
            Transport::Udp(addr) => exchange_udp(*addr, query.id, &payload).await?,
            Transport::Doh { url, client } => exchange_doh(url, client, payload).await?,
        };
        Message::parse(&bytes).map_err(|e| Error::UpstreamCorrupt(e.to_string()))
    }

    async fn resolve(&self, name: &str, qtype: RecordType) -> Result<Record> {
        let query = Message::query(rand::random(), name, qtype);
        let reply = self.exchange(&query).await?;

        if reply.flags.rcode() == Rcode::NxDomain {
            return Err(Error::NotFound(name.to_string()));
        }

        let answer = reply
            .answers
            .into_iter()
            .find(|record| record.rtype == qtype)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        // Answer under the queried name: a CNAME-chased response carries the
        // target name, but the client asked (and will ask again) for `name`.
        Ok(Record {
            name: name.to_string(),
            ..answer
        })
    }
}

#[async_trait]
impl Source for Upstream {
    async fn resolve_v4(&self, name: &str) -> Result<Record> {
        self.resolve(name, RecordType::A).await
    }

    async fn resolve_v6(&self, name: &str) -> Result<Record> {
        self.resolve(name, RecordType::Aaaa).await
    }

    async fn forward(&self, question: &Question) -> Result<Vec<Record>> {
        let query = Message::query(rand::random(), &question.name, question.qtype);
        let reply = self.exchange(&query).await?;

        if reply.flags.rcode() == Rcode::NxDomain {
            return Err(Error::NotFound(question.name.clone()));
        }
        Ok(reply.answers)
    }
}

async fn exchange_udp(addr: SocketAddr, id: u16, payload: &[u8]) -> Result<Vec<u8>> {
    let bind_addr = if addr.is_ipv6() {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    };

    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| Error::Transport(format!("failed to bind upstream socket: {e}")))?;

    socket
        .send_to(payload, addr)
        .await
        .map_err(|e| Error::Transport(format!("failed to send to {addr}: {e}")))?;

    let deadline = Instant::now() + UPSTREAM_TIMEOUT;
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    // Replies are matched by transaction id; stray datagrams on the
    // ephemeral socket are skipped until the deadline passes.
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Timeout(format!("no reply from {addr}")));
        }

        match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => {
                if len >= 2 && u16::from_be_bytes([buf[0], buf[1]]) == id {
                    buf.truncate(len);
                    return Ok(buf);
                }
            }
            Ok(Err(e)) => {
                return Err(Error::Transport(format!("recv from {addr} failed: {e}")))
            }
            Err(_) => return Err(Error::Timeout(format!("no reply from {addr}"))),
        }
    }
}

async fn exchange_doh(url: &str, client: &reqwest::Client, payload: Vec<u8>) -> Result<Vec<u8>> {
    let response = client
        .post(url)
        .header("Content-Type", "application/dns-message")
        .header("Accept", "application/dns-message")
        .body(payload)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("DoH request to {url} timed out"))
            } else {
                Error::Transport(format!("DoH request to {url} failed: {e}"))
            }
        })?;

    if !response.status().is_success() {
        return Err(Error::Transport(format!(
            "DoH server {url} returned {}",
            response.status()
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| Error::Transport(format!("failed to read DoH response: {e}")))?;

    Ok(body.to_vec())
}
