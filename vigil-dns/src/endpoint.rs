//! UDP endpoint
//!
//! Owns the listening socket and moves datagrams through the chain. A
//! fixed pool of receive workers pulls from the socket and spawns one
//! short-lived handler task per datagram; handlers push finished replies
//! onto a bounded queue drained by a single send worker, so one slow or
//! blackholed client never stalls the receive side, and all writes to the
//! socket go through one task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::chain::ResolverChain;
use crate::error::Result;
use crate::wire::{Message, MAX_DATAGRAM_SIZE};

/// Number of datagram receive workers
pub const RECV_WORKERS: usize = 10;

/// Depth of the reply queue between handlers and the send worker. When it
/// fills, handlers block and receive workers stop pulling datagrams;
/// dropping inbound packets under burst is acceptable for UDP.
const SEND_QUEUE_DEPTH: usize = 256;

/// Deadline for writing one reply
const WRITE_DEADLINE: Duration = Duration::from_millis(200);

/// UDP endpoint feeding the resolver chain
pub struct UdpEndpoint {
    bind_addr: SocketAddr,
    chain: Arc<RwLock<ResolverChain>>,
}

impl UdpEndpoint {
    pub fn new(bind_addr: SocketAddr, chain: ResolverChain) -> Self {
        Self {
            bind_addr,
            chain: Arc::new(RwLock::new(chain)),
        }
    }

    /// Swap the chain. Takes the write side of the chain lock, so the swap
    /// waits for in-flight resolutions and is atomic for new handlers.
    pub async fn set_chain(&self, chain: ResolverChain) {
        *self.chain.write().await = chain;
    }

    /// Bind the socket and spawn the worker pool
    ///
    /// The returned handle resolves once every worker has exited after the
    /// shutdown channel fires.
    pub async fn start(&self, shutdown: &broadcast::Sender<()>) -> Result<JoinHandle<()>> {
        let socket = Arc::new(UdpSocket::bind(self.bind_addr).await?);
        info!("udp endpoint listening on {}", self.bind_addr);

        let (reply_tx, reply_rx) = mpsc::channel::<(Message, SocketAddr)>(SEND_QUEUE_DEPTH);

        let mut workers = Vec::with_capacity(RECV_WORKERS + 1);
        for _ in 0..RECV_WORKERS {
            workers.push(spawn_receive_worker(
                socket.clone(),
                self.chain.clone(),
                reply_tx.clone(),
                shutdown.subscribe(),
            ));
        }
        drop(reply_tx);
        workers.push(spawn_send_worker(socket, reply_rx, shutdown.subscribe()));

        let bind_addr = self.bind_addr;
        Ok(tokio::spawn(async move {
            for worker in workers {
                let _ = worker.await;
            }
            info!("udp endpoint on {} stopped", bind_addr);
        }))
    }
}

fn spawn_receive_worker(
    socket: Arc<UdpSocket>,
    chain: Arc<RwLock<ResolverChain>>,
    reply_tx: mpsc::Sender<(Message, SocketAddr)>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, src)) => {
                            let datagram = buf[..len].to_vec();
                            let chain = chain.clone();
                            let reply_tx = reply_tx.clone();
                            tokio::spawn(async move {
                                handle_datagram(datagram, src, chain, reply_tx).await;
                            });
                        }
                        Err(e) => {
                            error!("udp receive failed: {}", e);
                            break;
                        }
                    }
                }
            }
        }
    })
}

/// Parse one datagram, run it through the chain, enqueue the reply.
/// Unparseable datagrams are dropped without a reply.
async fn handle_datagram(
    datagram: Vec<u8>,
    src: SocketAddr,
    chain: Arc<RwLock<ResolverChain>>,
    reply_tx: mpsc::Sender<(Message, SocketAddr)>,
) {
    let request = match Message::parse(&datagram) {
        Ok(message) => message,
        Err(err) => {
            warn!("dropping datagram from {}: {}", src, err);
            return;
        }
    };

    // The chain stays readable for the whole resolution; a swap waits for
    // handlers already past this point.
    let reply = {
        let chain = chain.read().await;
        chain.resolve(&request).await
    };

    if reply_tx.send((reply, src)).await.is_err() {
        debug!("reply queue closed; dropping reply for {}", src);
    }
}

fn spawn_send_worker(
    socket: Arc<UdpSocket>,
    mut reply_rx: mpsc::Receiver<(Message, SocketAddr)>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                item = reply_rx.recv() => {
                    let Some((reply, dest)) = item else { break };
                    let payload = reply.encode();
                    match tokio::time::timeout(WRITE_DEADLINE, socket.send_to(&payload, dest)).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            error!("udp send to {} failed: {}", dest, e);
                            break;
                        }
                        Err(_) => warn!("udp send to {} timed out", dest),
                    }
                }
            }
        }
    })
}
