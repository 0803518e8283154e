//! Integration tests for the resolution pipeline
//!
//! These tests run the real UDP endpoint (and for the server-level cases
//! the whole supervisor) against scripted upstreams, talking to it the way
//! a stub resolver would: serialized queries over a datagram socket.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::time::timeout;

use vigil_dns::config::{CacheConf, EndpointConf, ExternalConf, ExternalKind};
use vigil_dns::{
    Blocker, CacheFeeder, CacheSource, Config, Message, MemoryCache, NamedSource, Rcode, Record,
    RecordData, RecordType, ResolverChain, Server, StaticMap, UdpEndpoint, Upstream, DEFAULT_TTL,
};

/// Send one query and wait for the reply
async fn query(server: SocketAddr, name: &str, qtype: RecordType) -> Message {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let request = Message::query(rand::random(), name, qtype);
    socket.send_to(&request.encode(), server).await.unwrap();

    let mut buf = vec![0u8; 4096];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for reply")
        .unwrap();

    let reply = Message::parse(&buf[..len]).unwrap();
    assert_eq!(reply.id, request.id);
    reply
}

/// A recursive resolver that answers every A query with a fixed address
async fn spawn_fake_upstream(answer: Ipv4Addr, ttl: u32) -> (SocketAddr, Arc<AtomicUsize>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let Ok((len, src)) = socket.recv_from(&mut buf).await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let request = Message::parse(&buf[..len]).unwrap();
            let mut reply = Message::reply_to(&request);
            let name = request.questions[0].name.clone();
            reply.answers.push(Record::a(name, answer, ttl));
            socket.send_to(&reply.encode(), src).await.unwrap();
        }
    });

    (addr, hits)
}

/// Start a bare endpoint around the given chain on a fixed local port
async fn start_endpoint(port: u16, chain: ResolverChain) -> (SocketAddr, UdpEndpoint, broadcast::Sender<()>) {
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let endpoint = UdpEndpoint::new(addr, chain);
    let (shutdown_tx, _) = broadcast::channel(1);
    let _ = endpoint.start(&shutdown_tx).await.unwrap();
    (addr, endpoint, shutdown_tx)
}

fn default_chain(blocker: Arc<Blocker>, custom: StaticMap, cache: Arc<MemoryCache>, upstream: Upstream) -> ResolverChain {
    ResolverChain::new(vec![
        NamedSource::new("block", blocker),
        NamedSource::new("custom", Arc::new(custom)),
        NamedSource::new("cache", Arc::new(CacheSource(cache.clone()))),
        NamedSource::new("external", Arc::new(CacheFeeder::new(Arc::new(upstream), cache))),
    ])
}

#[tokio::test]
async fn test_blocked_name_answers_despite_dead_upstream() {
    let blocker = Arc::new(Blocker::new());
    blocker.extend(["ads.example".to_string()]).await;
    let cache = Arc::new(MemoryCache::new(1000, 0, false));
    // Nothing listens on port 9; the blocker must answer before the
    // upstream is ever consulted
    let upstream = Upstream::udp("127.0.0.1:9".parse().unwrap());

    let (addr, _endpoint, _shutdown) =
        start_endpoint(43211, default_chain(blocker, StaticMap::new(), cache, upstream)).await;

    let reply = query(addr, "ads.example", RecordType::A).await;
    assert_eq!(reply.flags.rcode(), Rcode::NoError);
    assert_eq!(reply.answers.len(), 1);
    assert_eq!(reply.answers[0].data, RecordData::A(Ipv4Addr::UNSPECIFIED));
    assert_eq!(reply.answers[0].ttl, DEFAULT_TTL);

    let reply = query(addr, "ads.example", RecordType::Aaaa).await;
    assert_eq!(reply.flags.rcode(), Rcode::NoError);
    assert_eq!(
        reply.answers[0].data,
        RecordData::Aaaa(Ipv6Addr::UNSPECIFIED)
    );
    assert_eq!(reply.answers[0].ttl, DEFAULT_TTL);
}

#[tokio::test]
async fn test_server_answers_static_override() {
    let conf = Config {
        endpoint: EndpointConf {
            address: "127.0.0.1:43212".to_string(),
        },
        custom: vec![vigil_dns::config::CustomEntry {
            name: "router.lan".to_string(),
            address: "192.168.1.1".to_string(),
        }],
        allow_external: false,
        ..Config::default()
    };
    conf.validate().unwrap();

    let mut server = Server::new();
    server.start(&conf).await.unwrap();
    let addr = conf.bind_addr().unwrap();

    let reply = query(addr, "router.lan", RecordType::A).await;
    assert_eq!(reply.flags.rcode(), Rcode::NoError);
    assert_eq!(
        reply.answers[0].data,
        RecordData::A(Ipv4Addr::new(192, 168, 1, 1))
    );
    assert_eq!(reply.answers[0].ttl, DEFAULT_TTL);

    // With no upstream configured, unknown names are name errors
    let reply = query(addr, "unknown.example", RecordType::A).await;
    assert_eq!(reply.flags.rcode(), Rcode::NxDomain);
    assert!(reply.answers.is_empty());

    server.stop().await;
    server.wait().await;
}

#[tokio::test]
async fn test_second_query_is_served_from_cache() {
    let (upstream_addr, upstream_hits) =
        spawn_fake_upstream(Ipv4Addr::new(93, 184, 216, 34), 120).await;

    let conf = Config {
        endpoint: EndpointConf {
            address: "127.0.0.1:43213".to_string(),
        },
        cache: CacheConf {
            size: 100_000,
            basettl: 60,
            force_basettl: false,
        },
        external: ExternalConf {
            kind: ExternalKind::Udp,
            endpoint: upstream_addr.to_string(),
        },
        ..Config::default()
    };

    let mut server = Server::new();
    server.start(&conf).await.unwrap();
    let addr = conf.bind_addr().unwrap();

    let first = query(addr, "example.com", RecordType::A).await;
    assert_eq!(first.flags.rcode(), Rcode::NoError);
    assert_eq!(
        first.answers[0].data,
        RecordData::A(Ipv4Addr::new(93, 184, 216, 34))
    );
    assert_eq!(first.answers[0].ttl, 120);
    assert_eq!(upstream_hits.load(Ordering::SeqCst), 1);

    let second = query(addr, "example.com", RecordType::A).await;
    assert_eq!(
        second.answers[0].data,
        RecordData::A(Ipv4Addr::new(93, 184, 216, 34))
    );
    assert_eq!(second.answers[0].ttl, DEFAULT_TTL);
    assert_eq!(upstream_hits.load(Ordering::SeqCst), 1);

    server.stop().await;
    server.wait().await;
}

#[tokio::test]
async fn test_reconfigure_swaps_overrides_while_serving() {
    let base = Config {
        endpoint: EndpointConf {
            address: "127.0.0.1:43214".to_string(),
        },
        custom: vec![vigil_dns::config::CustomEntry {
            name: "svc.lan".to_string(),
            address: "10.0.0.1".to_string(),
        }],
        allow_external: false,
        ..Config::default()
    };

    let mut server = Server::new();
    server.start(&base).await.unwrap();
    let addr = base.bind_addr().unwrap();

    let reply = query(addr, "svc.lan", RecordType::A).await;
    assert_eq!(reply.answers[0].data, RecordData::A(Ipv4Addr::new(10, 0, 0, 1)));

    let updated = Config {
        custom: vec![vigil_dns::config::CustomEntry {
            name: "svc.lan".to_string(),
            address: "10.0.0.2".to_string(),
        }],
        ..base.clone()
    };
    server.reconfigure(&updated).await.unwrap();

    let reply = query(addr, "svc.lan", RecordType::A).await;
    assert_eq!(reply.answers[0].data, RecordData::A(Ipv4Addr::new(10, 0, 0, 2)));

    server.stop().await;
    server.wait().await;
}

#[tokio::test]
async fn test_blocklist_loads_in_background() {
    let dir = tempfile::tempdir().unwrap();
    let list_path = dir.path().join("ads.txt");
    tokio::fs::write(&list_path, "# ads\n0.0.0.0 ads.example\n")
        .await
        .unwrap();

    let conf = Config {
        endpoint: EndpointConf {
            address: "127.0.0.1:43215".to_string(),
        },
        blocking_lists: vec![list_path.to_string_lossy().into_owned()],
        allow_external: false,
        ..Config::default()
    };

    let mut server = Server::new();
    server.start(&conf).await.unwrap();
    let addr = conf.bind_addr().unwrap();

    // The loader runs in the background; before it finishes the name just
    // misses, never falsely blocks. Poll until the entry lands.
    let mut blocked = false;
    for _ in 0..40 {
        let reply = query(addr, "ads.example", RecordType::A).await;
        match reply.flags.rcode() {
            Rcode::NoError => {
                assert_eq!(reply.answers[0].data, RecordData::A(Ipv4Addr::UNSPECIFIED));
                blocked = true;
                break;
            }
            Rcode::NxDomain => tokio::time::sleep(Duration::from_millis(50)).await,
            other => panic!("unexpected rcode {other:?}"),
        }
    }
    assert!(blocked, "blocklist never loaded");

    server.stop().await;
    server.wait().await;
}

#[tokio::test]
async fn test_garbage_datagram_is_dropped_not_answered() {
    let mut custom = StaticMap::new();
    custom.add("ok.lan", "10.1.1.1".parse::<std::net::IpAddr>().unwrap());
    let chain = ResolverChain::new(vec![NamedSource::new("custom", Arc::new(custom))]);
    let (addr, _endpoint, _shutdown) = start_endpoint(43216, chain).await;

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(&[0xDE, 0xAD, 0xBE], addr).await.unwrap();

    let mut buf = vec![0u8; 512];
    let silence = timeout(Duration::from_millis(300), socket.recv_from(&mut buf)).await;
    assert!(silence.is_err(), "garbage must not be answered");

    // The workers are still alive and serving
    let reply = query(addr, "ok.lan", RecordType::A).await;
    assert_eq!(reply.answers[0].data, RecordData::A(Ipv4Addr::new(10, 1, 1, 1)));
}

#[tokio::test]
async fn test_set_chain_swaps_answers_atomically() {
    let mut first = StaticMap::new();
    first.add("svc.lan", "10.0.0.1".parse::<std::net::IpAddr>().unwrap());
    let chain = ResolverChain::new(vec![NamedSource::new("custom", Arc::new(first))]);
    let (addr, endpoint, _shutdown) = start_endpoint(43217, chain).await;

    let reply = query(addr, "svc.lan", RecordType::A).await;
    assert_eq!(reply.answers[0].data, RecordData::A(Ipv4Addr::new(10, 0, 0, 1)));

    let mut second = StaticMap::new();
    second.add("svc.lan", "10.0.0.2".parse::<std::net::IpAddr>().unwrap());
    endpoint
        .set_chain(ResolverChain::new(vec![NamedSource::new(
            "custom",
            Arc::new(second),
        )]))
        .await;

    let reply = query(addr, "svc.lan", RecordType::A).await;
    assert_eq!(reply.answers[0].data, RecordData::A(Ipv4Addr::new(10, 0, 0, 2)));
}

#[tokio::test]
async fn test_upstream_failure_of_last_source_is_servfail() {
    let cache = Arc::new(MemoryCache::new(0, 0, false));
    // Closed port: the ICMP rejection or the deadline turns into a
    // transport-level failure at the last source
    let upstream = Upstream::udp("127.0.0.1:9".parse().unwrap());
    let chain = default_chain(Arc::new(Blocker::new()), StaticMap::new(), cache, upstream);
    let (addr, _endpoint, _shutdown) = start_endpoint(43218, chain).await;

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let request = Message::query(7, "unlucky.example", RecordType::A);
    socket.send_to(&request.encode(), addr).await.unwrap();

    let mut buf = vec![0u8; 4096];
    let (len, _) = timeout(Duration::from_secs(4), socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for reply")
        .unwrap();
    let reply = Message::parse(&buf[..len]).unwrap();

    assert_eq!(reply.id, 7);
    assert_eq!(reply.flags.rcode(), Rcode::ServFail);
    assert!(reply.answers.is_empty());
}
