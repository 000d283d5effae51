#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! End-to-end tests against a live proxy: pass-through fidelity, session
//! isolation, decode-failure isolation, and shutdown coordination.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use ldap_tap::config::ProxyConfig;
use ldap_tap::core::frame::Direction;
use ldap_tap::protocol::ldap::EnvelopeDecoder;
use ldap_tap::service::acceptor::Acceptor;
use ldap_tap::service::dumper::{DumpRecord, DumpSink};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// HARNESS
// ============================================================================

#[derive(Debug, Clone)]
struct Captured {
    session: String,
    direction: Direction,
    sequence: u64,
    outcome: Result<String, String>,
}

/// Sink that stores records for assertions instead of logging them.
#[derive(Default)]
struct CaptureSink {
    records: Mutex<Vec<Captured>>,
}

impl CaptureSink {
    fn snapshot(&self) -> Vec<Captured> {
        self.records.lock().unwrap().clone()
    }
}

impl DumpSink for CaptureSink {
    fn record(&self, record: &DumpRecord) {
        self.records.lock().unwrap().push(Captured {
            session: record.session.to_string(),
            direction: record.direction,
            sequence: record.sequence,
            outcome: match &record.outcome {
                Ok(message) => Ok(message.to_string()),
                Err(error) => Err(error.to_string()),
            },
        });
    }
}

struct TestProxy {
    addr: std::net::SocketAddr,
    upstream: TcpListener,
    sink: Arc<CaptureSink>,
    serve_handle: JoinHandle<ldap_tap::Result<()>>,
}

async fn start_proxy() -> TestProxy {
    start_proxy_with_sink(Arc::new(CaptureSink::default())).await
}

async fn start_proxy_with_sink(sink: Arc<CaptureSink>) -> TestProxy {
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = ProxyConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        upstream_addr: upstream.local_addr().unwrap().to_string(),
        ..ProxyConfig::default()
    };

    let acceptor = Acceptor::bind(&config, Arc::new(EnvelopeDecoder), sink.clone())
        .await
        .unwrap();
    let addr = acceptor.local_addr().unwrap();
    let serve_handle = tokio::spawn(acceptor.serve());

    TestProxy {
        addr,
        upstream,
        sink,
        serve_handle,
    }
}

/// Connect a client through the proxy and accept the paired upstream socket.
async fn connect_pair(proxy: &TestProxy) -> (TcpStream, TcpStream) {
    let client = TcpStream::connect(proxy.addr).await.unwrap();
    let (server, _) = timeout(TEST_TIMEOUT, proxy.upstream.accept())
        .await
        .expect("upstream accept timed out")
        .unwrap();
    (client, server)
}

async fn read_exactly(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    timeout(TEST_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .expect("read timed out")
        .unwrap();
    buf
}

async fn expect_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 1];
    match timeout(TEST_TIMEOUT, stream.read(&mut buf))
        .await
        .expect("close not observed in time")
    {
        Ok(0) => {}
        Ok(n) => panic!("expected close, got {n} bytes"),
        // A reset counts as closed too: teardown may race bytes still unread.
        Err(_) => {}
    }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// One SEQUENCE-framed message with a minimal DER length and arbitrary payload.
fn sequence_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x30];
    let len = payload.len();
    if len < 128 {
        out.push(len as u8);
    } else {
        let mut be = len.to_be_bytes().to_vec();
        while be.first() == Some(&0) {
            be.remove(0);
        }
        out.push(0x80 | be.len() as u8);
        out.extend_from_slice(&be);
    }
    out.extend_from_slice(payload);
    out
}

/// A well-formed anonymous BindRequest envelope.
fn bind_request(message_id: u8) -> Vec<u8> {
    vec![
        0x30, 0x0C, 0x02, 0x01, message_id, 0x60, 0x07, 0x02, 0x01, 0x03, 0x04, 0x00, 0x80, 0x00,
    ]
}

/// A well-formed success BindResponse envelope.
fn bind_response(message_id: u8) -> Vec<u8> {
    vec![
        0x30, 0x0C, 0x02, 0x01, message_id, 0x61, 0x07, 0x0A, 0x01, 0x00, 0x04, 0x00, 0x04, 0x00,
    ]
}

// ============================================================================
// PASS-THROUGH FIDELITY
// ============================================================================

#[tokio::test]
async fn forwards_bytes_verbatim_in_both_directions() {
    let proxy = start_proxy().await;
    let (mut client, mut server) = connect_pair(&proxy).await;

    let mut expected_up = Vec::new();
    let mut expected_down = Vec::new();
    for i in 0..5u8 {
        let request = bind_request(i + 1);
        let response = bind_response(i + 1);
        client.write_all(&request).await.unwrap();
        server.write_all(&response).await.unwrap();
        expected_up.extend_from_slice(&request);
        expected_down.extend_from_slice(&response);
    }

    let seen_up = read_exactly(&mut server, expected_up.len()).await;
    let seen_down = read_exactly(&mut client, expected_down.len()).await;
    assert_eq!(seen_up, expected_up);
    assert_eq!(seen_down, expected_down);
}

#[tokio::test]
async fn forwards_the_seven_byte_example_frame() {
    let proxy = start_proxy().await;
    let (mut client, mut server) = connect_pair(&proxy).await;

    let message = [0x30, 0x05, 0x11, 0x22, 0x33, 0x44, 0x55];
    client.write_all(&message).await.unwrap();

    let seen = read_exactly(&mut server, message.len()).await;
    assert_eq!(seen, message);
}

#[tokio::test]
async fn forwards_large_frames_intact() {
    let proxy = start_proxy().await;
    let (mut client, mut server) = connect_pair(&proxy).await;

    // Long-form length with two length bytes.
    let message = sequence_frame(&vec![0x5Au8; 65536]);
    client.write_all(&message).await.unwrap();

    let seen = read_exactly(&mut server, message.len()).await;
    assert_eq!(seen, message);
}

// ============================================================================
// DUMP PATH
// ============================================================================

#[tokio::test]
async fn records_carry_direction_and_sequence() {
    let proxy = start_proxy().await;
    let (mut client, mut server) = connect_pair(&proxy).await;

    client.write_all(&bind_request(1)).await.unwrap();
    client.write_all(&bind_request(2)).await.unwrap();
    server.write_all(&bind_response(1)).await.unwrap();

    wait_until("three dump records", || proxy.sink.snapshot().len() == 3).await;

    let records = proxy.sink.snapshot();
    let client_seqs: Vec<u64> = records
        .iter()
        .filter(|r| r.direction == Direction::Client)
        .map(|r| r.sequence)
        .collect();
    let server_seqs: Vec<u64> = records
        .iter()
        .filter(|r| r.direction == Direction::Server)
        .map(|r| r.sequence)
        .collect();
    assert_eq!(client_seqs, vec![1, 2]);
    assert_eq!(server_seqs, vec![1]);
    assert!(records.iter().all(|r| r.session == records[0].session));
    assert!(records.iter().all(|r| r.outcome.is_ok()));
}

#[tokio::test]
async fn decode_failure_does_not_stop_forwarding_or_logging() {
    let proxy = start_proxy().await;
    let (mut client, mut server) = connect_pair(&proxy).await;

    // Well-framed, semantically invalid, then a valid message.
    let garbage = sequence_frame(&[0xDE, 0xAD, 0xBE]);
    let valid = bind_request(2);
    client.write_all(&garbage).await.unwrap();
    client.write_all(&valid).await.unwrap();

    let mut expected = garbage.clone();
    expected.extend_from_slice(&valid);
    let seen = read_exactly(&mut server, expected.len()).await;
    assert_eq!(seen, expected);

    wait_until("two dump records", || proxy.sink.snapshot().len() == 2).await;
    let records = proxy.sink.snapshot();
    assert_eq!(records[0].sequence, 1);
    assert!(records[0].outcome.is_err());
    assert_eq!(records[1].sequence, 2);
    assert!(records[1].outcome.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stalled_sink_never_backpressures_forwarding() {
    /// Sink whose first record call blocks until the test releases it.
    struct StallSink {
        seen: AtomicUsize,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl DumpSink for StallSink {
        fn record(&self, _record: &DumpRecord) {
            self.seen.fetch_add(1, Ordering::SeqCst);
            // Blocks until the sender is dropped.
            let _ = self.release.lock().unwrap().recv();
        }
    }

    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let sink = Arc::new(StallSink {
        seen: AtomicUsize::new(0),
        release: Mutex::new(release_rx),
    });

    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = ProxyConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        upstream_addr: upstream.local_addr().unwrap().to_string(),
        dump_queue_depth: 1,
        ..ProxyConfig::default()
    };
    let acceptor = Acceptor::bind(&config, Arc::new(EnvelopeDecoder), sink.clone())
        .await
        .unwrap();
    let addr = acceptor.local_addr().unwrap();
    let _serve = tokio::spawn(acceptor.serve());

    let mut client = TcpStream::connect(addr).await.unwrap();
    let (mut server, _) = timeout(TEST_TIMEOUT, upstream.accept()).await.unwrap().unwrap();

    // With the dump queue stuck after the first record, fifty messages must
    // still flow through unimpeded.
    let message = bind_request(1);
    let mut expected = Vec::new();
    for _ in 0..50 {
        client.write_all(&message).await.unwrap();
        expected.extend_from_slice(&message);
    }
    let seen = read_exactly(&mut server, expected.len()).await;
    assert_eq!(seen, expected);
    assert!(sink.seen.load(Ordering::SeqCst) >= 1);

    drop(release_tx);
}

// ============================================================================
// SESSION ISOLATION
// ============================================================================

#[tokio::test]
async fn concurrent_sessions_do_not_cross_deliver() {
    let proxy = start_proxy().await;
    let (mut client_a, mut server_a) = connect_pair(&proxy).await;
    let (mut client_b, mut server_b) = connect_pair(&proxy).await;

    let message_a = sequence_frame(&[0xAA; 100]);
    let message_b = sequence_frame(&[0xBB; 200]);
    client_a.write_all(&message_a).await.unwrap();
    client_b.write_all(&message_b).await.unwrap();

    let seen_a = read_exactly(&mut server_a, message_a.len()).await;
    let seen_b = read_exactly(&mut server_b, message_b.len()).await;
    assert_eq!(seen_a, message_a);
    assert_eq!(seen_b, message_b);
}

#[tokio::test]
async fn records_are_tagged_with_the_owning_session() {
    let proxy = start_proxy().await;
    let (mut client_a, _server_a) = connect_pair(&proxy).await;
    let (mut client_b, _server_b) = connect_pair(&proxy).await;

    client_a.write_all(&bind_request(10)).await.unwrap();
    client_b.write_all(&bind_request(20)).await.unwrap();

    wait_until("two dump records", || proxy.sink.snapshot().len() == 2).await;

    let records = proxy.sink.snapshot();
    let find = |msgid: &str| {
        records
            .iter()
            .find(|r| matches!(&r.outcome, Ok(text) if text.contains(msgid)))
            .map(|r| r.session.clone())
            .expect("record not found")
    };
    let session_a = find("msgid 10");
    let session_b = find("msgid 20");
    assert_ne!(session_a, session_b);
    assert!(records
        .iter()
        .all(|r| r.sequence == 1 && r.direction == Direction::Client));
}

// ============================================================================
// SESSION LIFECYCLE
// ============================================================================

#[tokio::test]
async fn client_close_releases_the_server_side() {
    let proxy = start_proxy().await;
    let (mut client, mut server) = connect_pair(&proxy).await;

    client.write_all(&bind_request(1)).await.unwrap();
    read_exactly(&mut server, bind_request(1).len()).await;

    drop(client);
    // Coordinated teardown must close the paired upstream connection rather
    // than leaving its tasks blocked forever.
    expect_closed(&mut server).await;
}

#[tokio::test]
async fn framing_violation_kills_the_session_not_the_proxy() {
    let proxy = start_proxy().await;
    let (mut client, mut server) = connect_pair(&proxy).await;

    // 0xFF is not a SEQUENCE tag; the session must die...
    client.write_all(&[0xFF, 0x00]).await.unwrap();
    expect_closed(&mut server).await;
    expect_closed(&mut client).await;

    // ...while the proxy keeps serving new sessions.
    let (mut client2, mut server2) = connect_pair(&proxy).await;
    let message = bind_request(5);
    client2.write_all(&message).await.unwrap();
    let seen = read_exactly(&mut server2, message.len()).await;
    assert_eq!(seen, message);
    assert!(!proxy.serve_handle.is_finished());
}

#[tokio::test]
async fn upstream_dial_failure_drops_client_but_keeps_accepting() {
    // Grab an ephemeral port with no listener behind it.
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = unused.local_addr().unwrap();
    drop(unused);

    let config = ProxyConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        upstream_addr: dead_addr.to_string(),
        ..ProxyConfig::default()
    };
    let acceptor = Acceptor::bind(
        &config,
        Arc::new(EnvelopeDecoder),
        Arc::new(CaptureSink::default()),
    )
    .await
    .unwrap();
    let addr = acceptor.local_addr().unwrap();
    let serve_handle = tokio::spawn(acceptor.serve());

    for _ in 0..3 {
        let mut client = TcpStream::connect(addr).await.unwrap();
        expect_closed(&mut client).await;
    }
    assert!(!serve_handle.is_finished());
}
