//! End-to-end tests over real TCP sockets.
//!
//! Each test binds a relay on an ephemeral port, connects raw `TcpStream`
//! clients speaking the wire protocol, and checks the delivery and
//! registration behavior observable from outside.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use natter_core::{wire, Message, MessageKind, PersistError, Persister};
use natter_server::{RelayConfig, RelayServer, SessionRegistry};

// ----------------------------------------------------------------------------
// Test Harness
// ----------------------------------------------------------------------------

/// Records every persisted message for later inspection
#[derive(Default)]
struct RecordingPersister {
    messages: Mutex<Vec<Message>>,
}

impl RecordingPersister {
    fn recorded(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Persister for RecordingPersister {
    async fn persist(&self, message: &Message) -> Result<(), PersistError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Always fails, for checking that persistence is best-effort
struct FailingPersister;

#[async_trait]
impl Persister for FailingPersister {
    async fn persist(&self, _message: &Message) -> Result<(), PersistError> {
        Err(PersistError::Backend {
            reason: "backend down".into(),
        })
    }
}

struct TestRelay {
    addr: std::net::SocketAddr,
    registry: Arc<SessionRegistry>,
}

async fn start_relay(persister: Arc<dyn Persister>) -> TestRelay {
    let config = RelayConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..Default::default()
    };
    start_relay_with(config, persister).await
}

async fn start_relay_with(config: RelayConfig, persister: Arc<dyn Persister>) -> TestRelay {
    let server = RelayServer::bind(&config, persister).await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry();
    tokio::spawn(server.run());
    TestRelay { addr, registry }
}

async fn connect(relay: &TestRelay, nick: &str) -> TcpStream {
    let mut stream = TcpStream::connect(relay.addr).await.unwrap();
    send(&mut stream, &Message::handshake(nick)).await;
    stream
}

async fn send(stream: &mut TcpStream, message: &Message) {
    let frame = wire::encode_framed(message).unwrap();
    stream.write_all(&frame).await.unwrap();
}

/// Read one raw payload, failing the test after two seconds
async fn recv_payload(stream: &mut TcpStream) -> Option<Vec<u8>> {
    timeout(Duration::from_secs(2), wire::read_frame(stream))
        .await
        .expect("timed out waiting for frame")
        .expect("read error")
}

async fn recv(stream: &mut TcpStream) -> Message {
    let payload = recv_payload(stream).await.expect("unexpected end of stream");
    wire::decode(&payload).unwrap()
}

/// Assert nothing arrives on the stream within a short window
async fn assert_silent(stream: &mut TcpStream) {
    let outcome = timeout(Duration::from_millis(300), wire::read_frame(stream)).await;
    assert!(outcome.is_err(), "expected no frame, got one");
}

async fn wait_for_sessions(registry: &SessionRegistry, expected: usize) {
    for _ in 0..100 {
        if registry.len() == expected {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "registry never reached {} sessions (at {})",
        expected,
        registry.len()
    );
}

// ----------------------------------------------------------------------------
// Handshake & Registration
// ----------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_nickname_rejected_with_system_frame() {
    let relay = start_relay(Arc::new(RecordingPersister::default())).await;

    let mut alice = connect(&relay, "alice").await;
    wait_for_sessions(&relay.registry, 1).await;

    let mut imposter = connect(&relay, "alice").await;
    let notice = recv(&mut imposter).await;
    assert_eq!(notice.kind, MessageKind::System);
    assert!(notice.text.contains("alice"));
    assert!(notice.text.contains("already"));

    // The rejected connection is closed...
    assert!(recv_payload(&mut imposter).await.is_none());
    assert_eq!(relay.registry.len(), 1);

    // ...while the original session still works
    send(&mut alice, &Message::chat("alice", "", "still here")).await;
    let echoed = recv(&mut alice).await;
    assert_eq!(echoed.text, "still here");
}

#[tokio::test]
async fn non_handshake_first_frame_closes_connection() {
    let relay = start_relay(Arc::new(RecordingPersister::default())).await;

    let mut stream = TcpStream::connect(relay.addr).await.unwrap();
    send(&mut stream, &Message::chat("alice", "", "skipping handshake")).await;

    assert!(recv_payload(&mut stream).await.is_none());
    assert_eq!(relay.registry.len(), 0);
}

#[tokio::test]
async fn silent_connection_closed_after_handshake_timeout() {
    let config = RelayConfig {
        host: "127.0.0.1".into(),
        port: 0,
        handshake_timeout_ms: 200,
    };
    let relay = start_relay_with(config, Arc::new(RecordingPersister::default())).await;

    // Connect and say nothing at all
    let mut stream = TcpStream::connect(relay.addr).await.unwrap();

    // The relay hangs up once the handshake window lapses
    let outcome = timeout(Duration::from_secs(2), wire::read_frame(&mut stream))
        .await
        .expect("relay never closed the silent connection");
    assert!(outcome.unwrap().is_none());
    assert_eq!(relay.registry.len(), 0);
}

#[tokio::test]
async fn disconnect_frees_nickname_for_reregistration() {
    let relay = start_relay(Arc::new(RecordingPersister::default())).await;

    let alice = connect(&relay, "alice").await;
    wait_for_sessions(&relay.registry, 1).await;

    drop(alice);
    wait_for_sessions(&relay.registry, 0).await;

    let mut again = connect(&relay, "alice").await;
    wait_for_sessions(&relay.registry, 1).await;

    send(&mut again, &Message::chat("alice", "", "back")).await;
    assert_eq!(recv(&mut again).await.text, "back");
}

// ----------------------------------------------------------------------------
// Routing
// ----------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_reaches_all_sessions_with_identical_bytes() {
    let relay = start_relay(Arc::new(RecordingPersister::default())).await;

    let mut alice = connect(&relay, "alice").await;
    let mut bob = connect(&relay, "bob").await;
    wait_for_sessions(&relay.registry, 2).await;

    send(&mut alice, &Message::chat("alice", "", "hi")).await;

    let alice_payload = recv_payload(&mut alice).await.unwrap();
    let bob_payload = recv_payload(&mut bob).await.unwrap();
    assert_eq!(alice_payload, bob_payload);

    let message = wire::decode(&bob_payload).unwrap();
    assert_eq!(message.sender, "alice");
    assert_eq!(message.text, "hi");
}

#[tokio::test]
async fn direct_message_goes_to_recipient_and_sender_only() {
    let persister = Arc::new(RecordingPersister::default());
    let relay = start_relay(persister.clone()).await;

    let mut alice = connect(&relay, "alice").await;
    let mut bob = connect(&relay, "bob").await;
    let mut carol = connect(&relay, "carol").await;
    wait_for_sessions(&relay.registry, 3).await;

    send(&mut alice, &Message::chat("alice", "bob", "between us")).await;

    assert_eq!(recv(&mut bob).await.text, "between us");
    assert_eq!(recv(&mut alice).await.text, "between us");
    assert_silent(&mut carol).await;
}

#[tokio::test]
async fn missing_recipient_drops_silently_with_sender_echo() {
    let persister = Arc::new(RecordingPersister::default());
    let relay = start_relay(persister.clone()).await;

    let mut alice = connect(&relay, "alice").await;
    let mut bob = connect(&relay, "bob").await;
    wait_for_sessions(&relay.registry, 2).await;

    send(&mut alice, &Message::chat("alice", "carol", "hello?")).await;

    assert_eq!(recv(&mut alice).await.text, "hello?");
    assert_silent(&mut bob).await;

    // Persisted normally, not as an error
    assert_eq!(persister.recorded().len(), 1);
}

// ----------------------------------------------------------------------------
// Authorship & Stamping
// ----------------------------------------------------------------------------

#[tokio::test]
async fn forged_sender_never_persisted_or_routed() {
    let persister = Arc::new(RecordingPersister::default());
    let relay = start_relay(persister.clone()).await;

    let mut alice = connect(&relay, "alice").await;
    let mut bob = connect(&relay, "bob").await;
    wait_for_sessions(&relay.registry, 2).await;

    send(&mut alice, &Message::chat("bob", "", "forged")).await;
    send(&mut alice, &Message::chat("alice", "", "genuine")).await;

    // Only the genuine frame makes it through, and the session stayed open
    assert_eq!(recv(&mut bob).await.text, "genuine");

    let recorded = persister.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].text, "genuine");
}

#[tokio::test]
async fn server_overwrites_client_supplied_timestamp() {
    let persister = Arc::new(RecordingPersister::default());
    let relay = start_relay(persister.clone()).await;

    let mut alice = connect(&relay, "alice").await;
    wait_for_sessions(&relay.registry, 1).await;

    let mut msg = Message::chat("alice", "", "when?");
    msg.sent_at_nanos = -12345;
    send(&mut alice, &msg).await;

    let delivered = recv(&mut alice).await;
    assert!(delivered.sent_at_nanos > 0);
    assert_ne!(delivered.sent_at_nanos, -12345);
}

// ----------------------------------------------------------------------------
// Fault Tolerance
// ----------------------------------------------------------------------------

#[tokio::test]
async fn malformed_frame_tolerated_session_stays_open() {
    let relay = start_relay(Arc::new(RecordingPersister::default())).await;

    let mut alice = connect(&relay, "alice").await;
    wait_for_sessions(&relay.registry, 1).await;

    // Valid framing, garbage payload
    let garbage = wire::frame(&[0xDE, 0xAD, 0xBE, 0xEF]);
    alice.write_all(&garbage).await.unwrap();

    send(&mut alice, &Message::chat("alice", "", "survived")).await;
    assert_eq!(recv(&mut alice).await.text, "survived");
}

#[tokio::test]
async fn persist_failure_does_not_block_delivery() {
    let relay = start_relay(Arc::new(FailingPersister)).await;

    let mut alice = connect(&relay, "alice").await;
    let mut bob = connect(&relay, "bob").await;
    wait_for_sessions(&relay.registry, 2).await;

    send(&mut alice, &Message::chat("alice", "", "despite backend")).await;

    assert_eq!(recv(&mut bob).await.text, "despite backend");
    assert_eq!(recv(&mut alice).await.text, "despite backend");
}
