//! Integration tests for the session driver over in-memory transports.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use socketforge_protocol::{Data, EngineIoVersion, PayloadCodec, ProtocolMessage};
use socketforge_session::{
    DisconnectReason, PollingSession, Session, SessionConfig, SessionError, SessionState,
    WebSocketSession,
};
use socketforge_transport::{
    HttpClient, HttpMethod, HttpRequest, TransportError, WebSocketConnection,
    WebSocketConnector,
};
use tokio::sync::mpsc;

const SERVER: &str = "http://localhost:3000";
const OPEN_V4: &str =
    r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
const OPEN_V3: &str = r#"0{"sid":"p1","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000}"#;

// =========================================================================
// Mock WebSocket
// =========================================================================

struct MockConnection {
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<ProtocolMessage>>,
    outgoing: mpsc::UnboundedSender<ProtocolMessage>,
    /// Sends block while the peer holds this.
    stall: Arc<tokio::sync::Mutex<()>>,
}

impl WebSocketConnection for MockConnection {
    async fn send(&self, message: ProtocolMessage) -> Result<(), TransportError> {
        let _open = self.stall.lock().await;
        self.outgoing
            .send(message)
            .map_err(|_| TransportError::ConnectionClosed("peer gone".into()))
    }

    async fn recv(&self) -> Result<Option<ProtocolMessage>, TransportError> {
        Ok(self.incoming.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// The server side of a [`MockConnection`].
struct Peer {
    to_client: Option<mpsc::UnboundedSender<ProtocolMessage>>,
    from_client: mpsc::UnboundedReceiver<ProtocolMessage>,
    stall: Arc<tokio::sync::Mutex<()>>,
}

impl Peer {
    fn push(&self, text: &str) {
        self.push_message(ProtocolMessage::Text(text.to_owned()));
    }

    fn push_message(&self, message: ProtocolMessage) {
        if let Some(tx) = &self.to_client {
            tx.send(message).unwrap();
        }
    }

    /// Closes the server side cleanly.
    fn hang_up(&mut self) {
        self.to_client = None;
    }

    async fn next(&mut self) -> ProtocolMessage {
        tokio::time::timeout(Duration::from_secs(2), self.from_client.recv())
            .await
            .expect("timed out waiting for client")
            .expect("client channel closed")
    }

    async fn next_text(&mut self) -> String {
        match self.next().await {
            ProtocolMessage::Text(text) => text,
            other => panic!("expected text, got {other:?}"),
        }
    }
}

fn ws_pair() -> (MockConnection, Peer) {
    let (to_client, incoming) = mpsc::unbounded_channel();
    let (outgoing, from_client) = mpsc::unbounded_channel();
    let stall = Arc::new(tokio::sync::Mutex::new(()));
    (
        MockConnection {
            incoming: tokio::sync::Mutex::new(incoming),
            outgoing,
            stall: Arc::clone(&stall),
        },
        Peer {
            to_client: Some(to_client),
            from_client,
            stall,
        },
    )
}

/// Hands out one prepared connection, after `failures` refused dials.
struct MockConnector {
    connection: Mutex<Option<MockConnection>>,
    failures: AtomicU32,
    dialed: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    fn new(connection: MockConnection) -> Self {
        Self {
            connection: Mutex::new(Some(connection)),
            failures: AtomicU32::new(0),
            dialed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing(self, failures: u32) -> Self {
        self.failures.store(failures, Ordering::SeqCst);
        self
    }
}

impl WebSocketConnector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, uri: &str) -> Result<MockConnection, TransportError> {
        self.dialed.lock().unwrap().push(uri.to_owned());
        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::ConnectFailed(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "refused",
            )));
        }
        self.connection.lock().unwrap().take().ok_or_else(|| {
            TransportError::ConnectFailed(io::Error::other("no connection left"))
        })
    }
}

type WsSession = Session<WebSocketSession<MockConnector>>;

fn ws_session(
    version: EngineIoVersion,
    config: SessionConfig,
) -> (WsSession, Peer, Arc<Mutex<Vec<String>>>) {
    let (connection, peer) = ws_pair();
    let connector = MockConnector::new(connection);
    let dialed = connector.dialed.clone();
    let session = Session::new(WebSocketSession::new(connector, version), config);
    (session, peer, dialed)
}

/// Runs a v4 default-namespace connect to completion.
async fn open_v4(session: &WsSession, peer: &mut Peer) {
    peer.push(OPEN_V4);
    let connecting = session.clone();
    let task = tokio::spawn(async move { connecting.connect(SERVER).await });

    assert_eq!(peer.next_text().await, "40");
    peer.push(r#"40{"sid":"abc"}"#);
    task.await.unwrap().unwrap();
}

fn disconnect_reasons(session: &WsSession) -> mpsc::UnboundedReceiver<DisconnectReason> {
    let (tx, rx) = mpsc::unbounded_channel();
    session.on_disconnected(move |reason: DisconnectReason| {
        let _ = tx.send(reason);
    });
    rx
}

async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed")
}

// =========================================================================
// Connect
// =========================================================================

#[tokio::test]
async fn test_connect_v4_websocket_opens_session() {
    let (session, mut peer, dialed) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let (tx, mut connected) = mpsc::unbounded_channel();
    session.on_connected(move || {
        let _ = tx.send(());
    });

    open_v4(&session, &mut peer).await;

    assert_eq!(session.state(), SessionState::Open);
    assert_eq!(session.sid().as_deref(), Some("s1"));
    let info = session.info();
    assert_eq!(info.socket_id.as_deref(), Some("abc"));
    assert_eq!(info.ping_interval, Duration::from_millis(25_000));
    assert_eq!(info.max_payload, Some(1_000_000));
    assert_eq!(
        *dialed.lock().unwrap(),
        vec!["ws://localhost:3000/socket.io/?EIO=4&transport=websocket".to_owned()]
    );
    recv_within(&mut connected).await;
}

#[tokio::test]
async fn test_connect_custom_namespace_sends_namespaced_connect() {
    let config = SessionConfig {
        namespace: Some("/admin".into()),
        ..SessionConfig::default()
    };
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, config);
    peer.push(OPEN_V4);
    let connecting = session.clone();
    let task = tokio::spawn(async move { connecting.connect(SERVER).await });

    assert_eq!(peer.next_text().await, "40/admin,");
    // An ack for another namespace doesn't count.
    peer.push(r#"40{"sid":"nope"}"#);
    peer.push(r#"40/admin,{"sid":"yes"}"#);
    task.await.unwrap().unwrap();

    assert_eq!(session.info().socket_id.as_deref(), Some("yes"));
}

#[tokio::test]
async fn test_connect_rejected_namespace_returns_message() {
    let config = SessionConfig {
        namespace: Some("/admin".into()),
        ..SessionConfig::default()
    };
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, config);
    let (tx, mut errors) = mpsc::unbounded_channel();
    session.on_error(move |message: &str| {
        let _ = tx.send(message.to_owned());
    });

    peer.push(OPEN_V4);
    let connecting = session.clone();
    let task = tokio::spawn(async move { connecting.connect(SERVER).await });
    assert_eq!(peer.next_text().await, "40/admin,");
    peer.push(r#"44/admin,{"message":"not authorized"}"#);

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::ConnectRejected(ref m) if m == "not authorized"));
    assert_eq!(recv_within(&mut errors).await, "not authorized");
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_connect_unsupported_scheme_never_dials() {
    let (session, _peer, dialed) = ws_session(EngineIoVersion::V4, SessionConfig::default());

    let err = session.connect("ftp://localhost:3000").await.unwrap_err();

    assert!(matches!(err, SessionError::UnsupportedScheme(ref s) if s == "ftp"));
    assert!(dialed.lock().unwrap().is_empty());
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_connect_retries_refused_dials() {
    let (connection, mut peer) = ws_pair();
    let connector = MockConnector::new(connection).failing(2);
    let dialed = connector.dialed.clone();
    let session = Session::new(
        WebSocketSession::new(connector, EngineIoVersion::V4),
        SessionConfig::default(),
    );

    open_v4(&session, &mut peer).await;

    assert_eq!(dialed.lock().unwrap().len(), 3);
    assert_eq!(session.state(), SessionState::Open);
}

#[tokio::test]
async fn test_connect_out_of_attempts_returns_last_error() {
    let (connection, _peer) = ws_pair();
    let connector = MockConnector::new(connection).failing(10);
    let dialed = connector.dialed.clone();
    let config = SessionConfig {
        connect_attempts: 2,
        ..SessionConfig::default()
    };
    let session = Session::new(WebSocketSession::new(connector, EngineIoVersion::V4), config);

    let err = session.connect(SERVER).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Transport(TransportError::ConnectFailed(_))
    ));
    assert_eq!(dialed.lock().unwrap().len(), 2);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_connect_twice_is_rejected() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    open_v4(&session, &mut peer).await;

    let err = session.connect(SERVER).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyConnected));
}

#[tokio::test(start_paused = true)]
async fn test_connect_silent_server_times_out() {
    let config = SessionConfig {
        connection_timeout_secs: 5,
        ..SessionConfig::default()
    };
    let (session, _peer, _) = ws_session(EngineIoVersion::V4, config);

    let err = session.connect(SERVER).await.unwrap_err();

    assert!(matches!(err, SessionError::Timeout));
    assert_eq!(session.state(), SessionState::Closed);
}

// =========================================================================
// Sending
// =========================================================================

#[tokio::test]
async fn test_emit_before_connect_is_not_connected() {
    let (session, _peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let err = session.emit("chat", vec!["hi".into()]).await.unwrap_err();
    assert!(matches!(err, SessionError::NotConnected));
}

#[tokio::test]
async fn test_emit_sends_event_packet() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    open_v4(&session, &mut peer).await;

    session.emit("chat", vec!["hi".into(), 3i64.into()]).await.unwrap();

    assert_eq!(peer.next_text().await, r#"42["chat","hi",3]"#);
}

#[tokio::test]
async fn test_send_empty_payload_is_rejected() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    open_v4(&session, &mut peer).await;

    let err = session.send(Vec::new()).await.unwrap_err();
    assert!(matches!(err, SessionError::EmptyPayload));
}

#[tokio::test]
async fn test_emit_binary_sends_header_then_attachment() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    open_v4(&session, &mut peer).await;

    session
        .emit("file", vec![Data::bytes(vec![1u8, 2, 3])])
        .await
        .unwrap();

    assert_eq!(
        peer.next_text().await,
        r#"451-["file",{"_placeholder":true,"num":0}]"#
    );
    assert_eq!(peer.next().await, ProtocolMessage::Bytes(vec![1, 2, 3]));
}

#[tokio::test]
async fn test_emit_binary_v3_frames_attachment_with_marker() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V3, SessionConfig::default());
    peer.push(OPEN_V3);
    peer.push("40");
    session.connect(SERVER).await.unwrap();

    session
        .emit("file", vec![Data::bytes(vec![7u8])])
        .await
        .unwrap();

    assert_eq!(
        peer.next_text().await,
        r#"451-["file",{"_placeholder":true,"num":0}]"#
    );
    assert_eq!(peer.next().await, ProtocolMessage::Bytes(vec![4, 7]));
}

#[tokio::test]
async fn test_emit_with_ack_runs_callback() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    open_v4(&session, &mut peer).await;

    let (tx, mut acked) = mpsc::unbounded_channel();
    let id = session
        .emit_with_ack("question", vec!["q".into()], move |args| {
            let _ = tx.send(args);
        })
        .await
        .unwrap();

    assert_eq!(id, 0);
    assert_eq!(peer.next_text().await, r#"420["question","q"]"#);
    peer.push(r#"430["answer"]"#);

    assert_eq!(recv_within(&mut acked).await, vec![Data::from("answer")]);
}

#[tokio::test]
async fn test_emit_with_ack_ids_increase() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    open_v4(&session, &mut peer).await;

    let first = session.emit_with_ack("a", Vec::new(), |_| {}).await.unwrap();
    let second = session.emit_with_ack("b", Vec::new(), |_| {}).await.unwrap();

    assert_eq!((first, second), (0, 1));
}

// =========================================================================
// Receiving
// =========================================================================

#[tokio::test]
async fn test_inbound_event_reaches_handler_and_acks() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let (tx, mut seen) = mpsc::unbounded_channel();
    session.on("ask", move |event| {
        let _ = tx.send(event.args.clone());
        if let Some(responder) = event.take_ack_responder() {
            responder.send(vec!["yes".into()]).unwrap();
        }
    });
    open_v4(&session, &mut peer).await;

    peer.push(r#"421["ask","q"]"#);

    assert_eq!(recv_within(&mut seen).await, vec![Data::from("q")]);
    assert_eq!(peer.next_text().await, r#"431["yes"]"#);
}

#[tokio::test]
async fn test_inbound_event_for_other_namespace_is_ignored() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let (tx, mut seen) = mpsc::unbounded_channel();
    session.on_any(move |event| {
        let _ = tx.send(event.name.clone());
    });
    open_v4(&session, &mut peer).await;

    peer.push(r#"42/chat,["hidden"]"#);
    peer.push(r#"42["visible"]"#);

    assert_eq!(recv_within(&mut seen).await, "visible");
}

#[tokio::test]
async fn test_inbound_binary_event_is_reassembled() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let (tx, mut seen) = mpsc::unbounded_channel();
    session.on("img", move |event| {
        let _ = tx.send(event.args.clone());
    });
    open_v4(&session, &mut peer).await;

    peer.push(r#"451-["img",{"_placeholder":true,"num":0},"cap"]"#);
    peer.push_message(ProtocolMessage::Bytes(vec![9, 9]));

    assert_eq!(
        recv_within(&mut seen).await,
        vec![Data::bytes(vec![9u8, 9]), Data::from("cap")]
    );
}

#[tokio::test]
async fn test_ping_is_answered_with_pong() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    open_v4(&session, &mut peer).await;

    peer.push("2");
    assert_eq!(peer.next_text().await, "3");

    peer.push("2probe");
    assert_eq!(peer.next_text().await, "3probe");
}

#[tokio::test]
async fn test_ping_during_stalled_send_keeps_receiving() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let (tx, mut seen) = mpsc::unbounded_channel();
    session.on_any(move |event| {
        let _ = tx.send(event.name.clone());
    });
    open_v4(&session, &mut peer).await;

    let stall = Arc::clone(&peer.stall);
    let held = stall.lock().await;
    peer.push("2");
    peer.push(r#"42["after"]"#);

    assert_eq!(recv_within(&mut seen).await, "after");
    drop(held);
    assert_eq!(peer.next_text().await, "3");
}

#[tokio::test]
async fn test_zero_attachment_binary_event_is_delivered_at_once() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let (tx, mut seen) = mpsc::unbounded_channel();
    session.on_any(move |event| {
        let _ = tx.send((event.name.clone(), event.args.clone()));
    });
    open_v4(&session, &mut peer).await;

    peer.push(r#"450-["zero","x"]"#);
    peer.push(r#"42["next"]"#);

    assert_eq!(
        recv_within(&mut seen).await,
        ("zero".to_owned(), vec![Data::from("x")])
    );
    assert_eq!(recv_within(&mut seen).await.0, "next");
    assert_eq!(session.state(), SessionState::Open);
}

#[tokio::test]
async fn test_malformed_packet_is_dropped() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let (tx, mut seen) = mpsc::unbounded_channel();
    session.on_any(move |event| {
        let _ = tx.send(event.name.clone());
    });
    open_v4(&session, &mut peer).await;

    peer.push("42[not json");
    peer.push("9zzz");
    peer.push(r#"42["after"]"#);

    assert_eq!(recv_within(&mut seen).await, "after");
    assert_eq!(session.state(), SessionState::Open);
}

// =========================================================================
// Disconnect
// =========================================================================

#[tokio::test]
async fn test_client_disconnect_sends_packet_and_reports_reason() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let mut reasons = disconnect_reasons(&session);
    open_v4(&session, &mut peer).await;

    session.disconnect().await.unwrap();

    assert_eq!(peer.next_text().await, "41");
    assert_eq!(recv_within(&mut reasons).await, DisconnectReason::IoClientDisconnect);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(
        session.disconnect().await,
        Err(SessionError::NotConnected)
    ));
}

#[tokio::test]
async fn test_server_disconnect_reports_reason() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let mut reasons = disconnect_reasons(&session);
    open_v4(&session, &mut peer).await;

    peer.push("41");

    assert_eq!(recv_within(&mut reasons).await, DisconnectReason::IoServerDisconnect);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_transport_close_reports_reason() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let mut reasons = disconnect_reasons(&session);
    open_v4(&session, &mut peer).await;

    peer.hang_up();

    assert_eq!(recv_within(&mut reasons).await, DisconnectReason::TransportClose);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_text_during_attachments_fails_session() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let mut reasons = disconnect_reasons(&session);
    let (tx, mut errors) = mpsc::unbounded_channel();
    session.on_error(move |message: &str| {
        let _ = tx.send(message.to_owned());
    });
    open_v4(&session, &mut peer).await;

    peer.push(r#"451-["img",{"_placeholder":true,"num":0}]"#);
    peer.push(r#"42["too early"]"#);

    assert_eq!(recv_within(&mut reasons).await, DisconnectReason::TransportError);
    assert!(recv_within(&mut errors).await.contains("attachment mismatch"));
}

#[tokio::test]
async fn test_oversized_attachment_count_fails_session() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let mut reasons = disconnect_reasons(&session);
    let (tx, mut errors) = mpsc::unbounded_channel();
    session.on_error(move |message: &str| {
        let _ = tx.send(message.to_owned());
    });
    open_v4(&session, &mut peer).await;

    peer.push(r#"451000000000000000000-["e",{"_placeholder":true,"num":0}]"#);

    assert_eq!(recv_within(&mut reasons).await, DisconnectReason::TransportError);
    assert!(recv_within(&mut errors).await.contains("exceeds limit"));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_stray_attachment_fails_session() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let mut reasons = disconnect_reasons(&session);
    open_v4(&session, &mut peer).await;

    peer.push_message(ProtocolMessage::Bytes(vec![1]));

    assert_eq!(recv_within(&mut reasons).await, DisconnectReason::TransportError);
}

#[tokio::test]
async fn test_reconnect_after_close_is_allowed() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let mut reasons = disconnect_reasons(&session);
    open_v4(&session, &mut peer).await;
    peer.push("41");
    recv_within(&mut reasons).await;

    // The connector is spent, so the dial fails, but the state allows it.
    let err = session.connect(SERVER).await.unwrap_err();
    assert!(matches!(err, SessionError::Transport(_)));
}

// =========================================================================
// Resume
// =========================================================================

#[tokio::test]
async fn test_resume_websocket_sends_upgrade_and_opens() {
    let (session, mut peer, dialed) = ws_session(EngineIoVersion::V4, SessionConfig::default());

    session.resume(SERVER, "abc").await.unwrap();

    assert_eq!(peer.next_text().await, "5");
    assert_eq!(session.state(), SessionState::Open);
    assert_eq!(session.sid().as_deref(), Some("abc"));
    assert_eq!(
        *dialed.lock().unwrap(),
        vec!["ws://localhost:3000/socket.io/?EIO=4&transport=websocket&sid=abc".to_owned()]
    );

    session.emit("hi", Vec::new()).await.unwrap();
    assert_eq!(peer.next_text().await, r#"42["hi"]"#);
}

#[tokio::test]
async fn test_resume_twice_is_rejected() {
    let (session, _peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    session.resume(SERVER, "abc").await.unwrap();

    let err = session.resume(SERVER, "abc").await.unwrap_err();

    assert!(matches!(err, SessionError::AlreadyConnected));
}

// =========================================================================
// Keepalive
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_v4_missing_server_ping_times_out() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V4, SessionConfig::default());
    let mut reasons = disconnect_reasons(&session);
    peer.push(r#"0{"sid":"s1","upgrades":[],"pingInterval":100,"pingTimeout":50}"#);
    let connecting = session.clone();
    let task = tokio::spawn(async move { connecting.connect(SERVER).await });
    assert_eq!(peer.next_text().await, "40");
    peer.push("40");
    task.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;
    peer.push("2");
    assert_eq!(peer.next_text().await, "3");
    assert_eq!(session.state(), SessionState::Open);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(recv_within(&mut reasons).await, DisconnectReason::PingTimeout);
}

#[tokio::test(start_paused = true)]
async fn test_v3_pong_before_ping_does_not_answer_it() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V3, SessionConfig::default());
    let mut reasons = disconnect_reasons(&session);
    peer.push(r#"0{"sid":"p1","upgrades":[],"pingInterval":100,"pingTimeout":50}"#);
    peer.push("40");
    session.connect(SERVER).await.unwrap();
    let connected_at = tokio::time::Instant::now();

    tokio::time::sleep(Duration::from_millis(50)).await;
    peer.push("3");
    assert_eq!(peer.next_text().await, "2");

    assert_eq!(recv_within(&mut reasons).await, DisconnectReason::PingTimeout);
    assert!(connected_at.elapsed() < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_v3_answered_ping_keeps_session_open() {
    let (session, mut peer, _) = ws_session(EngineIoVersion::V3, SessionConfig::default());
    peer.push(r#"0{"sid":"p1","upgrades":[],"pingInterval":100,"pingTimeout":50}"#);
    peer.push("40");
    session.connect(SERVER).await.unwrap();

    assert_eq!(peer.next_text().await, "2");
    peer.push("3");
    assert_eq!(peer.next_text().await, "2");

    assert_eq!(session.state(), SessionState::Open);
}

// =========================================================================
// Polling
// =========================================================================

/// Serves queued GET bodies and accepts every POST.
struct MockHttp {
    responses: tokio::sync::Mutex<mpsc::UnboundedReceiver<ProtocolMessage>>,
    requests: mpsc::UnboundedSender<HttpRequest>,
}

impl HttpClient for MockHttp {
    async fn request(&self, request: HttpRequest) -> Result<ProtocolMessage, TransportError> {
        let method = request.method;
        let _ = self.requests.send(request);
        match method {
            HttpMethod::Post => Ok(ProtocolMessage::Text("ok".into())),
            HttpMethod::Get => self
                .responses
                .lock()
                .await
                .recv()
                .await
                .ok_or_else(|| TransportError::ConnectionClosed("no more responses".into())),
        }
    }
}

struct HttpPeer {
    responses: mpsc::UnboundedSender<ProtocolMessage>,
    requests: mpsc::UnboundedReceiver<HttpRequest>,
}

impl HttpPeer {
    fn respond_bytes(&self, messages: &[ProtocolMessage]) {
        let body = EngineIoVersion::V3.payload_codec().encode_bytes(messages);
        self.responses.send(ProtocolMessage::Bytes(body)).unwrap();
    }

    fn respond(&self, version: EngineIoVersion, packets: &[&str]) {
        let messages: Vec<ProtocolMessage> = packets.iter().map(|p| (*p).into()).collect();
        let body = version.payload_codec().encode(&messages);
        self.responses.send(ProtocolMessage::Text(body)).unwrap();
    }

    async fn next_request(&mut self) -> HttpRequest {
        tokio::time::timeout(Duration::from_secs(2), self.requests.recv())
            .await
            .expect("timed out waiting for request")
            .expect("request channel closed")
    }

    async fn next_post(&mut self) -> HttpRequest {
        loop {
            let request = self.next_request().await;
            if request.method == HttpMethod::Post {
                return request;
            }
        }
    }
}

fn polling_session(version: EngineIoVersion) -> (Session<PollingSession<MockHttp>>, HttpPeer) {
    let (responses, rx) = mpsc::unbounded_channel();
    let (tx, requests) = mpsc::unbounded_channel();
    let http = MockHttp {
        responses: tokio::sync::Mutex::new(rx),
        requests: tx,
    };
    let config = SessionConfig {
        engine_io: version,
        ..SessionConfig::default()
    };
    (
        Session::new(PollingSession::new(http, version), config),
        HttpPeer {
            responses,
            requests,
        },
    )
}

#[tokio::test]
async fn test_polling_v3_handshake_appends_sid() {
    let (session, mut peer) = polling_session(EngineIoVersion::V3);
    peer.respond(EngineIoVersion::V3, &[OPEN_V3, "40"]);

    session.connect(SERVER).await.unwrap();

    let handshake = peer.next_request().await;
    assert!(handshake.connect_probe);
    assert_eq!(handshake.method, HttpMethod::Get);
    assert_eq!(
        handshake.uri,
        "http://localhost:3000/socket.io/?EIO=3&transport=polling"
    );

    let poll = peer.next_request().await;
    assert!(!poll.connect_probe);
    assert_eq!(
        poll.uri,
        "http://localhost:3000/socket.io/?EIO=3&transport=polling&sid=p1"
    );
    assert_eq!(session.info().upgrades, vec!["websocket".to_owned()]);
}

#[tokio::test]
async fn test_polling_v3_binary_emit_posts_text_then_binary_body() {
    let (session, mut peer) = polling_session(EngineIoVersion::V3);
    peer.respond(EngineIoVersion::V3, &[OPEN_V3, "40"]);
    session.connect(SERVER).await.unwrap();

    session
        .emit("file", vec![Data::bytes(vec![1u8, 2])])
        .await
        .unwrap();

    let text = peer.next_post().await;
    let header = r#"451-["file",{"_placeholder":true,"num":0}]"#;
    assert_eq!(
        text.body,
        Some(ProtocolMessage::Text(format!("{}:{header}", header.len())))
    );
    let binary = peer.next_post().await;
    assert_eq!(
        binary.body,
        Some(ProtocolMessage::Bytes(vec![1, 3, 0xff, 4, 1, 2]))
    );
}

#[tokio::test]
async fn test_polling_v4_sends_connect_and_inlines_binary() {
    let (session, mut peer) = polling_session(EngineIoVersion::V4);
    peer.respond(EngineIoVersion::V4, &[OPEN_V4]);
    let connecting = session.clone();
    let task = tokio::spawn(async move { connecting.connect(SERVER).await });

    let connect = peer.next_post().await;
    assert_eq!(connect.body, Some(ProtocolMessage::Text("40".into())));
    assert!(connect.uri.ends_with("&sid=s1"));
    peer.respond(EngineIoVersion::V4, &[r#"40{"sid":"abc"}"#]);
    task.await.unwrap().unwrap();

    session
        .emit("file", vec![Data::bytes(vec![1u8, 2, 3])])
        .await
        .unwrap();
    let post = peer.next_post().await;
    assert_eq!(
        post.body,
        Some(ProtocolMessage::Text(
            "451-[\"file\",{\"_placeholder\":true,\"num\":0}]\u{1e}bAQID".into()
        ))
    );
}

#[tokio::test(start_paused = true)]
async fn test_polling_v3_unanswered_ping_times_out() {
    let (session, mut peer) = polling_session(EngineIoVersion::V3);
    let (tx, mut reasons) = mpsc::unbounded_channel();
    session.on_disconnected(move |reason: DisconnectReason| {
        let _ = tx.send(reason);
    });
    peer.respond(
        EngineIoVersion::V3,
        &[r#"0{"sid":"p1","upgrades":[],"pingInterval":100,"pingTimeout":50}"#, "40"],
    );
    session.connect(SERVER).await.unwrap();

    let ping = peer.next_post().await;
    assert_eq!(ping.body, Some(ProtocolMessage::Text("1:2".into())));

    assert_eq!(recv_within(&mut reasons).await, DisconnectReason::PingTimeout);
}

#[tokio::test]
async fn test_polling_v3_binary_body_event_is_reassembled() {
    let (session, mut peer) = polling_session(EngineIoVersion::V3);
    let (tx, mut seen) = mpsc::unbounded_channel();
    session.on("img", move |event| {
        let _ = tx.send(event.args.clone());
    });
    peer.respond(EngineIoVersion::V3, &[OPEN_V3, "40"]);
    session.connect(SERVER).await.unwrap();

    peer.respond_bytes(&[
        ProtocolMessage::Text(r#"451-["img",{"_placeholder":true,"num":0}]"#.into()),
        ProtocolMessage::Bytes(vec![5, 6]),
    ]);

    assert_eq!(recv_within(&mut seen).await, vec![Data::bytes(vec![5u8, 6])]);
}

#[tokio::test]
async fn test_polling_v3_base64_attachment_is_reassembled() {
    let (session, mut peer) = polling_session(EngineIoVersion::V3);
    let (tx, mut seen) = mpsc::unbounded_channel();
    session.on("img", move |event| {
        let _ = tx.send(event.args.clone());
    });
    peer.respond(EngineIoVersion::V3, &[OPEN_V3, "40"]);
    session.connect(SERVER).await.unwrap();

    peer.respond(
        EngineIoVersion::V3,
        &[r#"451-["img",{"_placeholder":true,"num":0}]"#, "b4BQY="],
    );

    assert_eq!(recv_within(&mut seen).await, vec![Data::bytes(vec![5u8, 6])]);
}

#[tokio::test]
async fn test_polling_resume_keeps_single_sid() {
    let (session, mut peer) = polling_session(EngineIoVersion::V4);
    let (tx, mut seen) = mpsc::unbounded_channel();
    session.on_any(move |event| {
        let _ = tx.send(event.name.clone());
    });
    peer.respond(EngineIoVersion::V4, &[r#"42["queued"]"#]);

    session.resume(SERVER, "abc").await.unwrap();

    let resumed = "http://localhost:3000/socket.io/?EIO=4&transport=polling&sid=abc";
    let first = peer.next_request().await;
    assert!(!first.connect_probe);
    assert_eq!(first.uri, resumed);
    let poll = peer.next_request().await;
    assert_eq!(poll.uri, resumed);
    assert_eq!(recv_within(&mut seen).await, "queued");

    session.emit("hi", Vec::new()).await.unwrap();
    assert_eq!(peer.next_post().await.uri, resumed);
    assert_eq!(session.sid().as_deref(), Some("abc"));
}
