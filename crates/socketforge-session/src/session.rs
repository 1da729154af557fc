//! The session driver: one Socket.IO connection over any transport.
//!
//! [`Session`] owns the state machine and everything that is the same for
//! both carriers: the handshake, keepalive, namespace connect, packet
//! dispatch, attachment reassembly, acknowledgements and observers. It
//! reaches the wire only through [`TransportSession`].
//!
//! Two background tasks run while a session is connected:
//!
//! - the **receive loop**, which pulls batches from the transport and
//!   dispatches them in order;
//! - the **keepalive loop**, which enforces the ping deadline.
//!
//! Both stop when the session's cancellation token fires.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use socketforge_protocol::{
    AckMessage, BinaryPacket, Data, EngineIoVersion, EventMessage, OpenedMessage,
    PING_PACKET, PONG_PACKET, Packet, ProtocolError, ProtocolMessage, Serializer,
};
use socketforge_retry::RetryPolicy;
use socketforge_transport::TransportError;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::observer::{AckCallback, AckResponder, Event, Observers, Outbound};
use crate::uri::build_uri;
use crate::{
    DisconnectReason, SessionConfig, SessionError, SessionInfo, SessionState,
    TransportSession,
};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A client session over transport `T`.
///
/// Cloning is cheap; every clone drives the same connection.
pub struct Session<T: TransportSession> {
    inner: Arc<Inner<T>>,
}

impl<T: TransportSession> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: TransportSession> Session<T> {
    /// Creates an idle session. Nothing touches the network until
    /// [`connect`](Self::connect).
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let serializer = Serializer::new(config.namespace.clone());
        let info = SessionInfo::new(
            transport.kind(),
            transport.version(),
            serializer.namespace().map(str::to_owned),
        );
        let (state, _) = watch::channel(SessionState::Idle);

        let inner = Arc::new_cyclic(|me| Inner {
            me: me.clone(),
            transport,
            config,
            serializer,
            state,
            info: Mutex::new(info),
            observers: Observers::default(),
            acks: Mutex::new(HashMap::new()),
            next_packet_id: AtomicU64::new(0),
            send_lock: tokio::sync::Mutex::new(()),
            cancel: Mutex::new(CancellationToken::new()),
            heartbeat: watch::channel(0).0,
            pending_binary: Mutex::new(None),
            waiters: Mutex::new(Waiters::default()),
        });
        Self { inner }
    }

    // -- Lifecycle --------------------------------------------------------

    /// Connects to `server_uri` and joins the configured namespace.
    ///
    /// Returns once the server acknowledged the namespace.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyConnected`] unless the session is idle or
    ///   closed
    /// - [`SessionError::UnsupportedScheme`] / [`SessionError::InvalidUri`]
    ///   for a bad URI (never retried)
    /// - the last transport error once `connect_attempts` are used up
    /// - [`SessionError::ConnectRejected`] if the namespace refused us
    /// - [`SessionError::Timeout`] if the server went quiet
    pub async fn connect(&self, server_uri: &str) -> Result<(), SessionError> {
        self.start(server_uri, None).await
    }

    /// Re-attaches to the Engine.IO session `sid` on a new transport.
    ///
    /// No handshake is expected: the session counts as open as soon as the
    /// transport is, using the timings from the previous handshake.
    pub async fn resume(&self, server_uri: &str, sid: &str) -> Result<(), SessionError> {
        self.start(server_uri, Some(sid.to_owned())).await
    }

    async fn start(
        &self,
        server_uri: &str,
        resume_sid: Option<String>,
    ) -> Result<(), SessionError> {
        let claimed = self.inner.state.send_if_modified(|state| {
            if state.can_connect() {
                *state = SessionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(SessionError::AlreadyConnected);
        }

        match self.inner.open(server_uri, resume_sid).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "connect failed");
                self.inner.finish(None).await;
                Err(e)
            }
        }
    }

    /// Leaves the namespace and closes the transport.
    ///
    /// # Errors
    /// [`SessionError::NotConnected`] unless the session is open.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let closing = self.inner.state.send_if_modified(|state| {
            if *state == SessionState::Open {
                *state = SessionState::Closing;
                true
            } else {
                false
            }
        });
        if !closing {
            return Err(SessionError::NotConnected);
        }

        let packet = self.inner.serializer.disconnect_packet();
        if let Err(e) = self.inner.send_raw(vec![packet.into()]).await {
            debug!(error = %e, "disconnect packet not delivered");
        }
        self.inner.finish(Some(DisconnectReason::IoClientDisconnect)).await;
        Ok(())
    }

    // -- Sending ----------------------------------------------------------

    /// Sends `data` as one event packet: `["name", args...]`.
    pub async fn send(&self, data: Vec<Data>) -> Result<(), SessionError> {
        self.ensure_open()?;
        if data.is_empty() {
            return Err(SessionError::EmptyPayload);
        }
        let messages = self.inner.serializer.serialize(data)?;
        self.inner.send_raw(messages).await
    }

    /// Sends `data` as an event carrying `packet_id`.
    pub async fn send_with_id(
        &self,
        data: Vec<Data>,
        packet_id: u64,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        if data.is_empty() {
            return Err(SessionError::EmptyPayload);
        }
        let messages = self.inner.serializer.serialize_with_id(data, packet_id)?;
        self.inner.send_raw(messages).await
    }

    /// Emits `event` with `args`.
    pub async fn emit(&self, event: &str, args: Vec<Data>) -> Result<(), SessionError> {
        self.send(event_data(event, args)).await
    }

    /// Emits `event` and runs `callback` with the server's ack arguments.
    ///
    /// Returns the packet id the ack will carry.
    pub async fn emit_with_ack<F>(
        &self,
        event: &str,
        args: Vec<Data>,
        callback: F,
    ) -> Result<u64, SessionError>
    where
        F: FnOnce(Vec<Data>) + Send + 'static,
    {
        self.ensure_open()?;
        let packet_id = self.inner.next_packet_id.fetch_add(1, Ordering::Relaxed);
        let messages = self
            .inner
            .serializer
            .serialize_with_id(event_data(event, args), packet_id)?;

        self.inner.acks().insert(packet_id, Box::new(callback));
        if let Err(e) = self.inner.send_raw(messages).await {
            self.inner.acks().remove(&packet_id);
            return Err(e);
        }
        Ok(packet_id)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.state() == SessionState::Open {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    // -- Observers --------------------------------------------------------

    /// Runs `handler` for every inbound `event`.
    pub fn on<F>(&self, event: &str, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.observers.on(event, Arc::new(handler));
    }

    /// Runs `handler` for every inbound event, after the named handlers.
    pub fn on_any<F>(&self, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.observers.on_any(Arc::new(handler));
    }

    /// Runs `handler` each time the namespace connection is acknowledged.
    pub fn on_connected<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.observers.on_connected(Arc::new(handler));
    }

    /// Runs `handler` when an open session closes.
    pub fn on_disconnected<F>(&self, handler: F)
    where
        F: Fn(DisconnectReason) + Send + Sync + 'static,
    {
        self.inner.observers.on_disconnected(Arc::new(handler));
    }

    /// Runs `handler` for connect rejections, transport failures and
    /// protocol violations.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.observers.on_error(Arc::new(handler));
    }

    // -- Queries ----------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// A receiver that sees every state transition.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// A snapshot of the connection facts.
    pub fn info(&self) -> SessionInfo {
        self.inner.info().clone()
    }

    /// The Engine.IO session id, once the handshake completed.
    pub fn sid(&self) -> Option<String> {
        self.inner.info().sid.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }
}

fn event_data(event: &str, args: Vec<Data>) -> Vec<Data> {
    let mut data = Vec::with_capacity(args.len() + 1);
    data.push(Data::from(event));
    data.extend(args);
    data
}

// ---------------------------------------------------------------------------
// Inner state
// ---------------------------------------------------------------------------

/// Senders completed by the receive loop while `connect` waits.
#[derive(Default)]
struct Waiters {
    opened: Option<oneshot::Sender<()>>,
    connected: Option<oneshot::Sender<Result<(), String>>>,
}

/// A binary packet waiting for its attachments.
enum PendingBinary {
    Event(BinaryPacket),
    Ack(BinaryPacket),
}

impl PendingBinary {
    fn packet(&self) -> &BinaryPacket {
        match self {
            Self::Event(packet) | Self::Ack(packet) => packet,
        }
    }

    fn packet_mut(&mut self) -> &mut BinaryPacket {
        match self {
            Self::Event(packet) | Self::Ack(packet) => packet,
        }
    }
}

struct Inner<T> {
    me: Weak<Inner<T>>,
    transport: T,
    config: SessionConfig,
    serializer: Serializer,
    state: watch::Sender<SessionState>,
    info: Mutex<SessionInfo>,
    observers: Observers,
    acks: Mutex<HashMap<u64, AckCallback>>,
    next_packet_id: AtomicU64,
    /// One send in flight per transport.
    send_lock: tokio::sync::Mutex<()>,
    /// Replaced on every connect; fired on close.
    cancel: Mutex<CancellationToken>,
    /// Bumped by every heartbeat the keepalive loop waits for: server
    /// pings on v4, pongs on v3.
    heartbeat: watch::Sender<u64>,
    pending_binary: Mutex<Option<PendingBinary>>,
    waiters: Mutex<Waiters>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: TransportSession> Inner<T> {
    fn info(&self) -> MutexGuard<'_, SessionInfo> {
        lock(&self.info)
    }

    fn acks(&self) -> MutexGuard<'_, HashMap<u64, AckCallback>> {
        lock(&self.acks)
    }

    fn cancel_token(&self) -> CancellationToken {
        lock(&self.cancel).clone()
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn retry_policy(&self, attempts: u32) -> Result<RetryPolicy, SessionError> {
        Ok(RetryPolicy::new(attempts)?.with_delay_unit(self.config.retry_delay_unit()))
    }

    // -- Connect ----------------------------------------------------------

    async fn open(
        self: &Arc<Self>,
        server_uri: &str,
        resume_sid: Option<String>,
    ) -> Result<(), SessionError> {
        let mut queries = self.config.query.clone();
        queries.extend(self.transport.protocol_queries(resume_sid.as_deref()));
        let uri = build_uri(
            server_uri,
            |secure| self.transport.server_uri_scheme(secure),
            &self.config.path,
            &queries,
        )?;

        let cancel = CancellationToken::new();
        *lock(&self.cancel) = cancel.clone();
        *lock(&self.pending_binary) = None;
        if resume_sid.is_none() {
            *self.info() = SessionInfo::new(
                self.transport.kind(),
                self.transport.version(),
                self.serializer.namespace().map(str::to_owned),
            );
        }

        let (opened_tx, opened_rx) = oneshot::channel();
        let (connected_tx, connected_rx) = oneshot::channel();
        *lock(&self.waiters) = Waiters {
            opened: Some(opened_tx),
            connected: Some(connected_tx),
        };

        info!(%uri, transport = %self.transport.kind(), "connecting");
        let transport = &self.transport;
        let sid_for_transport = resume_sid.clone();
        let initial = self
            .retry_policy(self.config.connect_attempts)?
            .run(&cancel, move || {
                let uri = uri.clone();
                let sid = sid_for_transport.clone();
                async move {
                    transport
                        .connect_core(uri, sid)
                        .await
                        .map_err(SessionError::from)
                }
            })
            .await?;

        for message in initial {
            self.handle_message(message).await?;
        }
        tokio::spawn(Arc::clone(self).receive_loop(cancel.clone()));

        let timeout = self.config.connection_timeout();
        if let Some(sid) = resume_sid {
            self.mark_resumed(&sid);
            tokio::spawn(Arc::clone(self).keepalive_loop(cancel));
            return Ok(());
        }

        match tokio::time::timeout(timeout, opened_rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(closed_while_connecting()),
            Err(_) => return Err(SessionError::Timeout),
        }
        tokio::spawn(Arc::clone(self).keepalive_loop(cancel));

        // v3 servers put every client in the default namespace unasked.
        let joins_unasked = self.transport.version() == EngineIoVersion::V3
            && self.serializer.namespace().is_none();
        if !joins_unasked {
            let packet = self.serializer.connect_packet();
            self.send_raw(vec![packet.into()]).await?;
        }

        match tokio::time::timeout(timeout, connected_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(message))) => Err(SessionError::ConnectRejected(message)),
            Ok(Err(_)) => Err(closed_while_connecting()),
            Err(_) => Err(SessionError::Timeout),
        }
    }

    fn mark_resumed(&self, sid: &str) {
        self.info().sid = Some(sid.to_owned());
        self.transport.on_opened(sid);
        self.set_open();
        info!(sid, transport = %self.transport.kind(), "session resumed");
    }

    fn set_open(&self) {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Connecting {
                *state = SessionState::Open;
                true
            } else {
                false
            }
        });
    }

    // -- Sending ----------------------------------------------------------

    /// Sends `messages` under the send lock, retrying per `send_attempts`.
    async fn send_raw(&self, messages: Vec<ProtocolMessage>) -> Result<(), SessionError> {
        if messages.is_empty() {
            return Err(SessionError::EmptyPayload);
        }
        let policy = self.retry_policy(self.config.send_attempts)?;
        let cancel = self.cancel_token();
        let transport = &self.transport;

        let _guard = self.send_lock.lock().await;
        trace!(count = messages.len(), "sending");
        policy
            .run(&cancel, move || {
                let messages = messages.clone();
                async move { transport.send(messages).await.map_err(SessionError::from) }
            })
            .await
    }

    /// A handle that lets ack responders send through this session.
    fn outbound(&self) -> Outbound {
        let me = self.me.clone();
        Arc::new(move |messages: Vec<ProtocolMessage>| {
            let Some(inner) = me.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                if let Err(e) = inner.send_raw(messages).await {
                    debug!(error = %e, "outbound send failed");
                }
            });
        })
    }

    // -- Receiving --------------------------------------------------------

    async fn receive_loop(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let received = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                received = self.transport.receive() => received,
            };

            match received {
                Ok(Some(messages)) => {
                    for message in messages {
                        if let Err(e) = self.handle_message(message).await {
                            warn!(error = %e, "protocol violation, closing session");
                            self.observers.notify_error(e.to_string());
                            self.finish(Some(DisconnectReason::TransportError)).await;
                            return;
                        }
                    }
                }
                Ok(None) => {
                    info!("transport closed by peer");
                    self.finish(Some(DisconnectReason::TransportClose)).await;
                    return;
                }
                Err(e) => {
                    if cancel.is_cancelled() {
                        return;
                    }
                    warn!(error = %e, "transport failed");
                    self.observers.notify_error(e.to_string());
                    self.finish(Some(DisconnectReason::TransportError)).await;
                    return;
                }
            }
        }
    }

    /// Feeds one inbound message through attachment reassembly and
    /// dispatch.
    ///
    /// # Errors
    /// [`ProtocolError::AttachmentMismatch`] when text arrives while
    /// attachments are outstanding, or bytes arrive when none are.
    /// [`ProtocolError::TooManyAttachments`] for an implausible attachment
    /// count.
    async fn handle_message(&self, message: ProtocolMessage) -> Result<(), ProtocolError> {
        match message {
            ProtocolMessage::Text(text) => {
                let outstanding = lock(&self.pending_binary)
                    .as_ref()
                    .map(|pending| (pending.packet().attachment_count, pending.packet().received()));
                if let Some((expected, received)) = outstanding {
                    return Err(ProtocolError::AttachmentMismatch { expected, received });
                }

                let Some(packet) = Packet::deserialize(&text, self.transport.version())? else {
                    return Ok(());
                };
                trace!(message_type = %packet.message_type(), "packet received");
                self.dispatch(packet).await
            }
            ProtocolMessage::Bytes(bytes) => {
                let completed = {
                    let mut pending = lock(&self.pending_binary);
                    let Some(current) = pending.as_mut() else {
                        return Err(ProtocolError::AttachmentMismatch {
                            expected: 0,
                            received: 1,
                        });
                    };
                    current.packet_mut().push_attachment(bytes)?;
                    if current.packet().is_complete() {
                        pending.take()
                    } else {
                        None
                    }
                };
                match completed {
                    Some(packet) => self.deliver_binary(packet),
                    None => Ok(()),
                }
            }
        }
    }

    async fn dispatch(&self, packet: Packet) -> Result<(), ProtocolError> {
        match packet {
            Packet::Opened(opened) => self.on_opened(opened),
            Packet::Ping(payload) => {
                if !self.transport.version().client_sends_pings() {
                    self.beat();
                    // Spawned, so a slow send never stalls the receive loop.
                    (self.outbound())(vec![format!("{PONG_PACKET}{payload}").into()]);
                }
            }
            Packet::Pong(_) => {
                if self.transport.version().client_sends_pings() {
                    self.beat();
                }
            }
            Packet::Connected(connected) => {
                if self.is_own_namespace(connected.namespace.as_deref()) {
                    self.info().socket_id = connected.sid;
                    if let Some(waiter) = lock(&self.waiters).connected.take() {
                        let _ = waiter.send(Ok(()));
                    }
                    info!(namespace = ?self.serializer.namespace(), "namespace connected");
                    self.observers.notify_connected();
                }
            }
            Packet::Disconnected { namespace } => {
                if self.is_own_namespace(namespace.as_deref()) {
                    info!("server closed the namespace");
                    self.finish(Some(DisconnectReason::IoServerDisconnect)).await;
                }
            }
            Packet::ConnectError(error) => {
                if self.is_own_namespace(error.namespace.as_deref()) {
                    warn!(reason = %error.message, "namespace connect rejected");
                    if let Some(waiter) = lock(&self.waiters).connected.take() {
                        let _ = waiter.send(Err(error.message.clone()));
                    }
                    self.observers.notify_error(error.message);
                }
            }
            Packet::Event(event) => self.deliver_event(event),
            Packet::Ack(ack) => self.deliver_ack(ack),
            Packet::BinaryEvent(packet) => self.await_attachments(PendingBinary::Event(packet))?,
            Packet::BinaryAck(packet) => self.await_attachments(PendingBinary::Ack(packet))?,
        }
        Ok(())
    }

    fn on_opened(&self, opened: OpenedMessage) {
        {
            let mut info = self.info();
            info.sid = Some(opened.sid.clone());
            info.ping_interval = opened.ping_interval;
            info.ping_timeout = opened.ping_timeout;
            info.upgrades = opened.upgrades;
            info.max_payload = opened.max_payload;
        }
        self.transport.on_opened(&opened.sid);
        self.set_open();
        info!(sid = %opened.sid, transport = %self.transport.kind(), "session open");

        if let Some(waiter) = lock(&self.waiters).opened.take() {
            let _ = waiter.send(());
        }
    }

    /// Binary packets are buffered whatever their namespace, so their
    /// attachments never reach the dispatcher as stray bytes.
    fn await_attachments(&self, pending: PendingBinary) -> Result<(), ProtocolError> {
        if pending.packet().is_complete() {
            return self.deliver_binary(pending);
        }
        *lock(&self.pending_binary) = Some(pending);
        Ok(())
    }

    fn deliver_binary(&self, pending: PendingBinary) -> Result<(), ProtocolError> {
        match pending {
            PendingBinary::Event(packet) => self.deliver_event(packet.into_event()?),
            PendingBinary::Ack(packet) => self.deliver_ack(packet.into_ack()?),
        }
        Ok(())
    }

    fn deliver_event(&self, event: EventMessage) {
        if !self.is_own_namespace(event.namespace.as_deref()) {
            debug!(namespace = ?event.namespace, "event for another namespace dropped");
            return;
        }
        let responder = event
            .id
            .map(|id| AckResponder::new(id, self.serializer.clone(), self.outbound()));
        self.observers
            .notify_event(Event::new(event.event, event.args, event.namespace, responder));
    }

    fn deliver_ack(&self, ack: AckMessage) {
        if !self.is_own_namespace(ack.namespace.as_deref()) {
            return;
        }
        let Some(callback) = self.acks().remove(&ack.id) else {
            debug!(id = ack.id, "ack for unknown packet id");
            return;
        };
        tokio::spawn(async move { callback(ack.args) });
    }

    fn is_own_namespace(&self, namespace: Option<&str>) -> bool {
        let namespace = namespace.filter(|ns| !ns.is_empty() && *ns != "/");
        namespace == self.serializer.namespace()
    }

    // -- Keepalive --------------------------------------------------------

    fn beat(&self) {
        self.heartbeat.send_modify(|seen| *seen = seen.wrapping_add(1));
    }

    async fn keepalive_loop(self: Arc<Self>, cancel: CancellationToken) {
        let (interval, timeout) = {
            let info = self.info();
            (info.ping_interval, info.ping_timeout)
        };
        if interval.is_zero() {
            debug!("no ping interval, keepalive disabled");
            return;
        }

        if self.transport.version().client_sends_pings() {
            self.client_ping_loop(&cancel, interval, timeout).await;
        } else {
            self.server_ping_watch(&cancel, interval + timeout).await;
        }
    }

    /// v3: ping every `interval`, expect a pong within `timeout`.
    async fn client_ping_loop(
        &self,
        cancel: &CancellationToken,
        interval: Duration,
        timeout: Duration,
    ) {
        let mut pongs = self.heartbeat.subscribe();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(interval) => {}
            }
            // Only a pong that arrives after this ping counts.
            let _ = pongs.borrow_and_update();
            if let Err(e) = self.send_raw(vec![PING_PACKET.into()]).await {
                debug!(error = %e, "ping not delivered");
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                pong = tokio::time::timeout(timeout, pongs.changed()) => {
                    if pong.is_err() {
                        warn!(?timeout, "no pong from server");
                        self.finish(Some(DisconnectReason::PingTimeout)).await;
                        return;
                    }
                }
            }
        }
    }

    /// v4: the next server ping must arrive within `deadline`.
    async fn server_ping_watch(&self, cancel: &CancellationToken, deadline: Duration) {
        let mut pings = self.heartbeat.subscribe();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                ping = tokio::time::timeout(deadline, pings.changed()) => {
                    if ping.is_err() {
                        warn!(?deadline, "no ping from server");
                        self.finish(Some(DisconnectReason::PingTimeout)).await;
                        return;
                    }
                }
            }
        }
    }

    // -- Teardown ---------------------------------------------------------

    /// Moves to `Closed` exactly once, stops the background tasks and
    /// closes the transport. `reason` is `None` for a failed connect.
    async fn finish(&self, reason: Option<DisconnectReason>) {
        let previous = self.state.send_replace(SessionState::Closed);
        if previous == SessionState::Closed {
            return;
        }

        self.cancel_token().cancel();
        *lock(&self.waiters) = Waiters::default();
        *lock(&self.pending_binary) = None;
        self.acks().clear();

        if let Err(e) = self.transport.close().await {
            debug!(error = %e, "transport close failed");
        }

        let Some(reason) = reason else {
            debug!("connect aborted");
            return;
        };
        // Whatever the transport reports, a close we started is ours.
        let reason = if previous == SessionState::Closing {
            DisconnectReason::IoClientDisconnect
        } else {
            reason
        };
        info!(%reason, "session closed");
        if matches!(previous, SessionState::Open | SessionState::Closing) {
            self.observers.notify_disconnected(reason);
        }
    }
}

fn closed_while_connecting() -> SessionError {
    SessionError::Transport(TransportError::ConnectionClosed(
        "session closed while connecting".into(),
    ))
}
