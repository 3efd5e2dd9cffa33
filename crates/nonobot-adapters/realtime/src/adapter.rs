//! The realtime adapter.
//!
//! Connecting is a two-phase handshake:
//!
//! 1. **Discovery**: an authenticated `GET` to the session-start endpoint
//!    returns the push URL, the bot's own id and the visible channels.
//! 2. **Upgrade**: a push connection is opened to the discovered host/path.
//!
//! ```text
//! Idle ──connect──▶ Connecting ──ok──▶ Connected ──close/remote──▶ Closed
//!                       │
//!                       └──error──▶ Failed
//! ```
//!
//! Closed and Failed are terminal: an adapter serves one connection.
//!
//! # Example
//!
//! ```rust,ignore
//! let adapter = RealtimeAdapter::new(options, http, ws, Arc::new(bot));
//! adapter.close_handler(|| info!("Backend connection closed"));
//! adapter.connect()?.await?;
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use nonobot_core::{
    AdapterError, AdapterResult, BoxedBotClient, ClientConfig, ClientProvider, ConnectionHandle,
    ConnectionHandler, HttpClientCapability, ReceiveOptions, WsClientCapability,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::{RealtimeOptions, push_endpoint};
use crate::gate::{Admission, FrameGate};
use crate::heartbeat::HeartbeatClock;
use crate::membership::{ChannelKind, ChannelMembership};
use crate::model::{InboundFrame, OutboundFrame, SessionStart};

/// Callback invoked when the connection is torn down.
pub type CloseHandler = Arc<dyn Fn() + Send + Sync>;

/// Lifecycle of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected yet.
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Push connection is live.
    Connected,
    /// Torn down, explicitly or remotely.
    Closed,
    /// The handshake failed.
    Failed,
}

impl ConnectionState {
    /// Whether the adapter can never connect again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A command forwarded to the bot pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Command {
    channel: String,
    text: String,
}

struct AdapterState {
    connection: ConnectionState,
    handle: Option<ConnectionHandle>,
    membership: ChannelMembership,
    self_id: Option<String>,
    clock: HeartbeatClock,
    /// Cancelled when the connection ends; stops the heartbeat and workers.
    lifetime: Option<CancellationToken>,
    /// Feeds the command worker once the pipeline is ready.
    commands: Option<mpsc::UnboundedSender<Command>>,
    close_handler: Option<CloseHandler>,
}

struct AdapterInner {
    options: RealtimeOptions,
    http: Arc<dyn HttpClientCapability>,
    ws: Arc<dyn WsClientCapability>,
    provider: Arc<dyn ClientProvider>,
    /// Lock order: `gate` before `state`.
    gate: Mutex<FrameGate>,
    state: Mutex<AdapterState>,
}

/// Realtime backend adapter.
///
/// Cloning is cheap; clones share the connection.
#[derive(Clone)]
pub struct RealtimeAdapter {
    inner: Arc<AdapterInner>,
}

impl RealtimeAdapter {
    /// Creates an idle adapter.
    ///
    /// `provider` resolves the bot pipeline; frames are held back until it
    /// does.
    pub fn new(
        options: RealtimeOptions,
        http: Arc<dyn HttpClientCapability>,
        ws: Arc<dyn WsClientCapability>,
        provider: Arc<dyn ClientProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(AdapterInner {
                gate: Mutex::new(FrameGate::new(options.pending_frames)),
                options,
                http,
                ws,
                provider,
                state: Mutex::new(AdapterState {
                    connection: ConnectionState::Idle,
                    handle: None,
                    membership: ChannelMembership::new(),
                    self_id: None,
                    clock: HeartbeatClock::new(),
                    lifetime: None,
                    commands: None,
                    close_handler: None,
                }),
            }),
        }
    }

    /// The adapter's options.
    pub fn options(&self) -> &RealtimeOptions {
        &self.inner.options
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().connection
    }

    /// Whether the push connection is live.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The bot's own id, known after discovery.
    pub fn self_id(&self) -> Option<String> {
        self.inner.state.lock().self_id.clone()
    }

    /// Snapshot of the channel membership.
    pub fn membership(&self) -> ChannelMembership {
        self.inner.state.lock().membership.clone()
    }

    /// Starts the handshake.
    ///
    /// Fails immediately with [`AdapterError::AlreadyConnected`] while a
    /// handshake is running or a connection is live, and with
    /// [`AdapterError::Closed`] once the adapter is closed or failed. The
    /// returned future resolves exactly once with the handshake outcome.
    pub fn connect(&self) -> AdapterResult<Connecting> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| AdapterError::connection("no async runtime available"))?;

        {
            let mut state = self.inner.state.lock();
            match state.connection {
                ConnectionState::Connecting | ConnectionState::Connected => {
                    return Err(AdapterError::AlreadyConnected);
                }
                ConnectionState::Closed | ConnectionState::Failed => {
                    return Err(AdapterError::Closed);
                }
                ConnectionState::Idle => state.connection = ConnectionState::Connecting,
            }
        }

        let (tx, rx) = oneshot::channel();
        let inner = self.inner.clone();
        runtime.spawn(async move {
            let outcome = inner.handshake().await;
            if let Err(e) = &outcome {
                inner.handshake_failed(e);
            }
            let _ = tx.send(outcome);
        });

        Ok(Connecting { rx })
    }

    /// Closes the push connection.
    ///
    /// Does nothing before [`connect`](Self::connect). A close during the
    /// handshake marks the adapter closed; the handshake then resolves with
    /// [`AdapterError::Closed`].
    pub fn close(&self) {
        self.inner.close();
    }

    /// Installs the teardown callback, replacing any previous one.
    pub fn close_handler<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.state.lock().close_handler = Some(Arc::new(handler));
    }
}

impl fmt::Debug for RealtimeAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RealtimeAdapter")
            .field("base_url", &self.inner.options.base_url)
            .field("state", &state.connection)
            .field("self_id", &state.self_id)
            .field("channels", &state.membership.len())
            .finish()
    }
}

/// Outcome of [`RealtimeAdapter::connect`].
#[must_use = "the handshake outcome is only observable through this future"]
pub struct Connecting {
    rx: oneshot::Receiver<AdapterResult<()>>,
}

impl Future for Connecting {
    type Output = AdapterResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(AdapterError::Closed)))
    }
}

// =============================================================================
// Handshake
// =============================================================================

impl AdapterInner {
    async fn handshake(self: &Arc<Self>) -> AdapterResult<()> {
        let discovery = self.options.discovery_url()?;
        let secure = discovery.scheme() == "https";

        info!(base_url = %self.options.base_url, "Starting session discovery");
        let response = self
            .http
            .get(discovery.as_str(), Some(&self.options.token))
            .await?;
        if response.status != 200 {
            warn!(status = response.status, "Session discovery rejected");
            return Err(AdapterError::DiscoveryRejected {
                status: response.status,
            });
        }

        let session: SessionStart = serde_json::from_str(&response.body)
            .map_err(|e| AdapterError::malformed(e.to_string()))?;
        let endpoint = push_endpoint(&session.url, secure)?;

        {
            let mut state = self.state.lock();
            if state.connection != ConnectionState::Connecting {
                return Err(AdapterError::Closed);
            }
            state.membership.seed(&session.channels);
            state.self_id = Some(session.self_info.id.clone());
        }
        debug!(
            self_id = %session.self_info.id,
            channels = session.channels.len(),
            endpoint = %endpoint,
            "Session discovered"
        );

        let handler: Arc<dyn ConnectionHandler> = self.clone();
        let config = ClientConfig::default().with_connect_timeout(self.options.connect_timeout());
        let handle = self.ws.connect(&endpoint, handler, config).await?;

        let lifetime = CancellationToken::new();
        {
            let mut state = self.state.lock();
            if state.connection != ConnectionState::Connecting {
                drop(state);
                debug!("Close raced the handshake, dropping fresh connection");
                handle.close();
                return Err(AdapterError::Closed);
            }
            state.connection = ConnectionState::Connected;
            state.handle = Some(handle);
            state.lifetime = Some(lifetime.clone());
        }

        info!(endpoint = %endpoint, "Realtime connection established");

        tokio::spawn(run_heartbeat(
            Arc::downgrade(self),
            self.options.heartbeat_interval(),
            lifetime.clone(),
        ));
        tokio::spawn(await_pipeline(self.clone(), lifetime));

        Ok(())
    }

    fn handshake_failed(&self, error: &AdapterError) {
        let mut state = self.state.lock();
        if state.connection == ConnectionState::Connecting {
            state.connection = ConnectionState::Failed;
        }
        warn!(error = %error, state = %state.connection, "Realtime handshake failed");
    }

    fn close(&self) {
        let handle = {
            let mut state = self.state.lock();
            match state.connection {
                ConnectionState::Connected => state.handle.clone(),
                ConnectionState::Connecting => {
                    state.connection = ConnectionState::Closed;
                    None
                }
                ConnectionState::Idle | ConnectionState::Closed | ConnectionState::Failed => None,
            }
        };

        if let Some(handle) = handle {
            info!(conn_id = %handle.id, "Closing realtime connection");
            handle.close();
        }
    }

    // =========================================================================
    // Frame handling
    // =========================================================================

    /// Decodes one frame; forwarded commands go to `commands`.
    fn handle_frame(&self, text: &str, commands: &mpsc::UnboundedSender<Command>) {
        let frame: InboundFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Ignoring undecodable frame");
                return;
            }
        };

        match frame {
            InboundFrame::ChannelJoined { channel } => {
                if self.state.lock().membership.join(&channel.id) {
                    debug!(channel = %channel.id, "Joined channel");
                }
            }
            InboundFrame::ChannelLeft { channel } => {
                if self.state.lock().membership.leave(&channel) {
                    debug!(channel = %channel, "Left channel");
                }
            }
            InboundFrame::Message {
                channel,
                text: Some(text),
            } => {
                if let Some(command) = self.route_message(channel, text) {
                    let _ = commands.send(command);
                }
            }
            InboundFrame::Message { text: None, .. } | InboundFrame::Other => {
                trace!("Ignoring frame");
            }
        }
    }

    /// Decides whether a message is a command for the bot.
    fn route_message(&self, channel: String, text: String) -> Option<Command> {
        let state = self.state.lock();
        match state.membership.classify(&channel) {
            ChannelKind::Member => {
                let mention = format!("<@{}>", state.self_id.as_deref()?);
                match text.strip_prefix(&mention) {
                    Some(rest) => Some(Command {
                        channel,
                        text: rest.trim_start().to_string(),
                    }),
                    None => {
                        trace!(channel = %channel, "Message not directed at the bot");
                        None
                    }
                }
            }
            ChannelKind::Direct => Some(Command { channel, text }),
            ChannelKind::NonMember => {
                trace!(channel = %channel, "Message on a channel the bot left");
                None
            }
        }
    }

    /// Writes a reply; the write and the generation bump are one unit.
    fn send_reply(&self, channel: &str, reply: String) {
        let mut state = self.state.lock();
        if state.connection != ConnectionState::Connected {
            debug!(channel = %channel, "Connection gone, dropping reply");
            return;
        }
        let Some(handle) = state.handle.clone() else {
            return;
        };
        state.clock.bump();
        if let Err(e) = handle.send_json(&OutboundFrame::message(channel, reply)) {
            warn!(channel = %channel, error = %e, "Failed to send reply");
        }
    }

    /// Runs one heartbeat tick; returns the next ticket, or `None` to stop.
    fn heartbeat_tick(&self, ticket: u64) -> Option<u64> {
        let mut state = self.state.lock();
        if state.connection != ConnectionState::Connected {
            return None;
        }
        let handle = state.handle.clone()?;
        if handle.is_closed() {
            return None;
        }

        if state.clock.is_current(ticket) {
            trace!(ticket, "Heartbeat ping");
            if let Err(e) = handle.send_json(&OutboundFrame::ping()) {
                warn!(error = %e, "Failed to send ping");
            }
        } else {
            trace!(ticket, "Recent traffic, skipping ping");
        }
        Some(state.clock.bump())
    }
}

#[async_trait]
impl ConnectionHandler for AdapterInner {
    async fn on_message(&self, text: &str) {
        let mut gate = self.gate.lock();
        match gate.admit(text) {
            Admission::Pass => {}
            Admission::Held => {
                trace!(pending = gate.pending(), "Holding frame until the pipeline is ready");
                return;
            }
            Admission::Overflow => {
                warn!(capacity = self.options.pending_frames, "Pending frame queue full, dropping frame");
                return;
            }
            Admission::Closed => return,
        }

        let commands = self.state.lock().commands.clone();
        if let Some(commands) = commands {
            self.handle_frame(text, &commands);
        }
    }

    async fn on_disconnect(&self) {
        let handler = {
            let mut state = self.state.lock();
            let was = state.connection;
            state.handle = None;
            state.commands = None;
            if let Some(lifetime) = state.lifetime.take() {
                lifetime.cancel();
            }
            if matches!(was, ConnectionState::Connected | ConnectionState::Connecting) {
                state.connection = ConnectionState::Closed;
            }
            info!(previous = %was, "Realtime connection closed");
            if was == ConnectionState::Connected {
                state.close_handler.clone()
            } else {
                None
            }
        };

        self.gate.lock().close();

        if let Some(handler) = handler {
            handler();
        }
    }
}

// =============================================================================
// Background tasks
// =============================================================================

/// Waits for the bot pipeline, then releases held frames and starts the
/// command worker. Closes the connection if the pipeline fails to start.
async fn await_pipeline(inner: Arc<AdapterInner>, lifetime: CancellationToken) {
    let client = tokio::select! {
        biased;
        _ = lifetime.cancelled() => return,
        client = inner.provider.client() => client,
    };

    let client = match client {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Bot pipeline failed to start, closing connection");
            inner.close();
            return;
        }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    {
        let mut gate = inner.gate.lock();
        let Some(held) = gate.open() else {
            return;
        };
        inner.state.lock().commands = Some(tx.clone());
        debug!(held = held.len(), bot = client.name(), "Bot pipeline ready, releasing held frames");
        for frame in held {
            inner.handle_frame(&frame, &tx);
        }
    }
    drop(tx);

    let timeout = inner.options.reply_timeout();
    run_commands(Arc::downgrade(&inner), client, rx, timeout, lifetime).await;
}

/// Forwards commands to the bot one at a time and writes the replies.
async fn run_commands(
    inner: Weak<AdapterInner>,
    client: BoxedBotClient,
    mut rx: mpsc::UnboundedReceiver<Command>,
    timeout: Duration,
    lifetime: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            biased;
            _ = lifetime.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let outcome = client
            .process_with(
                ReceiveOptions::new(command.channel.as_str()).with_timeout(timeout),
                &command.text,
            )
            .await;

        let Some(inner) = inner.upgrade() else {
            break;
        };
        match outcome {
            Ok(Some(reply)) => inner.send_reply(&command.channel, reply),
            Ok(None) => trace!(channel = %command.channel, "No handler answered"),
            Err(e) => warn!(channel = %command.channel, error = %e, "Command failed"),
        }
    }
    trace!("Command worker stopped");
}

/// Pings the backend every `interval` unless a reply was written since the
/// previous tick.
async fn run_heartbeat(inner: Weak<AdapterInner>, interval: Duration, lifetime: CancellationToken) {
    let mut ticket = match inner.upgrade() {
        Some(inner) => inner.state.lock().clock.issue(),
        None => return,
    };

    loop {
        tokio::select! {
            biased;
            _ = lifetime.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        match inner.heartbeat_tick(ticket) {
            Some(next) => ticket = next,
            None => break,
        }
    }
    trace!("Heartbeat stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nonobot_core::EventBus;
    use serde_json::Value;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    use crate::testing::{GatedProvider, MockHttp, MockWs, RecordingClient, message, next_frame};

    fn options() -> RealtimeOptions {
        RealtimeOptions::new("https://chat.example.com", "tok")
    }

    fn recording() -> (Arc<RecordingClient>, Arc<dyn ClientProvider>) {
        let client = RecordingClient::new();
        let provider: Arc<dyn ClientProvider> = Arc::new(client.clone() as BoxedBotClient);
        (client, provider)
    }

    fn build(
        options: RealtimeOptions,
        http: &Arc<MockHttp>,
        ws: &Arc<MockWs>,
        provider: Arc<dyn ClientProvider>,
    ) -> RealtimeAdapter {
        RealtimeAdapter::new(options, http.clone(), ws.clone(), provider)
    }

    /// Counts close-handler calls and signals each one.
    fn watch_close(adapter: &RealtimeAdapter) -> (Arc<AtomicUsize>, mpsc::UnboundedReceiver<()>) {
        let count = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let counter = count.clone();
        adapter.close_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(());
        });
        (count, rx)
    }

    fn assert_reply(frame: &Value, channel: &str, text: &str) {
        assert_eq!(frame["type"], "message", "frame: {frame}");
        assert_eq!(frame["channel"], channel, "frame: {frame}");
        assert_eq!(frame["text"], text, "frame: {frame}");
    }

    fn drain_types(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(text) = rx.try_recv() {
            let frame: Value = serde_json::from_str(&text).unwrap();
            types.push(frame["type"].as_str().unwrap().to_string());
        }
        types
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    #[tokio::test]
    async fn test_handshake() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        assert_eq!(adapter.state(), ConnectionState::Idle);

        assert_ok!(adapter.connect().unwrap().await);

        assert!(adapter.is_connected());
        assert_eq!(adapter.self_id().as_deref(), Some("U1"));
        assert_eq!(adapter.membership().channels(), vec!["C1".to_string()]);
        assert_eq!(
            http.requests(),
            vec![(
                "https://chat.example.com/session/start?token=tok".to_string(),
                Some("tok".to_string())
            )]
        );
        assert_eq!(ws.urls(), vec!["wss://push.example.com:443/ws/abc".to_string()]);
    }

    #[tokio::test]
    async fn test_plain_http_uses_ws() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (_client, provider) = recording();
        let adapter = build(
            RealtimeOptions::new("http://localhost:8080", "tok"),
            &http,
            &ws,
            provider,
        );

        assert_ok!(adapter.connect().unwrap().await);
        assert_eq!(ws.urls(), vec!["ws://push.example.com:80/ws/abc".to_string()]);
    }

    #[tokio::test]
    async fn test_connect_twice() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);

        let connecting = adapter.connect().unwrap();
        assert!(matches!(adapter.connect(), Err(AdapterError::AlreadyConnected)));
        assert_ok!(connecting.await);
        assert!(matches!(adapter.connect(), Err(AdapterError::AlreadyConnected)));
    }

    #[tokio::test]
    async fn test_discovery_rejected() {
        let (http, ws) = (MockHttp::new(403, "forbidden"), MockWs::new());
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);

        let err = adapter.connect().unwrap().await.unwrap_err();
        assert!(matches!(err, AdapterError::DiscoveryRejected { status: 403 }));
        assert_eq!(adapter.state(), ConnectionState::Failed);
        assert!(ws.urls().is_empty());
        assert!(matches!(adapter.connect(), Err(AdapterError::Closed)));
    }

    #[tokio::test]
    async fn test_malformed_discovery() {
        let (http, ws) = (MockHttp::new(200, r#"{"url": 1}"#), MockWs::new());
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);

        let err = adapter.connect().unwrap().await.unwrap_err();
        assert!(matches!(err, AdapterError::MalformedPayload { .. }));
        assert_eq!(adapter.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_push_connection_refused() {
        let (http, ws) = (MockHttp::ok(), MockWs::refusing());
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);

        let err = adapter.connect().unwrap().await.unwrap_err();
        assert!(matches!(err, AdapterError::Transport(_)));
        assert_eq!(adapter.state(), ConnectionState::Failed);
    }

    #[test]
    fn test_connect_without_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let client = rt.block_on(async { RecordingClient::new() });
        let adapter = build(options(), &http, &ws, Arc::new(client as BoxedBotClient));

        assert!(matches!(
            adapter.connect(),
            Err(AdapterError::ConnectionFailed { .. })
        ));
        assert_eq!(adapter.state(), ConnectionState::Idle);
    }

    // =========================================================================
    // Routing
    // =========================================================================

    #[tokio::test]
    async fn test_mentions_in_member_channel() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        adapter.connect().unwrap().await.unwrap();
        let mut outgoing = ws.outgoing();

        ws.push(message("C1", "<@U1>   ping")).await;
        assert_reply(&next_frame(&mut outgoing).await, "C1", "re: ping");

        ws.push(message("C1", "ping without mention")).await;
        ws.push(message("C9", "<@U1> not a member")).await;
        ws.push(message("C1", "<@U1> marker")).await;
        assert_reply(&next_frame(&mut outgoing).await, "C1", "re: marker");

        assert_eq!(
            client.seen(),
            vec![
                ("C1".to_string(), "ping".to_string()),
                ("C1".to_string(), "marker".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_membership_updates() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        adapter.connect().unwrap().await.unwrap();
        let mut outgoing = ws.outgoing();

        ws.push(r#"{"type": "channel_left", "channel": "C1"}"#).await;
        ws.push(message("C1", "<@U1> ping")).await;
        ws.push(message("C1", "ping")).await;
        ws.push(r#"{"type": "channel_joined", "channel": {"id": "C2", "name": "random"}}"#)
            .await;
        ws.push(message("C2", "<@U1> hi")).await;

        assert_reply(&next_frame(&mut outgoing).await, "C2", "re: hi");
        assert_eq!(client.seen(), vec![("C2".to_string(), "hi".to_string())]);
        assert_eq!(adapter.membership().channels(), vec!["C2".to_string()]);
    }

    #[tokio::test]
    async fn test_direct_conversation() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        adapter.connect().unwrap().await.unwrap();
        let mut outgoing = ws.outgoing();

        ws.push(message("D7", "ping")).await;
        assert_reply(&next_frame(&mut outgoing).await, "D7", "re: ping");
        assert_eq!(client.seen(), vec![("D7".to_string(), "ping".to_string())]);
    }

    #[tokio::test]
    async fn test_unusable_frames_ignored() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        adapter.connect().unwrap().await.unwrap();
        let mut outgoing = ws.outgoing();

        ws.push("not json").await;
        ws.push(r#"{"type": "message", "channel": "C1"}"#).await;
        ws.push(r#"{"type": "hello"}"#).await;
        ws.push(message("C1", "<@U1> silent")).await;
        ws.push(message("C1", "<@U1> marker")).await;

        assert_reply(&next_frame(&mut outgoing).await, "C1", "re: marker");
        assert_eq!(client.seen().len(), 2);
    }

    // =========================================================================
    // Startup gate
    // =========================================================================

    #[tokio::test]
    async fn test_frames_held_until_pipeline_ready() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let client = RecordingClient::new();
        let provider = GatedProvider::new(client.clone());
        let adapter = build(options(), &http, &ws, provider.clone());
        adapter.connect().unwrap().await.unwrap();
        let mut outgoing = ws.outgoing();

        ws.push(message("C1", "<@U1> one")).await;
        ws.push(message("D1", "two")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_err!(outgoing.try_recv());
        assert!(client.seen().is_empty());

        provider.release();
        assert_reply(&next_frame(&mut outgoing).await, "C1", "re: one");
        assert_reply(&next_frame(&mut outgoing).await, "D1", "re: two");
    }

    #[tokio::test]
    async fn test_pending_overflow_drops_frames() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let client = RecordingClient::new();
        let provider = GatedProvider::new(client.clone());
        let adapter = build(options().with_pending_frames(1), &http, &ws, provider.clone());
        adapter.connect().unwrap().await.unwrap();
        let mut outgoing = ws.outgoing();

        ws.push(message("D1", "one")).await;
        ws.push(message("D1", "two")).await;
        provider.release();

        assert_reply(&next_frame(&mut outgoing).await, "D1", "re: one");
        ws.push(message("D1", "three")).await;
        assert_reply(&next_frame(&mut outgoing).await, "D1", "re: three");
        assert_eq!(client.seen().len(), 2);
    }

    #[tokio::test]
    async fn test_pipeline_failure_closes() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let provider = GatedProvider::new(RecordingClient::new());
        let adapter = build(options(), &http, &ws, provider.clone());
        let (count, mut closed) = watch_close(&adapter);
        adapter.connect().unwrap().await.unwrap();

        provider.fail();
        closed.recv().await.unwrap();
        assert_eq!(adapter.state(), ConnectionState::Closed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    // =========================================================================
    // Heartbeat
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_pings_idle_connection() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        adapter.connect().unwrap().await.unwrap();
        let mut outgoing = ws.outgoing();

        tokio::time::sleep(Duration::from_millis(12_100)).await;
        assert_eq!(drain_types(&mut outgoing), vec!["ping", "ping", "ping"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_defers_heartbeat() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        adapter.connect().unwrap().await.unwrap();
        let mut outgoing = ws.outgoing();

        ws.push(message("D1", "hi")).await;
        assert_reply(&next_frame(&mut outgoing).await, "D1", "re: hi");

        tokio::time::sleep(Duration::from_millis(8_100)).await;
        assert_eq!(drain_types(&mut outgoing), vec!["ping"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ping_after_close() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        let (_count, mut closed) = watch_close(&adapter);
        adapter.connect().unwrap().await.unwrap();
        let mut outgoing = ws.outgoing();

        adapter.close();
        closed.recv().await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(drain_types(&mut outgoing).is_empty());
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    #[tokio::test]
    async fn test_close_handler_called_once() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        let (count, mut closed) = watch_close(&adapter);
        adapter.connect().unwrap().await.unwrap();

        adapter.close();
        closed.recv().await.unwrap();
        adapter.close();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.state(), ConnectionState::Closed);
        assert!(matches!(adapter.connect(), Err(AdapterError::Closed)));
    }

    #[tokio::test]
    async fn test_remote_disconnect() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        let (count, mut closed) = watch_close(&adapter);
        adapter.connect().unwrap().await.unwrap();

        ws.drop_remote();
        closed.recv().await.unwrap();
        assert_eq!(adapter.state(), ConnectionState::Closed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_before_connect_is_ignored() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        let (count, _closed) = watch_close(&adapter);

        adapter.close();
        assert_eq!(adapter.state(), ConnectionState::Idle);

        assert_ok!(adapter.connect().unwrap().await);
        assert_eq!(adapter.state(), ConnectionState::Connected);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_close_during_discovery() {
        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        let (count, _closed) = watch_close(&adapter);

        let connecting = adapter.connect().unwrap();
        adapter.close();

        assert!(matches!(connecting.await, Err(AdapterError::Closed)));
        assert_eq!(adapter.state(), ConnectionState::Closed);
        assert!(ws.urls().is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_close_during_upgrade() {
        let release = Arc::new(Notify::new());
        let (http, ws) = (MockHttp::ok(), MockWs::held(release.clone()));
        let (_client, provider) = recording();
        let adapter = build(options(), &http, &ws, provider);
        let (count, _closed) = watch_close(&adapter);

        let connecting = adapter.connect().unwrap();
        ws.entered().await;
        adapter.close();
        release.notify_one();

        assert!(matches!(connecting.await, Err(AdapterError::Closed)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(adapter.state(), ConnectionState::Closed);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    // =========================================================================
    // With a real bot
    // =========================================================================

    #[tokio::test]
    async fn test_bot_pipeline() {
        use nonobot_framework::{Bot, BotOptions, RouterRegistry, install_builtin_handlers};

        let bot = Bot::new(
            EventBus::new(),
            Arc::new(RouterRegistry::new()),
            BotOptions::default(),
        );
        install_builtin_handlers(&bot.chat_router()).unwrap();

        let (http, ws) = (MockHttp::ok(), MockWs::new());
        let adapter = build(options(), &http, &ws, Arc::new(bot));
        adapter.connect().unwrap().await.unwrap();
        let mut outgoing = ws.outgoing();

        ws.push(message("C1", "<@U1> ping")).await;
        assert_reply(&next_frame(&mut outgoing).await, "C1", "pong");

        ws.push(message("D3", "help")).await;
        let frame = next_frame(&mut outgoing).await;
        assert_eq!(frame["channel"], "D3");
        assert!(frame["text"].as_str().unwrap().contains("@ ping"));
    }
}
