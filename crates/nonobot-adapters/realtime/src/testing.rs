//! In-memory transport and client doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nonobot_core::{
    BotClient, BoxFuture, BoxedBotClient, ClientConfig, ClientError, ClientProvider, ClientResult,
    ConnectionHandle, ConnectionHandler, HttpClientCapability, HttpResponse, OUTGOING_QUEUE_CAPACITY,
    OutboundHandler, ReceiveOptions, TransportError, TransportResult, WsClientCapability,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc, watch};
use tokio_util::sync::CancellationToken;

pub(crate) const SELF_ID: &str = "U1";

/// A discovery answer listing `C1` as a member channel and `C9` as a
/// channel the bot is not in.
pub(crate) fn session_body() -> String {
    json!({
        "ok": true,
        "url": "wss://push.example.com/ws/abc",
        "self": {"id": SELF_ID},
        "channels": [
            {"id": "C1", "is_member": true},
            {"id": "C9", "is_member": false},
        ],
    })
    .to_string()
}

pub(crate) fn message(channel: &str, text: &str) -> String {
    json!({"type": "message", "channel": channel, "text": text}).to_string()
}

// =============================================================================
// HTTP
// =============================================================================

pub(crate) struct MockHttp {
    response: HttpResponse,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl MockHttp {
    pub(crate) fn new(status: u16, body: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            response: HttpResponse::new(status, body),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn ok() -> Arc<Self> {
        Self::new(200, session_body())
    }

    pub(crate) fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpClientCapability for MockHttp {
    async fn get(&self, url: &str, bearer: Option<&str>) -> TransportResult<HttpResponse> {
        self.requests
            .lock()
            .push((url.to_string(), bearer.map(str::to_string)));
        Ok(self.response.clone())
    }
}

// =============================================================================
// Push connection
// =============================================================================

#[derive(Default)]
struct MockWsState {
    handler: Option<Arc<dyn ConnectionHandler>>,
    outgoing: Option<mpsc::Receiver<String>>,
    remote: CancellationToken,
    urls: Vec<String>,
}

/// Accepts every connection; the peer side is driven by the test.
#[derive(Default)]
pub(crate) struct MockWs {
    state: Mutex<MockWsState>,
    /// When set, `connect` parks until notified.
    hold: Option<Arc<Notify>>,
    entered: Notify,
    refuse: bool,
}

impl MockWs {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn held(release: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            hold: Some(release),
            ..Default::default()
        })
    }

    pub(crate) fn refusing() -> Arc<Self> {
        Arc::new(Self {
            refuse: true,
            ..Default::default()
        })
    }

    /// Resolves once `connect` has been called.
    pub(crate) async fn entered(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.state.lock().urls.clone()
    }

    /// Delivers a frame from the backend.
    pub(crate) async fn push(&self, frame: impl AsRef<str>) {
        let handler = self.state.lock().handler.clone();
        if let Some(handler) = handler {
            handler.on_message(frame.as_ref()).await;
        }
    }

    /// Simulates the backend dropping the connection.
    pub(crate) fn drop_remote(&self) {
        self.state.lock().remote.cancel();
    }

    pub(crate) fn outgoing(&self) -> mpsc::Receiver<String> {
        self.state
            .lock()
            .outgoing
            .take()
            .expect("no connection was opened")
    }
}

#[async_trait]
impl WsClientCapability for MockWs {
    async fn connect(
        &self,
        url: &str,
        handler: Arc<dyn ConnectionHandler>,
        _config: ClientConfig,
    ) -> TransportResult<ConnectionHandle> {
        self.state.lock().urls.push(url.to_string());
        self.entered.notify_one();
        if let Some(release) = &self.hold {
            release.notified().await;
        }
        if self.refuse {
            return Err(TransportError::ConnectionFailed {
                url: url.to_string(),
                reason: "refused".into(),
            });
        }

        let (tx, rx) = mpsc::channel(OUTGOING_QUEUE_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let remote = {
            let mut state = self.state.lock();
            state.handler = Some(handler.clone());
            state.outgoing = Some(rx);
            state.remote.clone()
        };

        let requested = async move {
            let _ = shutdown_rx.wait_for(|closed| *closed).await;
        };
        tokio::spawn(async move {
            tokio::select! {
                _ = requested => {}
                _ = remote.cancelled() => {}
            }
            handler.on_disconnect().await;
        });

        Ok(ConnectionHandle::new("mock-conn", tx, shutdown_tx))
    }
}

/// Next frame written by the adapter, as JSON.
pub(crate) async fn next_frame(rx: &mut mpsc::Receiver<String>) -> Value {
    let text = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("connection queue closed");
    serde_json::from_str(&text).expect("adapter wrote invalid JSON")
}

// =============================================================================
// Bot client
// =============================================================================

/// Answers `re: <text>`, except for `silent`, and records what it saw.
pub(crate) struct RecordingClient {
    seen: Mutex<Vec<(String, String)>>,
    handle: tokio::runtime::Handle,
}

impl RecordingClient {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            handle: tokio::runtime::Handle::current(),
        })
    }

    pub(crate) fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl BotClient for RecordingClient {
    fn name(&self) -> &str {
        "recorder"
    }

    fn alias(&self, _aliases: Vec<String>) {}

    async fn process_with(
        &self,
        options: ReceiveOptions,
        text: &str,
    ) -> ClientResult<Option<String>> {
        self.seen
            .lock()
            .push((options.chat_id.clone(), text.to_string()));
        Ok((text != "silent").then(|| format!("re: {text}")))
    }

    async fn receive_message(
        &self,
        options: ReceiveOptions,
        text: &str,
    ) -> ClientResult<Option<String>> {
        self.process_with(options, text).await
    }

    fn message_handler(&self, _handler: OutboundHandler) {}

    fn handle(&self) -> &tokio::runtime::Handle {
        &self.handle
    }

    fn close(&self) {}
}

/// Hands out its client once released.
pub(crate) struct GatedProvider {
    client: BoxedBotClient,
    ready: watch::Sender<Option<bool>>,
}

impl GatedProvider {
    pub(crate) fn new(client: BoxedBotClient) -> Arc<Self> {
        Arc::new(Self {
            client,
            ready: watch::channel(None).0,
        })
    }

    pub(crate) fn release(&self) {
        self.ready.send_replace(Some(true));
    }

    pub(crate) fn fail(&self) {
        self.ready.send_replace(Some(false));
    }
}

impl ClientProvider for GatedProvider {
    fn client(&self) -> BoxFuture<'static, ClientResult<BoxedBotClient>> {
        let client = self.client.clone();
        let mut ready = self.ready.subscribe();
        Box::pin(async move {
            let outcome = match ready.wait_for(Option::is_some).await {
                Ok(outcome) => *outcome,
                Err(_) => return Err(ClientError::Closed),
            };
            match outcome {
                Some(true) => Ok(client),
                _ => Err(ClientError::Unavailable("pipeline failed".into())),
            }
        })
    }
}
