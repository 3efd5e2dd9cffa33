//! WebSocket client capability implementation.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{info, trace, warn};
use uuid::Uuid;

use nonobot_core::{
    ClientConfig, ConnectionHandle, ConnectionHandler, OUTGOING_QUEUE_CAPACITY, TransportError,
    TransportResult, WsClientCapability,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// WebSocket client capability implementation.
///
/// Connections are not re-established once they end; the handler's
/// `on_disconnect` is the single teardown signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsClientCapabilityImpl;

impl WsClientCapabilityImpl {
    /// Creates a new WebSocket client capability.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WsClientCapability for WsClientCapabilityImpl {
    async fn connect(
        &self,
        url: &str,
        handler: Arc<dyn ConnectionHandler>,
        config: ClientConfig,
    ) -> TransportResult<ConnectionHandle> {
        let failed = |reason: String| TransportError::ConnectionFailed {
            url: url.to_string(),
            reason,
        };

        let mut request = url
            .into_client_request()
            .map_err(|e| failed(format!("invalid request: {e}")))?;
        if let Some(token) = &config.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::InvalidConfig(format!("invalid access token: {e}")))?;
            request.headers_mut().insert("Authorization", value);
        }

        info!(url = %url, "Connecting to WebSocket server");

        let (ws_stream, _response) =
            tokio::time::timeout(config.connect_timeout, connect_async(request))
                .await
                .map_err(|_| failed(format!("timed out after {:?}", config.connect_timeout)))?
                .map_err(|e| failed(format!("WebSocket connection failed: {e}")))?;
        let (ws_tx, ws_rx) = ws_stream.split();

        let (message_tx, message_rx) = mpsc::channel::<String>(OUTGOING_QUEUE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let conn_id = Uuid::new_v4().to_string();
        info!(conn_id = %conn_id, url = %url, "WebSocket client connected");

        let handle = ConnectionHandle::new(conn_id.clone(), message_tx, shutdown_tx);

        tokio::spawn(run_client_loop(
            ws_tx,
            ws_rx,
            message_rx,
            shutdown_rx,
            handler,
            conn_id,
        ));

        Ok(handle)
    }
}

/// Pumps frames both ways until shutdown, remote close or error.
async fn run_client_loop(
    mut ws_tx: WsSink,
    mut ws_rx: WsSource,
    mut message_rx: mpsc::Receiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
    handler: Arc<dyn ConnectionHandler>,
    conn_id: String,
) {
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!(conn_id = %conn_id, "WebSocket client shutting down");
                    let _ = ws_tx.close().await;
                    break;
                }
            }

            Some(text) = message_rx.recv() => {
                trace!(conn_id = %conn_id, len = text.len(), "Sending text");
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    warn!(conn_id = %conn_id, error = %e, "Failed to send frame");
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        trace!(conn_id = %conn_id, len = text.len(), "Received text");
                        handler.on_message(text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        trace!(conn_id = %conn_id, len = data.len(), "Ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        trace!(conn_id = %conn_id, "Received ping, sending pong");
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        trace!(conn_id = %conn_id, "Received pong");
                    }
                    Some(Ok(Message::Close(_))) | Some(Ok(Message::Frame(_))) => {
                        info!(conn_id = %conn_id, "Server closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                        break;
                    }
                    None => {
                        info!(conn_id = %conn_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    handler.on_disconnect().await;
}
