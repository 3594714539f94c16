//! Streaming transport abstraction.
//!
//! The channel client only needs text frames, an end-of-stream signal and a
//! graceful close. [`WsTransport`] provides them over a WebSocket.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::error::{ClientError, ClientResult};

/// An established connection yielding inbound text frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame. `None` means the peer closed gracefully; `Some(Err)`
    /// means the connection broke.
    async fn next_text(&mut self) -> Option<ClientResult<String>>;

    /// Close the connection from our side.
    async fn close(&mut self);
}

/// Connects to a streaming endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, endpoint: &str) -> ClientResult<Box<dyn FrameSource>>;
}

/// WebSocket transport backed by tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, endpoint: &str) -> ClientResult<Box<dyn FrameSource>> {
        let (stream, response) = connect_async(endpoint)
            .await
            .map_err(|e| ClientError::transport(format!("connect to {endpoint} failed: {e}")))?;
        debug!(
            "WebSocket handshake with {} completed ({})",
            endpoint,
            response.status()
        );
        Ok(Box::new(WsSource { stream }))
    }
}

struct WsSource {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_text(&mut self) -> Option<ClientResult<String>> {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!("WebSocket peer sent close: {:?}", frame);
                    return None;
                }
                Ok(other) => {
                    trace!("Ignoring non-text WebSocket frame ({} bytes)", other.len());
                }
                Err(e) => return Some(Err(ClientError::transport(format!("WebSocket error: {e}")))),
            }
        }
        None
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("WebSocket close handshake failed: {}", e);
        }
    }
}
