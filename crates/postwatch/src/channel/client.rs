//! Channel client and per-session channel handles.

use std::sync::Arc;

use postwatch_protocol::StreamEvent;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::transport::{Transport, WsTransport};

/// Lifecycle of a channel handle. `Closed` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

/// Notifications delivered on a channel handle, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelNotice {
    /// Connection established.
    Opened,
    /// A well-formed inbound event.
    Event(StreamEvent),
    /// Peer closed the connection gracefully.
    Closed,
    /// Connection refused or dropped.
    Failed(String),
}

impl ChannelNotice {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed(_))
    }
}

/// Opens streaming channels.
#[derive(Clone)]
pub struct ChannelClient {
    transport: Arc<dyn Transport>,
}

impl ChannelClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Client over the WebSocket transport.
    pub fn websocket() -> Self {
        Self::new(Arc::new(WsTransport))
    }

    /// Start connecting to `endpoint` and return the handle immediately.
    ///
    /// Never fails synchronously: connection errors arrive later as
    /// [`ChannelNotice::Failed`]. Must be called inside a tokio runtime.
    pub fn open(&self, endpoint: impl Into<String>) -> ChannelHandle {
        let endpoint = endpoint.into();
        let id = Uuid::new_v4();
        let state = Arc::new(watch::Sender::new(ChannelState::Connecting));
        let (notice_tx, notices) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        debug!(channel = %id, "Opening channel to {}", endpoint);

        let task = tokio::spawn(run_reader(
            Arc::clone(&self.transport),
            endpoint.clone(),
            id,
            Arc::clone(&state),
            notice_tx,
            cancel.clone(),
        ));

        ChannelHandle {
            id,
            endpoint,
            state,
            notices,
            cancel,
            task: Some(task),
            closed: false,
        }
    }
}

impl std::fmt::Debug for ChannelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelClient").finish()
    }
}

/// Exclusive handle to one opened channel.
///
/// The handle is the only way to observe or close the channel. Dropping it
/// without calling [`ChannelHandle::close`] still stops the reader task.
pub struct ChannelHandle {
    id: Uuid,
    endpoint: String,
    state: Arc<watch::Sender<ChannelState>>,
    notices: mpsc::UnboundedReceiver<ChannelNotice>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl ChannelHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Next notice in arrival order. Returns `None` once the channel has
    /// ended and every buffered notice was consumed, or after `close`.
    pub async fn next_notice(&mut self) -> Option<ChannelNotice> {
        if self.closed {
            return None;
        }
        self.notices.recv().await
    }

    /// Next notice already queued, without waiting.
    pub fn try_next_notice(&mut self) -> Option<ChannelNotice> {
        if self.closed {
            return None;
        }
        self.notices.try_recv().ok()
    }

    /// Close the channel. Idempotent.
    ///
    /// Returns `true` when this call shut down an open connection, `false`
    /// when the handle was already closed, had failed, or never opened.
    /// Buffered notices are discarded.
    pub async fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;

        let prior = self.state();
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(channel = %self.id, "Channel reader task ended abnormally: {}", e);
            }
        }
        self.state.send_replace(ChannelState::Closed);
        self.notices.close();
        while self.notices.try_recv().is_ok() {}

        let shut_down = prior == ChannelState::Open;
        if shut_down {
            info!(channel = %self.id, "Channel closed");
        } else {
            debug!(channel = %self.id, "Close on {:?} channel is a no-op", prior);
        }
        shut_down
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

/// Move to `next` unless the channel already reached `Closed`.
fn transition(state: &watch::Sender<ChannelState>, next: ChannelState) -> bool {
    state.send_if_modified(|current| {
        if *current == ChannelState::Closed || *current == next {
            return false;
        }
        *current = next;
        true
    })
}

async fn run_reader(
    transport: Arc<dyn Transport>,
    endpoint: String,
    id: Uuid,
    state: Arc<watch::Sender<ChannelState>>,
    notices: mpsc::UnboundedSender<ChannelNotice>,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(channel = %id, "Connect to {} abandoned", endpoint);
            return;
        }
        result = transport.connect(&endpoint) => result,
    };

    let mut source = match connected {
        Ok(source) => source,
        Err(e) => {
            warn!(channel = %id, "Channel connect failed: {}", e);
            transition(&state, ChannelState::Closed);
            let _ = notices.send(ChannelNotice::Failed(e.to_string()));
            return;
        }
    };

    if cancel.is_cancelled() || !transition(&state, ChannelState::Open) {
        source.close().await;
        return;
    }
    info!(channel = %id, "Channel open at {}", endpoint);
    let _ = notices.send(ChannelNotice::Opened);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                source.close().await;
                break;
            }
            frame = source.next_text() => match frame {
                Some(Ok(text)) => match StreamEvent::parse(&text) {
                    Ok(event) => {
                        let _ = notices.send(ChannelNotice::Event(event));
                    }
                    Err(e) => {
                        warn!(channel = %id, "Dropping malformed frame: {}", e);
                    }
                },
                Some(Err(e)) => {
                    warn!(channel = %id, "Channel dropped: {}", e);
                    transition(&state, ChannelState::Closed);
                    let _ = notices.send(ChannelNotice::Failed(e.to_string()));
                    break;
                }
                None => {
                    info!(channel = %id, "Channel closed by peer");
                    transition(&state, ChannelState::Closed);
                    let _ = notices.send(ChannelNotice::Closed);
                    break;
                }
            }
        }
    }
}
