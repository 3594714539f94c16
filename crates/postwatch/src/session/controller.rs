//! Live-query session controller.

use std::sync::Arc;
use std::time::Duration;

use postwatch_protocol::PREDICT_PATH;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::api::PredictionService;
use crate::channel::{ChannelClient, ChannelHandle, ChannelNotice};
use crate::error::{ClientError, ClientResult, UserAction};
use crate::render::{Notifier, Renderer};

/// Session lifecycle. `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ChannelOpening,
    AwaitingResponse,
    Terminated,
}

/// How the session's channel ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEnd {
    /// Open channel closed by the session at termination.
    ClosedByClient,
    /// Connect attempt still pending at termination and abandoned.
    Abandoned,
    /// Peer closed the channel before the session terminated.
    ClosedByServer,
    /// Connect refused or connection dropped.
    Failed(String),
}

/// Timing policy for live sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Streaming endpoint opened once per session.
    pub endpoint: String,
    /// How long to wait for the channel to report open before the
    /// triggering request is dispatched anyway. Zero dispatches right after
    /// the open call returns.
    pub open_timeout: Duration,
    /// Upper bound on waiting for the triggering request. `None` waits
    /// indefinitely.
    pub response_timeout: Option<Duration>,
}

/// Outcome of a successful session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub id: Uuid,
    pub predictions: Vec<String>,
    /// Streamed results forwarded to the renderer.
    pub live_events: usize,
    /// Well-formed events with an unrecognized tag.
    pub ignored_events: usize,
    pub channel_opened: bool,
    pub channel_end: ChannelEnd,
}

/// Starts live-query sessions.
pub struct SessionController {
    predictor: Arc<dyn PredictionService>,
    channels: ChannelClient,
    config: SessionConfig,
}

impl SessionController {
    pub fn new(
        predictor: Arc<dyn PredictionService>,
        channels: ChannelClient,
        config: SessionConfig,
    ) -> Self {
        Self {
            predictor,
            channels,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Validate `query` and open the session's channel.
    ///
    /// Empty or whitespace-only queries fail with `InvalidInput` before any
    /// channel is opened. Does not wait on I/O.
    pub fn begin(&self, query: &str) -> ClientResult<LiveSession> {
        if query.trim().is_empty() {
            return Err(ClientError::invalid_input("query must not be empty"));
        }

        let id = Uuid::new_v4();
        debug!(session = %id, "Session state Idle -> ChannelOpening");
        let channel = self.channels.open(self.config.endpoint.clone());

        Ok(LiveSession {
            id,
            query: query.to_string(),
            state: SessionState::ChannelOpening,
            channel,
            channel_live: true,
            channel_opened: false,
            channel_end: None,
            live_events: 0,
            ignored_events: 0,
            predictor: Arc::clone(&self.predictor),
            config: self.config.clone(),
        })
    }

    /// Run a full session and report failures through `notifier`.
    pub async fn start(
        &self,
        query: &str,
        renderer: &dyn Renderer,
        notifier: &dyn Notifier,
    ) -> ClientResult<SessionReport> {
        let result = match self.begin(query) {
            Ok(session) => session.run(renderer).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            notifier.report_failure(UserAction::Predict, e);
        }
        result
    }
}

/// One in-flight session. Owns its channel handle exclusively.
pub struct LiveSession {
    id: Uuid,
    query: String,
    state: SessionState,
    channel: ChannelHandle,
    /// Whether the channel can still deliver notices.
    channel_live: bool,
    channel_opened: bool,
    channel_end: Option<ChannelEnd>,
    live_events: usize,
    ignored_events: usize,
    predictor: Arc<dyn PredictionService>,
    config: SessionConfig,
}

impl LiveSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to termination.
    ///
    /// Streamed `crawl` events are rendered as they arrive until the
    /// triggering request settles. The channel is then closed exactly once.
    /// On success the predictions are rendered; on failure nothing more is.
    pub async fn run(mut self, renderer: &dyn Renderer) -> ClientResult<SessionReport> {
        let span = info_span!("session", id = %self.id);
        async move {
            self.await_open(renderer).await;
            self.set_state(SessionState::AwaitingResponse);

            let predictor = Arc::clone(&self.predictor);
            let query = self.query.clone();
            let bound = self.config.response_timeout;
            let request = async move {
                match bound {
                    Some(after) => tokio::time::timeout(after, predictor.predict(&query))
                        .await
                        .unwrap_or_else(|_| {
                            Err(ClientError::Timeout {
                                endpoint: PREDICT_PATH.to_string(),
                                after,
                            })
                        }),
                    None => predictor.predict(&query).await,
                }
            };
            tokio::pin!(request);

            let outcome = loop {
                tokio::select! {
                    biased;
                    notice = self.channel.next_notice(), if self.channel_live => match notice {
                        Some(notice) => self.route(notice, renderer),
                        None => self.channel_live = false,
                    },
                    outcome = &mut request => break outcome,
                }
            };

            // Notices queued before settlement are still part of the session.
            while self.channel_live {
                match self.channel.try_next_notice() {
                    Some(notice) => self.route(notice, renderer),
                    None => break,
                }
            }

            self.terminate().await;

            match outcome {
                Ok(predictions) => {
                    info!(
                        "Session finished with {} prediction(s), {} live result(s)",
                        predictions.len(),
                        self.live_events
                    );
                    renderer.predictions(&predictions);
                    Ok(self.report(predictions))
                }
                Err(e) => {
                    debug!("Session failed: {}", e);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Wait for the channel to open, fail, or for `open_timeout` to elapse.
    async fn await_open(&mut self, renderer: &dyn Renderer) {
        if self.config.open_timeout.is_zero() {
            return;
        }

        let deadline = tokio::time::sleep(self.config.open_timeout);
        tokio::pin!(deadline);

        while self.channel_live && !self.channel_opened {
            tokio::select! {
                _ = &mut deadline => {
                    warn!(
                        "Channel not open after {:?}, dispatching request anyway",
                        self.config.open_timeout
                    );
                    break;
                }
                notice = self.channel.next_notice() => match notice {
                    Some(notice) => self.route(notice, renderer),
                    None => self.channel_live = false,
                },
            }
        }
    }

    fn route(&mut self, notice: ChannelNotice, renderer: &dyn Renderer) {
        if self.state == SessionState::Terminated {
            debug!("Discarding {:?} after termination", notice);
            return;
        }

        match notice {
            ChannelNotice::Opened => {
                debug!("Channel open");
                self.channel_opened = true;
            }
            ChannelNotice::Event(event) if event.is_incremental() => {
                self.live_events += 1;
                renderer.live_result(&event.content);
            }
            ChannelNotice::Event(event) => {
                self.ignored_events += 1;
                debug!("Ignoring event with tag {:?}", event.tag);
            }
            ChannelNotice::Closed => {
                info!("Channel closed by server before the response");
                self.channel_live = false;
                self.channel_end = Some(ChannelEnd::ClosedByServer);
            }
            ChannelNotice::Failed(reason) => {
                warn!("Channel failed: {}", reason);
                self.channel_live = false;
                self.channel_end = Some(ChannelEnd::Failed(reason));
            }
        }
    }

    /// Enter `Terminated` and close the channel. Runs at most once.
    async fn terminate(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.set_state(SessionState::Terminated);
        self.channel_live = false;

        let shut_down = self.channel.close().await;
        if self.channel_end.is_none() {
            self.channel_end = Some(if shut_down {
                ChannelEnd::ClosedByClient
            } else {
                ChannelEnd::Abandoned
            });
        }
    }

    fn set_state(&mut self, next: SessionState) {
        debug!("Session state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn report(&self, predictions: Vec<String>) -> SessionReport {
        SessionReport {
            id: self.id,
            predictions,
            live_events: self.live_events,
            ignored_events: self.ignored_events,
            channel_opened: self.channel_opened,
            channel_end: self
                .channel_end
                .clone()
                .unwrap_or(ChannelEnd::ClosedByClient),
        }
    }
}
