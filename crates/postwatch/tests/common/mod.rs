//! Test backend: an axum server on an ephemeral port that mimics the
//! prediction and crawl service.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use postwatch::session::SessionConfig;
use postwatch::{ApiClient, ChannelClient, Notifier, SessionController};
use postwatch_protocol::{PredictRequest, PredictResponse};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// What the backend answers with.
#[derive(Debug, Clone)]
pub struct Behavior {
    pub predictions: Vec<String>,
    /// Reply to `/predict` with this status instead of predictions.
    pub predict_status: Option<StatusCode>,
    /// Hold `/predict` until the stream handler has sent its frames.
    pub gate_on_stream: bool,
    /// Extra delay before `/predict` answers.
    pub predict_delay: Option<Duration>,
    /// Raw text frames sent on each stream connection.
    pub frames: Vec<String>,
    /// Close the stream from the server side once frames are sent.
    pub close_after_frames: bool,
    pub process_body: String,
    pub process_status: StatusCode,
    pub list_body: String,
    pub list_status: StatusCode,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            predictions: Vec::new(),
            predict_status: None,
            gate_on_stream: false,
            predict_delay: None,
            frames: Vec::new(),
            close_after_frames: false,
            process_body: "{}".to_string(),
            process_status: StatusCode::OK,
            list_body: "[]".to_string(),
            list_status: StatusCode::OK,
        }
    }
}

/// Raw crawl frame.
pub fn crawl(content: &str) -> String {
    serde_json::json!({ "type": "crawl", "content": content }).to_string()
}

struct BackendState {
    behavior: Behavior,
    streamed: Notify,
    queries: Mutex<Vec<String>>,
    stream_connects: Mutex<usize>,
    client_closes: Mutex<usize>,
    client_drops: Mutex<usize>,
}

pub struct Backend {
    pub addr: SocketAddr,
    state: Arc<BackendState>,
}

impl Backend {
    pub async fn start(behavior: Behavior) -> Self {
        let state = Arc::new(BackendState {
            behavior,
            streamed: Notify::new(),
            queries: Mutex::new(Vec::new()),
            stream_connects: Mutex::new(0),
            client_closes: Mutex::new(0),
            client_drops: Mutex::new(0),
        });

        let app = Router::new()
            .route("/predict", post(predict))
            .route("/process_data", post(process_data))
            .route("/data", get(list_data))
            .route("/ws", get(stream))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn api(&self) -> ApiClient {
        ApiClient::new(self.base_url(), Duration::from_secs(5)).unwrap()
    }

    pub fn controller(&self) -> SessionController {
        self.controller_with_endpoint(self.ws_url())
    }

    pub fn controller_with_endpoint(&self, endpoint: String) -> SessionController {
        SessionController::new(
            Arc::new(self.api()),
            ChannelClient::websocket(),
            SessionConfig {
                endpoint,
                open_timeout: Duration::from_secs(2),
                response_timeout: Some(Duration::from_secs(10)),
            },
        )
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.queries.lock().unwrap().clone()
    }

    pub fn stream_connects(&self) -> usize {
        *self.state.stream_connects.lock().unwrap()
    }

    pub fn client_closes(&self) -> usize {
        *self.state.client_closes.lock().unwrap()
    }

    /// Connections that ended without a close frame from the client.
    pub fn client_drops(&self) -> usize {
        *self.state.client_drops.lock().unwrap()
    }

    /// Poll until the server has seen `expected` close frames from the client.
    pub async fn wait_for_client_closes(&self, expected: usize) -> usize {
        for _ in 0..100 {
            if self.client_closes() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.client_closes()
    }
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Collects alerts for assertions.
#[derive(Default)]
pub struct Alerts(Mutex<Vec<String>>);

impl Alerts {
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Notifier for Alerts {
    fn alert(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

async fn predict(
    State(state): State<Arc<BackendState>>,
    Json(request): Json<PredictRequest>,
) -> Response {
    state.queries.lock().unwrap().push(request.query);
    let behavior = &state.behavior;

    if behavior.gate_on_stream {
        let _ = tokio::time::timeout(Duration::from_secs(2), state.streamed.notified()).await;
        // Let the frames reach the client before the response does.
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    if let Some(delay) = behavior.predict_delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = behavior.predict_status {
        return (status, "model backend unavailable").into_response();
    }

    Json(PredictResponse {
        predictions: behavior.predictions.clone(),
    })
    .into_response()
}

async fn process_data(State(state): State<Arc<BackendState>>) -> Response {
    let behavior = &state.behavior;
    (behavior.process_status, behavior.process_body.clone()).into_response()
}

async fn list_data(State(state): State<Arc<BackendState>>) -> Response {
    let behavior = &state.behavior;
    (behavior.list_status, behavior.list_body.clone()).into_response()
}

async fn stream(ws: WebSocketUpgrade, State(state): State<Arc<BackendState>>) -> Response {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

async fn handle_stream(mut socket: WebSocket, state: Arc<BackendState>) {
    *state.stream_connects.lock().unwrap() += 1;

    for frame in &state.behavior.frames {
        if socket.send(Message::Text(frame.clone().into())).await.is_err() {
            return;
        }
    }
    state.streamed.notify_one();

    if state.behavior.close_after_frames {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Close(_)) => {
                *state.client_closes.lock().unwrap() += 1;
                return;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    *state.client_drops.lock().unwrap() += 1;
}

/// Serialize a JSON value into a response body.
pub fn body(value: Value) -> String {
    value.to_string()
}
