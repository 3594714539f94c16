//! In-memory transport for driving channels from tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::transport::{FrameSource, Transport};
use crate::error::{ClientError, ClientResult};

enum Plan {
    Accept(mpsc::UnboundedReceiver<Scripted>),
    Refuse(String),
    Hang,
}

enum Scripted {
    Text(String),
    Fail(String),
}

#[derive(Default)]
struct Stats {
    plans: VecDeque<Plan>,
    connects: usize,
    closes: usize,
}

/// Transport whose connections are scripted in advance, one plan per
/// `connect` call, in order.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    stats: Arc<Mutex<Stats>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Next connect succeeds; frames are pushed through the returned feed.
    pub(crate) fn accept(&self) -> FrameFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Plan::Accept(rx));
        FrameFeed { tx }
    }

    pub(crate) fn refuse(&self, reason: &str) {
        self.push(Plan::Refuse(reason.to_string()));
    }

    /// Next connect never completes.
    pub(crate) fn hang(&self) {
        self.push(Plan::Hang);
    }

    pub(crate) fn connects(&self) -> usize {
        self.lock().connects
    }

    /// Number of local closes performed on established connections.
    pub(crate) fn closes(&self) -> usize {
        self.lock().closes
    }

    fn push(&self, plan: Plan) {
        self.lock().plans.push_back(plan);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Stats> {
        self.stats.lock().unwrap()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, endpoint: &str) -> ClientResult<Box<dyn FrameSource>> {
        let plan = {
            let mut stats = self.lock();
            stats.connects += 1;
            stats.plans.pop_front()
        };
        match plan {
            Some(Plan::Accept(rx)) => Ok(Box::new(ScriptedSource {
                rx,
                stats: Arc::clone(&self.stats),
            })),
            Some(Plan::Refuse(reason)) => Err(ClientError::transport(format!(
                "connect to {endpoint} failed: {reason}"
            ))),
            Some(Plan::Hang) => std::future::pending().await,
            None => Err(ClientError::transport("no scripted connection")),
        }
    }
}

struct ScriptedSource {
    rx: mpsc::UnboundedReceiver<Scripted>,
    stats: Arc<Mutex<Stats>>,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn next_text(&mut self) -> Option<ClientResult<String>> {
        match self.rx.recv().await? {
            Scripted::Text(text) => Some(Ok(text)),
            Scripted::Fail(reason) => Some(Err(ClientError::transport(reason))),
        }
    }

    async fn close(&mut self) {
        self.stats.lock().unwrap().closes += 1;
    }
}

/// Server side of a scripted connection. Dropping it closes gracefully.
pub(crate) struct FrameFeed {
    tx: mpsc::UnboundedSender<Scripted>,
}

impl FrameFeed {
    pub(crate) fn text(&self, raw: &str) {
        let _ = self.tx.send(Scripted::Text(raw.to_string()));
    }

    pub(crate) fn event(&self, tag: &str, content: &str) {
        let frame = serde_json::json!({ "type": tag, "content": content });
        self.text(&frame.to_string());
    }

    pub(crate) fn fail(&self, reason: &str) {
        let _ = self.tx.send(Scripted::Fail(reason.to_string()));
    }

    pub(crate) fn finish(self) {}
}
