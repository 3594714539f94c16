//! Streamed events delivered over the job-scoped channel.
//!
//! Frames are JSON text `{ "type": string, "content": string }`. Only the
//! `crawl` tag carries incremental results; every other tag is tolerated and
//! ignored so the server can extend the protocol without breaking clients.

use serde::{Deserialize, Serialize, de::Error as _};
use serde_json::Value;

/// Tag of the incremental-result event.
pub const CRAWL_TAG: &str = "crawl";

/// One inbound frame from the streaming channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub tag: String,
    pub content: String,
}

/// Classification of a [`StreamEvent`] tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventKind {
    /// Incremental crawl result, forwarded to the renderer.
    Crawl,
    /// Anything else.
    Other(String),
}

impl StreamEvent {
    pub fn crawl(content: impl Into<String>) -> Self {
        Self {
            tag: CRAWL_TAG.to_string(),
            content: content.into(),
        }
    }

    /// Parse a text frame. Only a JSON object with string `type` and
    /// `content` fields is a valid frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<Value>(text)? {
            value @ Value::Object(_) => serde_json::from_value(value),
            _ => Err(serde_json::Error::custom("stream frame must be a JSON object")),
        }
    }

    pub fn kind(&self) -> StreamEventKind {
        if self.tag == CRAWL_TAG {
            StreamEventKind::Crawl
        } else {
            StreamEventKind::Other(self.tag.clone())
        }
    }

    pub fn is_incremental(&self) -> bool {
        self.tag == CRAWL_TAG
    }
}

impl std::fmt::Display for StreamEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crawl => write!(f, "{CRAWL_TAG}"),
            Self::Other(tag) => write!(f, "{tag}"),
        }
    }
}
