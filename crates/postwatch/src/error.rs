//! Client error types.

use std::time::Duration;

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can end a client operation or session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Input rejected before any I/O.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Streaming channel failed to connect or dropped.
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP call failed or returned a non-success status.
    #[error("Request to {endpoint} failed: {message}")]
    Request {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// Body did not match the wire contract.
    #[error("Failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    /// Triggering call did not settle within the session bound.
    #[error("Request to {endpoint} did not settle within {after:?}")]
    Timeout { endpoint: String, after: Duration },
}

impl ClientError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn decode(what: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            what: what.into(),
            message: message.to_string(),
        }
    }

    /// Build a request error from a reqwest failure, keeping the status if any.
    pub fn from_reqwest(endpoint: impl Into<String>, err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::decode("response body", err);
        }
        Self::Request {
            endpoint: endpoint.into(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    /// HTTP status of a failed request, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => *status,
            _ => None,
        }
    }

    /// Stable error code for machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Request { .. } | Self::Timeout { .. } => "REQUEST_ERROR",
            Self::Decode { .. } => "DECODE_ERROR",
        }
    }
}

/// A user-facing action, each with a fixed alert message on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// Query validation.
    Query,
    /// Live prediction session.
    Predict,
    /// Batch-process trigger.
    Process,
    /// Record listing.
    List,
}

impl UserAction {
    pub fn failure_message(self) -> &'static str {
        match self {
            Self::Query => "쿼리를 입력하세요.",
            Self::Predict => "예측 중 오류가 발생했습니다.",
            Self::Process => "데이터 처리 중 오류가 발생했습니다.",
            Self::List => "데이터 조회 중 오류가 발생했습니다.",
        }
    }

    /// Alert for a failed action. Empty-query rejections always use the
    /// query prompt, whichever action raised them.
    pub fn alert_for(self, err: &ClientError) -> &'static str {
        match err {
            ClientError::InvalidInput(_) => Self::Query.failure_message(),
            _ => self.failure_message(),
        }
    }
}
