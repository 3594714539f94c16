//! Live-query sessions.
//!
//! A session pairs one triggering prediction request with one streaming
//! channel opened just before it. Streamed results are rendered while the
//! request is in flight; when the request settles the channel is closed
//! exactly once and the session is over.

mod controller;

pub use controller::{
    ChannelEnd, LiveSession, SessionConfig, SessionController, SessionReport, SessionState,
};
