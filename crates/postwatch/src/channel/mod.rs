//! Job-scoped streaming channel.
//!
//! A [`ChannelHandle`] moves through `Connecting -> Open -> Closed`. Both
//! `Connecting -> Closed` (refused, or closed before the handshake finished)
//! and `Open -> Closed` (peer close, drop, or local close) are valid, and
//! `Closed` is final.

mod client;
mod transport;

#[cfg(test)]
pub(crate) mod scripted;

pub use client::{ChannelClient, ChannelHandle, ChannelNotice, ChannelState};
pub use transport::{FrameSource, Transport, WsTransport};
