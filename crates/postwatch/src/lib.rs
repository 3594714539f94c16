//! Postwatch client library.
//!
//! Talks to the crawl/ad-detection backend: one-shot record retrieval over
//! HTTP, and live prediction sessions that stream incremental crawl results
//! over a job-scoped channel while the prediction request is in flight.

pub mod api;
pub mod channel;
pub mod error;
pub mod logging;
pub mod render;
pub mod session;
pub mod settings;

pub use api::{ApiClient, PredictionService};
pub use channel::{ChannelClient, ChannelHandle, ChannelNotice, ChannelState};
pub use error::{ClientError, ClientResult, UserAction};
pub use render::{JsonRenderer, Notifier, Renderer, StderrNotifier, TerminalRenderer};
pub use session::{SessionConfig, SessionController, SessionReport, SessionState};
pub use settings::AppConfig;
