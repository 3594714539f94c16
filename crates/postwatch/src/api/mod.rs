//! HTTP client for the crawl/prediction backend.
//!
//! Every call is attempted exactly once; retry policy belongs to callers.

mod client;

pub use client::{ApiClient, PredictionService};
