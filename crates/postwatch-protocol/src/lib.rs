//! Wire-contract types for the postwatch backend.
//!
//! The backend exposes three HTTP endpoints and one streaming channel:
//!
//! ```text
//! POST /predict       {query}          -> {predictions: [..]}
//! POST /process_data                   -> Record
//! GET  /data                           -> [Record, ..]
//! WS   /ws            <- {type, content} frames while a prediction runs
//! ```
//!
//! Field names are wire literals, including the non-ASCII `"광고"` key on records.

pub mod events;
pub mod predict;
pub mod records;

pub use events::{StreamEvent, StreamEventKind};
pub use predict::{PredictRequest, PredictResponse};
pub use records::{AdStatus, Record};

/// Path of the prediction endpoint.
pub const PREDICT_PATH: &str = "/predict";

/// Path of the batch-process endpoint.
pub const PROCESS_DATA_PATH: &str = "/process_data";

/// Path of the record listing endpoint.
pub const LIST_DATA_PATH: &str = "/data";

/// Default path of the streaming channel.
pub const STREAM_PATH: &str = "/ws";
