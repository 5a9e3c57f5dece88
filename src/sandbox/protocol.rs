//! Worker message protocol
//!
//! ```text
//! caller ── {"type":"run","id":7,"code":"..."} ──────────────► worker
//! caller ◄─ {"type":"result","id":7,"output":"..","error":""} ─ worker
//!
//! handshake (exactly once, before any run is served):
//!        ◄─ {"type":"ready"}              or  {"type":"error","error":".."}
//! ```
//!
//! An empty `error` signals success.

use serde::{Deserialize, Serialize};

/// Request sent to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerRequest {
    /// Evaluate one submission
    Run {
        /// Correlation id, echoed in the reply
        id: u64,
        /// Untrusted source text
        code: String,
    },
}

/// Message emitted by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerMessage {
    /// Interpreter loaded; runs may now be served
    Ready,
    /// Reply to a `run` request
    Result {
        /// Id of the request this answers
        id: u64,
        /// Captured output
        #[serde(default)]
        output: String,
        /// Error text, empty on success
        #[serde(default)]
        error: String,
    },
    /// Interpreter failed to load
    Error {
        /// Load failure description
        error: String,
    },
}

impl WorkerMessage {
    /// Wire tag of this message
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
        }
    }
}
