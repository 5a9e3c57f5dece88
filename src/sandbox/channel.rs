//! Execution Channel - request/response front end of the sandbox worker
//!
//! State machine:
//!
//! ```text
//! Initializing ──ready──► Ready ◄─┐ (any number of runs, crashed runs included)
//!      │                    └─────┘
//!      └──load failure──► Failed   (terminal, every run short-circuits)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error};

use super::interpreter::{Interpreter, RhaiInterpreter};
use super::protocol::{WorkerMessage, WorkerRequest};
use super::worker::{self, Envelope};
use super::{ExecutionResult, SandboxError};
use crate::config::SandboxLimits;

/// Lifecycle state of the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// Interpreter still loading
    Initializing,
    /// Serving runs
    Ready,
    /// Interpreter failed to load (terminal)
    Failed(String),
}

/// Handle to a single background sandbox worker.
///
/// Dropping the channel shuts the worker down once its current run ends.
///
/// # Example
///
/// ```rust,no_run
/// use concept_trainer::config::SandboxLimits;
/// use concept_trainer::sandbox::{ChannelState, ExecutionChannel};
///
/// # async fn example() {
/// let channel = ExecutionChannel::rhai(SandboxLimits::default());
/// assert_eq!(channel.ready().await, ChannelState::Ready);
///
/// let result = channel.run("print(6 * 7);", "arithmetic").await;
/// assert_eq!(result.output(), "42\n");
/// # }
/// ```
#[derive(Debug)]
pub struct ExecutionChannel {
    state: watch::Receiver<ChannelState>,
    requests: mpsc::UnboundedSender<Envelope>,
    next_id: AtomicU64,
}

impl ExecutionChannel {
    /// Start a worker whose interpreter is built by `factory` on the
    /// worker thread.
    ///
    /// Returns immediately in [`ChannelState::Initializing`]. A factory
    /// error or panic moves the channel to [`ChannelState::Failed`].
    #[must_use]
    pub fn spawn<I, F>(factory: F) -> Self
    where
        I: Interpreter + 'static,
        F: FnOnce() -> Result<I, String> + Send + 'static,
    {
        let (state_tx, state_rx) = watch::channel(ChannelState::Initializing);
        let state_tx = Arc::new(state_tx);
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();

        if let Err(e) = worker::spawn(factory, Arc::clone(&state_tx), requests_rx) {
            worker::handshake(
                &state_tx,
                &WorkerMessage::Error {
                    error: format!("could not start worker thread: {e}"),
                },
            );
        }

        Self {
            state: state_rx,
            requests: requests_tx,
            next_id: AtomicU64::new(1),
        }
    }

    /// Start a worker running the embedded Rhai interpreter.
    #[must_use]
    pub fn rhai(limits: SandboxLimits) -> Self {
        Self::spawn(move || Ok(RhaiInterpreter::new(&limits)))
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state.borrow().clone()
    }

    /// Wait for the handshake to finish and return the terminal state.
    pub async fn ready(&self) -> ChannelState {
        let mut state = self.state.clone();
        let result = state
            .wait_for(|s| *s != ChannelState::Initializing)
            .await
            .map(|s| s.clone());
        result.unwrap_or_else(|_| {
            ChannelState::Failed("sandbox worker exited during initialization".to_string())
        })
    }

    /// Run one submission.
    ///
    /// Never blocks: before the handshake this resolves immediately with
    /// [`SandboxError::NotReady`] and the worker is not contacted. After a
    /// failed handshake it resolves with [`SandboxError::InitFailure`].
    ///
    /// `concept_id` is only used for log correlation.
    pub async fn run(&self, code: &str, concept_id: &str) -> ExecutionResult {
        match self.state() {
            ChannelState::Initializing => {
                debug!(concept_id, "run requested before sandbox was ready");
                return ExecutionResult::InfrastructureError(SandboxError::NotReady);
            }
            ChannelState::Failed(reason) => {
                return ExecutionResult::InfrastructureError(SandboxError::InitFailure(reason));
            }
            ChannelState::Ready => {}
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            request: WorkerRequest::Run {
                id,
                code: code.to_string(),
            },
            reply: reply_tx,
        };

        if self.requests.send(envelope).is_err() {
            return transport_error(id, concept_id, "sandbox worker is not running".to_string());
        }
        debug!(request_id = id, concept_id, "run dispatched");

        match reply_rx.await {
            Ok(message) => correlate(id, concept_id, message),
            Err(_) => transport_error(
                id,
                concept_id,
                "sandbox worker dropped the request without replying".to_string(),
            ),
        }
    }
}

fn correlate(id: u64, concept_id: &str, message: WorkerMessage) -> ExecutionResult {
    match message {
        WorkerMessage::Result {
            id: reply_id,
            output,
            error,
        } if reply_id == id => {
            let result = ExecutionResult::from_parts(output, error);
            if let ExecutionResult::Failure { error, .. } = &result {
                debug!(request_id = id, concept_id, error = %error, "user code failed");
            }
            result
        }
        WorkerMessage::Result { id: reply_id, .. } => transport_error(
            id,
            concept_id,
            format!("reply for request {reply_id} received while waiting for {id}"),
        ),
        other => transport_error(
            id,
            concept_id,
            format!("unexpected '{}' message in reply to request {id}", other.kind()),
        ),
    }
}

fn transport_error(id: u64, concept_id: &str, reason: String) -> ExecutionResult {
    error!(request_id = id, concept_id, reason = %reason, "sandbox transport error");
    ExecutionResult::InfrastructureError(SandboxError::Transport(reason))
}
