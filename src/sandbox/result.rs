//! Execution verdicts

use thiserror::Error;

/// Infrastructure failures. These are never the user's fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// Run attempted before the interpreter finished loading
    #[error("Sandbox not ready\nThe interpreter is still loading, try again in a moment")]
    NotReady,

    /// Interpreter failed to load (sticky for the channel's lifetime)
    #[error("Sandbox failed to initialize: {0}")]
    InitFailure(String),

    /// The worker's reply channel broke or returned malformed data
    #[error("Sandbox transport error: {0}")]
    Transport(String),
}

/// Structured verdict for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Code ran to completion without error
    Success {
        /// Captured output
        output: String,
    },
    /// Code ran but failed (syntax, runtime, or validation)
    Failure {
        /// Error reported by the sandbox
        error: String,
        /// Output produced before the failure
        output: String,
    },
    /// The sandbox itself could not serve the request
    InfrastructureError(SandboxError),
}

impl ExecutionResult {
    /// Build a verdict from the wire fields: empty `error` means success.
    #[must_use]
    pub fn from_parts(output: String, error: String) -> Self {
        if error.is_empty() {
            Self::Success { output }
        } else {
            Self::Failure { error, output }
        }
    }

    /// Check for a successful run
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Captured output (empty for infrastructure errors)
    #[must_use]
    pub fn output(&self) -> &str {
        match self {
            Self::Success { output } | Self::Failure { output, .. } => output,
            Self::InfrastructureError(_) => "",
        }
    }

    /// Error message, if the run did not succeed
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error.clone()),
            Self::InfrastructureError(e) => Some(e.to_string()),
        }
    }
}
