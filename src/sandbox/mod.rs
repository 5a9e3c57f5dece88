//! Sandboxed execution
//!
//! Untrusted submissions run on a background worker thread that owns an
//! embedded interpreter. Callers talk to it through an
//! [`ExecutionChannel`], which gates on the worker's readiness handshake
//! and turns every low-level failure into an [`ExecutionResult`] value.
//!
//! Error taxonomy:
//!
//! | Kind | Value | Sticky |
//! |---|---|---|
//! | run before handshake | `InfrastructureError(NotReady)` | no |
//! | interpreter failed to load | `InfrastructureError(InitFailure)` | yes |
//! | user code failed | `Failure { error, output }` | no |
//! | reply lost or malformed | `InfrastructureError(Transport)` | no |

mod channel;
mod interpreter;
mod protocol;
mod result;
mod worker;

pub use channel::{ChannelState, ExecutionChannel};
pub use interpreter::{Evaluation, Interpreter, RhaiInterpreter};
pub use protocol::{WorkerMessage, WorkerRequest};
pub use result::{ExecutionResult, SandboxError};
