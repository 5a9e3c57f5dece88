//! Sandbox worker thread
//!
//! The interpreter is built and driven on a dedicated OS thread so a
//! long evaluation never stalls the async runtime. The thread speaks the
//! [`protocol`](super::protocol): one handshake message, then one reply
//! per request.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info};

use super::channel::ChannelState;
use super::interpreter::Interpreter;
use super::protocol::{WorkerMessage, WorkerRequest};

/// A request plus the slot its single reply goes into.
pub(crate) struct Envelope {
    pub(crate) request: WorkerRequest,
    pub(crate) reply: oneshot::Sender<WorkerMessage>,
}

/// Spawn the worker thread.
///
/// `factory` runs on the worker thread; its result decides the handshake.
pub(crate) fn spawn<I, F>(
    factory: F,
    state: Arc<watch::Sender<ChannelState>>,
    requests: mpsc::UnboundedReceiver<Envelope>,
) -> std::io::Result<JoinHandle<()>>
where
    I: Interpreter + 'static,
    F: FnOnce() -> Result<I, String> + Send + 'static,
{
    thread::Builder::new()
        .name("sandbox-worker".to_string())
        .spawn(move || run(factory, &state, requests))
}

/// Apply the one-shot handshake message to the channel state.
pub(crate) fn handshake(state: &watch::Sender<ChannelState>, message: &WorkerMessage) {
    match message {
        WorkerMessage::Ready => {
            info!("sandbox ready");
            state.send_replace(ChannelState::Ready);
        }
        WorkerMessage::Error { error: reason } => {
            error!(reason = %reason, "sandbox failed to initialize");
            state.send_replace(ChannelState::Failed(reason.clone()));
        }
        WorkerMessage::Result { .. } => {
            error!("result message received during handshake");
            state.send_replace(ChannelState::Failed(
                "worker replied before completing its handshake".to_string(),
            ));
        }
    }
}

fn run<I, F>(
    factory: F,
    state: &watch::Sender<ChannelState>,
    mut requests: mpsc::UnboundedReceiver<Envelope>,
) where
    I: Interpreter,
    F: FnOnce() -> Result<I, String>,
{
    let mut interpreter = match panic::catch_unwind(AssertUnwindSafe(factory)) {
        Ok(Ok(interpreter)) => interpreter,
        Ok(Err(reason)) => {
            handshake(state, &WorkerMessage::Error { error: reason });
            return;
        }
        Err(payload) => {
            let reason = format!("interpreter panicked while loading: {}", panic_message(&*payload));
            handshake(state, &WorkerMessage::Error { error: reason });
            return;
        }
    };
    handshake(state, &WorkerMessage::Ready);

    while let Some(Envelope { request, reply }) = requests.blocking_recv() {
        let message = serve(&mut interpreter, request);
        if reply.send(message).is_err() {
            debug!("caller stopped waiting before the result arrived");
        }
    }
    debug!("sandbox worker shutting down");
}

fn serve<I: Interpreter>(interpreter: &mut I, request: WorkerRequest) -> WorkerMessage {
    match request {
        WorkerRequest::Run { id, code } => {
            match panic::catch_unwind(AssertUnwindSafe(|| interpreter.evaluate(&code))) {
                Ok(evaluation) => WorkerMessage::Result {
                    id,
                    output: evaluation.output,
                    error: match evaluation.error {
                        Some(e) if e.is_empty() => "Execution error: unknown error".to_string(),
                        Some(e) => e,
                        None => String::new(),
                    },
                },
                Err(payload) => WorkerMessage::Result {
                    id,
                    output: String::new(),
                    error: format!("Execution error: {}", panic_message(&*payload)),
                },
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::Evaluation;

    struct Echo;

    impl Interpreter for Echo {
        fn evaluate(&mut self, code: &str) -> Evaluation {
            Evaluation {
                output: code.to_string(),
                error: None,
            }
        }
    }

    #[test]
    fn test_serve_echoes_id() {
        let message = serve(
            &mut Echo,
            WorkerRequest::Run {
                id: 11,
                code: "hi".to_string(),
            },
        );
        assert_eq!(
            message,
            WorkerMessage::Result {
                id: 11,
                output: "hi".to_string(),
                error: String::new()
            }
        );
    }

    #[test]
    fn test_handshake_transitions() {
        let (tx, rx) = watch::channel(ChannelState::Initializing);

        handshake(&tx, &WorkerMessage::Ready);
        assert_eq!(*rx.borrow(), ChannelState::Ready);

        let (tx, rx) = watch::channel(ChannelState::Initializing);
        handshake(
            &tx,
            &WorkerMessage::Error {
                error: "no wasm".to_string(),
            },
        );
        assert_eq!(*rx.borrow(), ChannelState::Failed("no wasm".to_string()));
    }

    #[test]
    fn test_panic_message_variants() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*payload), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");
        let payload: Box<dyn Any + Send> = Box::new(5_u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
