//! Periodic expiry sweep
//!
//! Jidoka: expiry is enforced by the engine on a timer, not left to
//! whichever screen happens to render next.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::LearningEngine;
use crate::clock::Clock;
use crate::kv::KvStore;

/// Background task that sweeps expired records on a fixed interval.
///
/// Each non-empty sweep sends the evicted concept ids on the returned
/// receiver so the session can re-render. The task stops when the
/// receiver is dropped, on [`stop`](Self::stop), or when the sweeper is
/// dropped.
#[derive(Debug)]
pub struct ExpirySweeper {
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    /// Spawn the sweep loop on the current Tokio runtime.
    ///
    /// The first sweep happens after one full `interval`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime or with a zero interval
    #[must_use]
    pub fn spawn<S, C>(
        engine: Arc<LearningEngine<S, C>>,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Vec<String>>)
    where
        S: KvStore + 'static,
        C: Clock + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() yields immediately; skip that tick
            ticker.tick().await;

            debug!(?interval, "expiry sweeper started");
            loop {
                ticker.tick().await;
                match engine.sweep_expired_ids().await {
                    Ok(evicted) if evicted.is_empty() => {}
                    Ok(evicted) => {
                        if tx.send(evicted).is_err() {
                            debug!("expiry sweeper receiver dropped, stopping");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "expiry sweep failed"),
                }
            }
        });

        (Self { handle }, rx)
    }

    /// Stop the sweep loop.
    pub fn stop(self) {
        self.handle.abort();
    }

    /// Check if the loop is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
