//! Debounced draft persistence
//!
//! Every edit restarts a quiet-period timer; the latest text is written
//! once the editor has been idle for the whole period.
//!
//! ```text
//! notify ─┬─ notify ─┬─ notify ──── quiet ────► save_draft(latest)
//!         └ restart  └ restart
//! ```

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::kv::KvStore;
use crate::progress::ProgressStore;
use crate::{Error, Result};

#[derive(Debug)]
struct PendingDraft {
    concept_id: String,
    code: String,
    boilerplate: String,
    deadline: Instant,
}

#[derive(Debug)]
enum Command {
    Edit {
        concept_id: String,
        code: String,
        boilerplate: String,
    },
    Cancel,
    Flush(oneshot::Sender<()>),
}

/// Commit-after-quiet-period draft writer.
///
/// Only one draft is pending at a time: an edit for another concept
/// replaces it. Dropping the autosaver commits whatever is pending and
/// stops the task.
#[derive(Debug)]
pub struct DraftAutosaver {
    commands: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl DraftAutosaver {
    /// Spawn the autosave task on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime
    #[must_use]
    pub fn spawn<S: KvStore + 'static>(store: ProgressStore<S>, quiet_period: Duration) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(store, quiet_period, rx));
        Self { commands, handle }
    }

    /// Record an edit. The draft is written after the quiet period unless
    /// another edit, a cancel, or a flush arrives first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if the task has stopped
    pub fn notify(&self, concept_id: &str, code: &str, boilerplate: &str) -> Result<()> {
        self.send(Command::Edit {
            concept_id: concept_id.to_string(),
            code: code.to_string(),
            boilerplate: boilerplate.to_string(),
        })
    }

    /// Drop the pending draft without writing it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if the task has stopped
    pub fn cancel(&self) -> Result<()> {
        self.send(Command::Cancel)
    }

    /// Write the pending draft now and wait until it is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if the task has stopped
    pub async fn flush(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Flush(ack))?;
        done.await.map_err(|_| Error::QueueClosed)
    }

    /// Check if the task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::QueueClosed)
    }
}

async fn run<S: KvStore>(
    store: ProgressStore<S>,
    quiet_period: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<PendingDraft> = None;

    loop {
        let command = match pending.as_ref().map(|p| p.deadline) {
            Some(deadline) => tokio::select! {
                command = commands.recv() => command,
                () = tokio::time::sleep_until(deadline) => {
                    if let Some(draft) = pending.take() {
                        commit(&store, draft).await;
                    }
                    continue;
                }
            },
            None => commands.recv().await,
        };

        match command {
            Some(Command::Edit {
                concept_id,
                code,
                boilerplate,
            }) => {
                pending = Some(PendingDraft {
                    concept_id,
                    code,
                    boilerplate,
                    deadline: Instant::now() + quiet_period,
                });
            }
            Some(Command::Cancel) => {
                if let Some(draft) = pending.take() {
                    debug!(concept_id = %draft.concept_id, "pending draft discarded");
                }
            }
            Some(Command::Flush(ack)) => {
                if let Some(draft) = pending.take() {
                    commit(&store, draft).await;
                }
                let _ = ack.send(());
            }
            None => {
                if let Some(draft) = pending.take() {
                    commit(&store, draft).await;
                }
                debug!("draft autosaver stopped");
                break;
            }
        }
    }
}

async fn commit<S: KvStore>(store: &ProgressStore<S>, draft: PendingDraft) {
    if draft.code == draft.boilerplate {
        debug!(concept_id = %draft.concept_id, "draft matches boilerplate, not saved");
        return;
    }
    match store.save_draft(&draft.concept_id, &draft.code).await {
        Ok(()) => debug!(concept_id = %draft.concept_id, "draft saved"),
        Err(e) => warn!(concept_id = %draft.concept_id, error = %e, "draft save failed"),
    }
}
