//! Learning Progress Engine - decides when a concept is learned and for how long
//!
//! Retention rule:
//!
//! ```text
//! expiry_days = assisted ? max(1, floor(default / 2)) : default
//! ```
//!
//! A soft spaced-repetition heuristic: concepts solved with help decay in
//! half the time. Nothing is cached; every decision is recomputed from the
//! stored record and the injected clock.

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, info, warn};

use super::{ConceptRecord, ProgressStore, TimeRemaining};
use crate::clock::{Clock, SystemClock};
use crate::config::{validate_expiry_days, Settings, TrainerConfig};
use crate::kv::KvStore;
use crate::sandbox::ExecutionResult;
use crate::Result;

/// Retention window for a new record.
///
/// Halved (rounded down, never below one day) when assistance was used.
#[must_use]
pub fn expiry_days_for(default_expiry_days: u32, assistance_used: bool) -> u32 {
    if assistance_used {
        (default_expiry_days / 2).max(1)
    } else {
        default_expiry_days
    }
}

/// Learning progress engine
pub struct LearningEngine<S, C = SystemClock> {
    store: ProgressStore<S>,
    clock: C,
    configured_expiry_days: u32,
    default_expiry_days: AtomicU32,
}

impl<S: KvStore> LearningEngine<S, SystemClock> {
    /// Create an engine on the system clock with the default retention window
    #[must_use]
    pub fn new(store: ProgressStore<S>) -> Self {
        Self::with_clock(store, SystemClock, &TrainerConfig::default())
    }
}

impl<S: KvStore, C: Clock> LearningEngine<S, C> {
    /// Create an engine with an explicit clock and configuration
    #[must_use]
    pub fn with_clock(store: ProgressStore<S>, clock: C, config: &TrainerConfig) -> Self {
        Self {
            store,
            clock,
            configured_expiry_days: config.default_expiry_days(),
            default_expiry_days: AtomicU32::new(config.default_expiry_days()),
        }
    }

    /// Create an engine and apply persisted settings over the configured default.
    ///
    /// Stored settings that fail validation are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the settings cannot be read
    pub async fn load(store: ProgressStore<S>, clock: C, config: &TrainerConfig) -> Result<Self> {
        let engine = Self::with_clock(store, clock, config);
        if let Some(settings) = engine.store.settings().await? {
            match validate_expiry_days(settings.default_expiry_days) {
                Ok(days) => engine.default_expiry_days.store(days, Ordering::Relaxed),
                Err(e) => debug!(error = %e, "ignoring stored settings"),
            }
        }
        Ok(engine)
    }

    /// The progress store this engine writes to
    #[must_use]
    pub const fn store(&self) -> &ProgressStore<S> {
        &self.store
    }

    /// The engine's clock
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Current retention window for unassisted solves
    #[must_use]
    pub fn default_expiry_days(&self) -> u32 {
        self.default_expiry_days.load(Ordering::Relaxed)
    }

    /// Change the retention window and persist it.
    ///
    /// Existing records keep the window they were created with.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidExpiryDays`] (state unchanged) if out
    /// of range, or a storage error
    pub async fn set_default_expiry_days(&self, days: u32) -> Result<()> {
        let days = validate_expiry_days(days)?;
        self.store
            .save_settings(&Settings {
                default_expiry_days: days,
            })
            .await?;
        self.default_expiry_days.store(days, Ordering::Relaxed);
        info!(expiry_days = days, "default expiry updated");
        Ok(())
    }

    /// Wipe all progress, drafts, solutions and settings, then fall back
    /// to the configured retention window.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn reset_all(&self) -> Result<()> {
        self.store.reset_all().await?;
        self.default_expiry_days
            .store(self.configured_expiry_days, Ordering::Relaxed);
        warn!("all progress data reset");
        Ok(())
    }

    /// Record the outcome of a run.
    ///
    /// Only a [`ExecutionResult::Success`] has an effect: a new record
    /// replaces any previous one, the draft is cleared and `code` becomes
    /// the stored solution.
    ///
    /// # Arguments
    ///
    /// * `concept_id` - Concept the code was submitted for
    /// * `result` - Verdict from the execution channel
    /// * `code` - Submitted code
    /// * `assistance_used` - Whether help was used since the concept was loaded
    ///
    /// # Returns
    ///
    /// The new record, or `None` when the result was not a success.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn record_attempt(
        &self,
        concept_id: &str,
        result: &ExecutionResult,
        code: &str,
        assistance_used: bool,
    ) -> Result<Option<ConceptRecord>> {
        if !result.is_success() {
            debug!(concept_id, "attempt did not succeed, progress unchanged");
            return Ok(None);
        }

        let expiry_days = expiry_days_for(self.default_expiry_days(), assistance_used);
        let record = ConceptRecord::new(self.clock.now(), expiry_days, assistance_used);

        self.store.save_record(concept_id, &record).await?;
        self.store.clear_draft(concept_id).await?;
        self.store.save_solution(concept_id, code).await?;

        info!(
            concept_id,
            expiry_days,
            assisted = assistance_used,
            "concept learned"
        );
        Ok(Some(record))
    }

    /// Forget a concept: record, solution and draft.
    ///
    /// Confirmation is the caller's job; this always deletes.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn unlearn(&self, concept_id: &str) -> Result<()> {
        self.store.forget(concept_id).await?;
        info!(concept_id, "concept unlearned");
        Ok(())
    }

    /// Evict every expired record. Returns whether anything was evicted.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn sweep_expired(&self) -> Result<bool> {
        Ok(!self.sweep_expired_ids().await?.is_empty())
    }

    /// Evict every expired record and return the evicted concept ids.
    ///
    /// Each record is judged inside its own atomic update at evaluation
    /// time; no expiry list is computed up front.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn sweep_expired_ids(&self) -> Result<Vec<String>> {
        let mut evicted = Vec::new();
        for id in self.store.record_ids().await? {
            if self.store.evict_if_expired(&id, self.clock.now()).await? {
                evicted.push(id);
            }
        }
        if !evicted.is_empty() {
            info!(evicted = evicted.len(), "expired concepts swept");
        }
        Ok(evicted)
    }

    /// Countdown for a concept, or `None` if it has no record.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn time_remaining(&self, concept_id: &str) -> Result<Option<TimeRemaining>> {
        Ok(self
            .store
            .record(concept_id)
            .await?
            .map(|record| record.time_remaining(self.clock.now())))
    }

    /// Learned means a record exists and has not expired yet.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn is_learned(&self, concept_id: &str) -> Result<bool> {
        Ok(self
            .store
            .record(concept_id)
            .await?
            .is_some_and(|record| !record.is_expired(self.clock.now())))
    }

    /// Every stored record, sorted by concept id (expired ones included
    /// until the next sweep).
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn learned(&self) -> Result<Vec<(String, ConceptRecord)>> {
        self.store.records().await
    }
}
