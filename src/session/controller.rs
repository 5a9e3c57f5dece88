//! Session Controller - mediates between the UI, the catalog, the editor,
//! the execution channel and the learning engine
//!
//! ```text
//! editor text ──► ExecutionChannel::run ──► Concept::validate
//!                                                │
//!        SessionContext.assistance_used ─────────┤
//!                                                ▼
//!                                 LearningEngine::record_attempt
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{CodeEditor, DraftAutosaver, SessionContext};
use crate::catalog::{group_unlearned, CategoryGroup, Concept, ConceptFilter, ConceptSource};
use crate::clock::Clock;
use crate::config::TrainerConfig;
use crate::kv::KvStore;
use crate::progress::{ConceptRecord, ExpirySweeper, LearningEngine, TimeRemaining};
use crate::sandbox::{ExecutionChannel, ExecutionResult};
use crate::{Error, Result};

/// Documentation link used when a concept has none of its own
pub const GENERAL_DOCS_URL: &str = "https://rhai.rs/book/";

/// Where the code placed in the editor by [`SessionController::load_concept`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSource {
    /// Auto-saved draft (most recent work)
    Draft,
    /// Last successful solution
    Solution,
    /// Concept starting code
    Boilerplate,
}

impl CodeSource {
    /// Status line shown after loading
    #[must_use]
    pub const fn message(self) -> Option<&'static str> {
        match self {
            Self::Draft => Some("Draft loaded (auto-saved)"),
            Self::Solution => Some("Your solution (click Run to validate again)"),
            Self::Boilerplate => None,
        }
    }
}

/// Result of opening a concept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConcept {
    /// Concept id
    pub concept_id: String,
    /// Display name
    pub name: String,
    /// Instruction text
    pub instruction: String,
    /// Origin of the editor contents
    pub source: CodeSource,
    /// Whether "show tests" applies
    pub has_tests: bool,
    /// Whether "reveal answer" applies
    pub has_answer: bool,
}

/// Documentation link with its label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocsLink {
    /// Target URL
    pub url: String,
    /// Link text
    pub label: &'static str,
}

/// Help content for the open concept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeachingPanel {
    /// Concept name
    pub title: String,
    /// Detailed explanation
    pub explanation: String,
    /// Code example
    pub example: String,
    /// When to use it
    pub use_case: String,
    /// Prerequisite names (ids when not in the catalog)
    pub prerequisites: Vec<String>,
    /// Related topic names (ids when not in the catalog)
    pub related_topics: Vec<String>,
    /// Where to read more
    pub docs: DocsLink,
}

/// Outcome of [`SessionController::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Validated verdict
    pub result: ExecutionResult,
    /// Record created by this run, if it taught the concept
    pub record: Option<ConceptRecord>,
}

impl RunOutcome {
    /// Check whether the run marked the concept learned
    #[must_use]
    pub const fn learned(&self) -> bool {
        self.record.is_some()
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            ExecutionResult::Success { output } => write!(f, "✓ Success!\n\nOutput:\n{output}"),
            ExecutionResult::Failure { error, output } => {
                write!(f, "✗ Failed\n\n{error}\n\nOutput:\n{output}")
            }
            ExecutionResult::InfrastructureError(e) => write!(f, "Error: {e}"),
        }
    }
}

/// What the host has to redraw after a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionRefresh {
    /// No concept expired
    Nothing,
    /// The learned and unlearned lists changed
    Views,
    /// The lists changed and the open concept is no longer learned
    CurrentConcept,
}

impl EvictionRefresh {
    /// Check if any view needs re-rendering
    #[must_use]
    pub const fn needs_render(self) -> bool {
        !matches!(self, Self::Nothing)
    }
}

/// Row of the learned list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnedEntry {
    /// Concept id
    pub concept_id: String,
    /// Display name
    pub name: String,
    /// Learned with help
    pub assisted: bool,
    /// Countdown
    pub time_remaining: TimeRemaining,
}

/// One user's tutoring session.
///
/// Holds the only [`SessionContext`]; every state change to it goes
/// through the methods below.
pub struct SessionController<S, C, E> {
    engine: Arc<LearningEngine<S, C>>,
    channel: ExecutionChannel,
    editor: E,
    concepts: Vec<Concept>,
    context: SessionContext,
    filter: ConceptFilter,
    autosaver: DraftAutosaver,
    sweep_interval: Duration,
    sweeper: Option<ExpirySweeper>,
}

impl<S, C, E> SessionController<S, C, E>
where
    S: KvStore + 'static,
    C: Clock + 'static,
    E: CodeEditor,
{
    /// Fetch the catalog and assemble a session.
    ///
    /// Must be called inside a Tokio runtime (the draft autosaver is
    /// spawned here).
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be fetched
    pub async fn new(
        source: &impl ConceptSource,
        engine: Arc<LearningEngine<S, C>>,
        channel: ExecutionChannel,
        editor: E,
        config: &TrainerConfig,
    ) -> Result<Self> {
        let concepts = source.fetch_concepts().await?;
        info!(concepts = concepts.len(), "catalog loaded");

        let autosaver = DraftAutosaver::spawn(engine.store().clone(), config.draft_quiet_period());

        Ok(Self {
            engine,
            channel,
            editor,
            concepts,
            context: SessionContext::new(),
            filter: ConceptFilter::default(),
            autosaver,
            sweep_interval: config.sweep_interval(),
            sweeper: None,
        })
    }

    /// Sweep once, then start the periodic sweeper.
    ///
    /// Returns the ids evicted by the initial sweep and the receiver for
    /// later evictions (feed them to [`apply_evictions`](Self::apply_evictions)).
    ///
    /// # Errors
    ///
    /// Returns error if the initial sweep fails
    pub async fn start(&mut self) -> Result<(Vec<String>, mpsc::UnboundedReceiver<Vec<String>>)> {
        let evicted = self.engine.sweep_expired_ids().await?;
        let (sweeper, evictions) = ExpirySweeper::spawn(Arc::clone(&self.engine), self.sweep_interval);
        if let Some(previous) = self.sweeper.replace(sweeper) {
            previous.stop();
        }
        Ok((evicted, evictions))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The learning engine
    #[must_use]
    pub const fn engine(&self) -> &Arc<LearningEngine<S, C>> {
        &self.engine
    }

    /// The execution channel
    #[must_use]
    pub const fn channel(&self) -> &ExecutionChannel {
        &self.channel
    }

    /// The editor
    #[must_use]
    pub const fn editor(&self) -> &E {
        &self.editor
    }

    /// The editor, for the host to apply user edits
    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    /// Attempt state
    #[must_use]
    pub const fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Catalog
    #[must_use]
    pub fn concepts(&self) -> &[Concept] {
        &self.concepts
    }

    /// Filter applied by [`unlearned_view`](Self::unlearned_view)
    #[must_use]
    pub const fn filter(&self) -> &ConceptFilter {
        &self.filter
    }

    /// Filter, for toggling difficulties or setting the search
    pub fn filter_mut(&mut self) -> &mut ConceptFilter {
        &mut self.filter
    }

    /// The open concept
    #[must_use]
    pub fn current_concept(&self) -> Option<&Concept> {
        self.context.current().and_then(|id| self.concept(id))
    }

    /// Look up a concept by id
    #[must_use]
    pub fn concept(&self, concept_id: &str) -> Option<&Concept> {
        self.concepts.iter().find(|c| c.id == concept_id)
    }

    fn require_current(&self) -> Result<Concept> {
        self.current_concept()
            .cloned()
            .ok_or(Error::NoConceptSelected)
    }

    fn name_of(&self, concept_id: &str) -> String {
        self.concept(concept_id)
            .map_or_else(|| concept_id.to_string(), |c| c.name.clone())
    }

    // ------------------------------------------------------------------
    // Concept lifecycle
    // ------------------------------------------------------------------

    /// Open a concept.
    ///
    /// The editor gets the draft if one exists, otherwise the last
    /// solution, otherwise the boilerplate. Assistance is reset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConceptNotFound`] for unknown ids, or a storage error
    pub async fn load_concept(&mut self, concept_id: &str) -> Result<LoadedConcept> {
        let concept = self
            .concept(concept_id)
            .cloned()
            .ok_or_else(|| Error::ConceptNotFound(concept_id.to_string()))?;

        // Edits to the previous concept land before we read this one
        self.autosaver.flush().await?;

        let store = self.engine.store();
        let (code, source) = if let Some(draft) = store.draft(&concept.id).await? {
            (draft, CodeSource::Draft)
        } else if let Some(solution) = store.solution(&concept.id).await? {
            (solution, CodeSource::Solution)
        } else {
            (concept.boilerplate.clone(), CodeSource::Boilerplate)
        };

        self.context.open(&concept.id);
        self.editor.set_text(&code);
        debug!(concept_id = %concept.id, ?source, "concept loaded");

        Ok(LoadedConcept {
            has_tests: !concept.test_cases.is_empty(),
            has_answer: concept.answer().is_some(),
            concept_id: concept.id,
            name: concept.name,
            instruction: concept.instruction,
            source,
        })
    }

    /// Open the concept `delta` positions away by concept number.
    ///
    /// Returns `None` when nothing is open or no concept has that number.
    ///
    /// # Errors
    ///
    /// Returns error if loading fails
    pub async fn navigate(&mut self, delta: i64) -> Result<Option<LoadedConcept>> {
        let Some(current) = self.current_concept() else {
            return Ok(None);
        };
        let target = i64::from(current.number) + delta;
        let Some(id) = self
            .concepts
            .iter()
            .find(|c| i64::from(c.number) == target)
            .map(|c| c.id.clone())
        else {
            return Ok(None);
        };
        self.load_concept(&id).await.map(Some)
    }

    /// Put the reference answer in the editor.
    ///
    /// Counts as assistance unless the concept is already learned.
    /// Returns `None` when the concept has no answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoConceptSelected`], or a storage error
    pub async fn reveal_answer(&mut self) -> Result<Option<&'static str>> {
        let concept = self.require_current()?;
        let Some(answer) = concept.answer() else {
            return Ok(None);
        };

        let learned = self.engine.is_learned(&concept.id).await?;
        self.context.flag_assistance(learned);
        self.editor.set_text(answer);
        self.on_editor_change()?;

        Ok(Some("Answer loaded. Click \"Run Code\" to test it."))
    }

    /// Build the help panel for the open concept.
    ///
    /// Counts as assistance unless the concept is already learned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoConceptSelected`], or a storage error
    pub async fn open_teaching_panel(&mut self) -> Result<TeachingPanel> {
        let concept = self.require_current()?;

        let learned = self.engine.is_learned(&concept.id).await?;
        self.context.flag_assistance(learned);

        let or_default = |field: &Option<String>, default: &str| {
            field
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        let docs = concept.docs_url().map_or_else(
            || DocsLink {
                url: GENERAL_DOCS_URL.to_string(),
                label: "General Documentation →",
            },
            |url| DocsLink {
                url: url.to_string(),
                label: "Official Documentation →",
            },
        );

        Ok(TeachingPanel {
            title: concept.name.clone(),
            explanation: or_default(&concept.explanation, "Detailed explanation coming soon..."),
            example: or_default(&concept.example, "// Example coming soon"),
            use_case: or_default(&concept.use_case, "Use case information coming soon..."),
            prerequisites: concept.prerequisites.iter().map(|id| self.name_of(id)).collect(),
            related_topics: concept.related_topics.iter().map(|id| self.name_of(id)).collect(),
            docs,
        })
    }

    /// Render the open concept's test cases, or `None` if it has none.
    #[must_use]
    pub fn show_tests(&self) -> Option<String> {
        let concept = self.current_concept()?;
        if concept.test_cases.is_empty() {
            return None;
        }
        let mut text = String::from("Test Cases:\n\n");
        for (index, case) in concept.test_cases.iter().enumerate() {
            text.push_str(&format!(
                "Test {}:\n  Input: {}\n  Expected: {}\n\n",
                index + 1,
                case.input,
                case.expected
            ));
        }
        Some(text)
    }

    /// Restore the boilerplate and clear assistance.
    ///
    /// The stored draft is left alone; it is replaced by the next edit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoConceptSelected`], or [`Error::QueueClosed`]
    pub fn reset_code(&mut self) -> Result<()> {
        let concept = self.require_current()?;
        self.editor.set_text(&concept.boilerplate);
        self.context.reset_assistance();
        self.on_editor_change()
    }

    /// Run the editor contents against the open concept.
    ///
    /// A validated success creates a record (with the halved window if
    /// help was used), clears the draft, stores the solution and
    /// consumes the assistance flag. Anything else leaves progress
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoConceptSelected`], or a storage error. Sandbox
    /// failures are reported inside the outcome.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        let concept = self.require_current()?;
        // A pending write must not resurrect the draft after a success clears it
        self.autosaver.flush().await?;

        let code = self.editor.text();
        let result = concept.validate(self.channel.run(&code, &concept.id).await);

        let record = self
            .engine
            .record_attempt(&concept.id, &result, &code, self.context.assistance_used())
            .await?;
        if record.is_some() {
            self.context.take_assistance();
        }

        Ok(RunOutcome { result, record })
    }

    /// Forget a concept's record, solution and draft.
    ///
    /// Confirmation is the caller's job. If the concept is open, the
    /// editor is reset to the boilerplate and a status line is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConceptNotFound`] for unknown ids, or a storage error
    pub async fn unlearn(&mut self, concept_id: &str) -> Result<Option<String>> {
        let concept = self
            .concept(concept_id)
            .cloned()
            .ok_or_else(|| Error::ConceptNotFound(concept_id.to_string()))?;
        let is_open = self.context.current() == Some(concept_id);
        if is_open {
            self.autosaver.cancel()?;
        }

        self.engine.unlearn(concept_id).await?;

        if !is_open {
            return Ok(None);
        }
        self.editor.set_text(&concept.boilerplate);
        self.context.reset_assistance();
        Ok(Some(format!(
            "✓ Unlearned \"{}\". The concept has been reset to boilerplate.",
            concept.name
        )))
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Learned concepts with their countdowns.
    ///
    /// Records whose concept is missing from the catalog are skipped.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn learned_overview(&self) -> Result<Vec<LearnedEntry>> {
        let now = self.engine.clock().now();
        Ok(self
            .engine
            .learned()
            .await?
            .into_iter()
            .filter_map(|(id, record)| {
                let concept = self.concept(&id)?;
                Some(LearnedEntry {
                    name: concept.name.clone(),
                    concept_id: id,
                    assisted: record.assisted(),
                    time_remaining: record.time_remaining(now),
                })
            })
            .collect())
    }

    /// Unlearned concepts passing the filter, grouped by category.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn unlearned_view(&self) -> Result<Vec<CategoryGroup>> {
        let learned: HashSet<String> = self
            .engine
            .learned()
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        Ok(group_unlearned(&self.concepts, &self.filter, &learned))
    }

    // ------------------------------------------------------------------
    // Settings and notifications
    // ------------------------------------------------------------------

    /// Change the retention window for future records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExpiryDays`] (nothing changes) or a storage error
    pub async fn set_default_expiry_days(&self, days: u32) -> Result<()> {
        self.engine.set_default_expiry_days(days).await
    }

    /// Wipe every record, draft, solution and setting and close the open
    /// concept.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn reset_all_data(&mut self) -> Result<()> {
        self.autosaver.cancel()?;
        self.engine.reset_all().await?;
        self.context.close();
        Ok(())
    }

    /// Tell the session the editor text changed.
    ///
    /// Schedules a draft save for the open concept. Does nothing when no
    /// concept is open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if the autosaver stopped
    pub fn on_editor_change(&self) -> Result<()> {
        let Some(concept) = self.current_concept() else {
            return Ok(());
        };
        self.autosaver
            .notify(&concept.id, &self.editor.text(), &concept.boilerplate)
    }

    /// Handle ids evicted by the sweeper and report what the host has to
    /// refresh.
    #[must_use]
    pub fn apply_evictions(&self, evicted: &[String]) -> EvictionRefresh {
        if evicted.is_empty() {
            return EvictionRefresh::Nothing;
        }
        let current_evicted = self
            .context
            .current()
            .is_some_and(|id| evicted.iter().any(|e| e == id));
        info!(evicted = evicted.len(), current_evicted, "concepts expired");
        if current_evicted {
            EvictionRefresh::CurrentConcept
        } else {
            EvictionRefresh::Views
        }
    }
}
