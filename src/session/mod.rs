//! Session layer
//!
//! Glue between the host UI and the core: the explicit
//! [`SessionContext`], the [`CodeEditor`] seam, debounced draft saving
//! and the [`SessionController`] that ties them to the catalog, the
//! execution channel and the learning engine.

mod autosave;
mod context;
mod controller;
mod editor;

pub use autosave::DraftAutosaver;
pub use context::SessionContext;
pub use controller::{
    CodeSource, DocsLink, EvictionRefresh, LearnedEntry, LoadedConcept, RunOutcome,
    SessionController, TeachingPanel, GENERAL_DOCS_URL,
};
pub use editor::{BufferEditor, CodeEditor};
