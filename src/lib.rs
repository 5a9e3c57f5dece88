//! # Concept-Trainer: Interactive Tutor Core
//!
//! **Version**: 0.1.0
//!
//! Concept-Trainer runs untrusted exercise submissions in an embedded
//! sandbox and tracks which concepts a learner has mastered, with a
//! retention window that decays faster when help was used.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: a sandbox failure stops at the channel boundary and
//!   becomes a value; it never aborts the session
//! - **Poka-Yoke**: settings are validated once at the boundary, records
//!   are immutable and replaced wholesale
//! - **Genchi Genbutsu**: expiry is recomputed from each stored record
//!   against the clock, never from a cached list
//! - **Muda elimination**: one key per concept, so the sweep and a single
//!   mutation never contend on a shared blob
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use concept_trainer::catalog::StaticCatalog;
//! use concept_trainer::clock::SystemClock;
//! use concept_trainer::config::TrainerConfig;
//! use concept_trainer::kv::MemoryKvStore;
//! use concept_trainer::progress::{LearningEngine, ProgressStore};
//! use concept_trainer::sandbox::ExecutionChannel;
//! use concept_trainer::session::{BufferEditor, SessionController};
//!
//! # async fn example(catalog: StaticCatalog) -> concept_trainer::Result<()> {
//! let config = TrainerConfig::default();
//! let store = ProgressStore::new(MemoryKvStore::new());
//! let engine = Arc::new(LearningEngine::load(store, SystemClock, &config).await?);
//! let channel = ExecutionChannel::rhai(*config.sandbox());
//!
//! let mut session =
//!     SessionController::new(&catalog, engine, channel, BufferEditor::default(), &config)
//!         .await?;
//! session.start().await?;
//!
//! session.load_concept("hello-world").await?;
//! let outcome = session.run().await?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod kv;
pub mod progress;
pub mod sandbox;
pub mod session;

pub use error::{Error, Result};
