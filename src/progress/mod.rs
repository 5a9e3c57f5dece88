//! Learning progress (records, persistence, decay)
//!
//! ## Schema Overview
//!
//! ```text
//! concept id ──── ConceptRecord   learned:<id>   (expires)
//!            ├─── draft           draft:<id>     (autosaved, cleared on success)
//!            └─── solution        solution:<id>  (last success, never auto-cleared)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use concept_trainer::kv::MemoryKvStore;
//! use concept_trainer::progress::{LearningEngine, ProgressStore};
//! use concept_trainer::sandbox::ExecutionResult;
//!
//! # async fn example() -> concept_trainer::Result<()> {
//! let engine = LearningEngine::new(ProgressStore::new(MemoryKvStore::new()));
//!
//! let result = ExecutionResult::Success { output: "42".into() };
//! engine.record_attempt("closures", &result, "print(42);", true).await?;
//!
//! let remaining = engine.time_remaining("closures").await?;
//! println!("{}", remaining.unwrap()); // "Expires: 6d 23h"
//! # Ok(())
//! # }
//! ```

mod engine;
mod record;
mod store;
mod sweep;

pub use engine::{expiry_days_for, LearningEngine};
pub use record::{ConceptRecord, TimeRemaining, DAY_MS};
pub use store::ProgressStore;
pub use sweep::ExpirySweeper;
