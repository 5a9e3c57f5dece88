//! Error types for concept-trainer
//!
//! Sandbox failures are not listed here: they travel as values inside
//! [`crate::sandbox::ExecutionResult`] so a broken run never aborts the
//! session.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Concept-trainer error types
#[derive(Error, Debug)]
pub enum Error {
    /// Retention window outside the accepted range
    #[error("Invalid expiry setting: {0} days\nPlease enter a number between 1 and 365")]
    InvalidExpiryDays(u32),

    /// Concept id not present in the catalog
    #[error("Concept not found: {0}")]
    ConceptNotFound(String),

    /// Operation needs an open concept
    #[error("No concept selected\nPlease select a concept first")]
    NoConceptSelected,

    /// Key-value store error (bad encoding, backend failure)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// JSON encode/decode error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Background task queue closed
    #[error("Background task queue closed (receiver dropped)")]
    QueueClosed,

    /// Generic error
    #[error("{0}")]
    Other(String),
}
