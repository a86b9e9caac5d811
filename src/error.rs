//! Error types for the `ragchat` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur across the retrieval-augmented pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid or missing configuration (bad config values, missing
    /// credentials, embedding model mismatch against a persisted index).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required path (corpus directory or persisted index) does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The corpus directory exists but contains no readable documents.
    #[error("corpus directory {} contains no readable documents", .0.display())]
    EmptyCorpus(PathBuf),

    /// The persisted index store is unreadable or internally inconsistent.
    #[error("corrupt index store: {0}")]
    CorruptIndex(String),

    /// An embedding or language-model provider call failed.
    #[error("provider error ({provider}): {message}")]
    Provider {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
