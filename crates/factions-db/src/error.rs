//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! I/O and [`serde_json`] errors.

use factions_types::EntityKind;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored key could not be parsed back into its identifier.
    #[error("Corrupt key {key:?} in {kind} collection")]
    CorruptKey {
        /// The collection holding the key.
        kind: EntityKind,
        /// The unparseable key.
        key: String,
    },
}
