//! Error types for the `factionsd` binary.
//!
//! [`EngineError`] wraps every failure mode of startup and shutdown so
//! `main` can propagate with `?`.

/// Top-level error for the daemon.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: factions_core::ConfigError,
    },

    /// The tick scheduler rejected the schedule.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: factions_core::ClockError,
    },

    /// Loading or saving realm state failed.
    #[error("storage error: {source}")]
    Db {
        /// The underlying storage error.
        #[from]
        source: factions_db::DbError,
    },

    /// The startup audit hit a broken invariant.
    #[error("audit error: {source}")]
    Audit {
        /// The underlying violation.
        #[from]
        source: factions_core::InvariantViolation,
    },

    /// The writer task could not be reached.
    #[error("dispatch error: {source}")]
    Dispatch {
        /// The underlying dispatch error.
        #[from]
        source: factions_core::DispatchError,
    },

    /// A spawned task panicked or was cancelled.
    #[error("task error: {message}")]
    Task {
        /// Description of the task failure.
        message: String,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
