//! Power economy arithmetic for factions.
//!
//! Power is the quantity that bounds how much land a faction may hold. This
//! crate holds the pure arithmetic: how large a faction's power may grow,
//! how adjustments are clamped, how much an inactive member drains, and
//! whether a faction can afford its claims. It never touches faction
//! records directly; the realm feeds it numbers and applies the results.
//!
//! # Modules
//!
//! - [`rules`] -- [`PowerConfig`]: maximum power, clamping, claim sufficiency
//! - [`decay`] -- [`DecayConfig`]: inactivity, drain sizing, drain counters
//!
//! # Invariants
//!
//! - Base power always lands in `[0, max_power]` after [`PowerConfig::adjust`]
//!   or [`PowerConfig::set`].
//! - A drain never exceeds the faction's current power or the member's
//!   remaining cap, and drain counters never decrease.
//! - Every multiplication and conversion is checked; overflow is an error,
//!   never a wrap.

pub mod decay;
pub mod rules;

pub use decay::DecayConfig;
pub use rules::{PowerAdjustment, PowerConfig};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by power arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PowerError {
    /// A computation left the `i64` range.
    #[error("power arithmetic overflow computing {context}")]
    Overflow {
        /// What was being computed.
        context: &'static str,
    },

    /// A drain amount or counter was negative.
    #[error("drain value must not be negative, got {value}")]
    NegativeDrain {
        /// The rejected value.
        value: i64,
    },

    /// A drain counter update would move it backwards.
    #[error("drain counter cannot decrease from {current} to {proposed}")]
    DrainDecreased {
        /// Counter before the update.
        current: i64,
        /// Rejected new value.
        proposed: i64,
    },

    /// A last-online timestamp lies after the current time.
    #[error("timestamp {timestamp} is in the future")]
    TimestampInFuture {
        /// The rejected timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A last-online timestamp lies before the Unix epoch.
    #[error("timestamp {timestamp} is before the epoch")]
    TimestampBeforeEpoch {
        /// The rejected timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Convert a collection count to `i64`, failing instead of truncating.
pub(crate) fn count_to_i64(count: usize, context: &'static str) -> Result<i64, PowerError> {
    i64::try_from(count)
        .ok()
        .ok_or(PowerError::Overflow { context })
}
