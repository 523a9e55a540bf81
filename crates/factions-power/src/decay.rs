//! Inactivity decay: who drains, by how much, and counter bookkeeping.
//!
//! # Design
//!
//! - A member is inactive once `now - last_online >= inactive_threshold_days`.
//! - Each decay pass drains `min(drain_amount, faction_power, cap - drained)`
//!   from the member's faction, where `cap` is `power_per_member`.
//! - The per-member counter only grows within a membership and is clamped to
//!   the cap, so one idle member can never cost the faction more than one
//!   member's worth of power.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use crate::PowerError;

/// Decay pass settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DecayConfig {
    /// Whether the decay pass runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Hours between decay passes. Values below 1 are treated as 1.
    #[serde(default = "default_drain_interval_hours")]
    pub drain_interval_hours: u64,

    /// Days offline before a member starts draining.
    #[serde(default = "default_inactive_threshold_days")]
    pub inactive_threshold_days: i64,

    /// Power drained per inactive member per pass.
    #[serde(default = "default_drain_amount")]
    pub drain_amount: i64,

    /// Lifetime drain cap per member per membership.
    #[serde(default = "default_power_per_member")]
    pub power_per_member: i64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            drain_interval_hours: default_drain_interval_hours(),
            inactive_threshold_days: default_inactive_threshold_days(),
            drain_amount: default_drain_amount(),
            power_per_member: default_power_per_member(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_drain_interval_hours() -> u64 {
    24
}

const fn default_inactive_threshold_days() -> i64 {
    7
}

const fn default_drain_amount() -> i64 {
    5
}

const fn default_power_per_member() -> i64 {
    20
}

impl DecayConfig {
    /// Hours between passes, never less than one.
    pub const fn interval_hours(&self) -> u64 {
        if self.drain_interval_hours == 0 {
            1
        } else {
            self.drain_interval_hours
        }
    }

    /// Seconds between passes.
    ///
    /// # Errors
    ///
    /// Returns [`PowerError::Overflow`] if the interval does not fit in `u64`.
    pub const fn interval_seconds(&self) -> Result<u64, PowerError> {
        match self.interval_hours().checked_mul(3600) {
            Some(secs) => Ok(secs),
            None => Err(PowerError::Overflow {
                context: "decay interval",
            }),
        }
    }

    /// Whether a member last seen at `last_online` counts as inactive.
    ///
    /// An unrepresentable threshold means nobody is ever inactive.
    pub fn is_inactive(&self, last_online: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        TimeDelta::try_days(self.inactive_threshold_days)
            .is_some_and(|threshold| now.signed_duration_since(last_online) >= threshold)
    }

    /// Whether a member has already drained their full share.
    pub const fn at_cap(&self, drained: i64) -> bool {
        drained >= self.power_per_member
    }

    /// Amount one pass drains for a member who has drained `drained` so far
    /// from a faction currently at `faction_power`. Never negative.
    pub fn drain_for(&self, faction_power: i64, drained: i64) -> i64 {
        let remaining = self.power_per_member.saturating_sub(drained);
        self.drain_amount
            .min(faction_power)
            .min(remaining)
            .max(0)
    }

    /// Validate a new value for a member's drain counter.
    ///
    /// Rejects negative and decreasing values; values above the cap are
    /// clamped to it.
    ///
    /// # Errors
    ///
    /// Returns [`PowerError::NegativeDrain`] or [`PowerError::DrainDecreased`].
    pub fn next_drained(&self, current: i64, proposed: i64) -> Result<i64, PowerError> {
        if proposed < 0 {
            return Err(PowerError::NegativeDrain { value: proposed });
        }
        if proposed < current {
            return Err(PowerError::DrainDecreased { current, proposed });
        }
        Ok(proposed.min(self.power_per_member.max(0)))
    }

    /// Counter value after draining `amount` more.
    ///
    /// # Errors
    ///
    /// Returns [`PowerError::NegativeDrain`] for a negative amount, or
    /// [`PowerError::Overflow`].
    pub fn record_drain(&self, current: i64, amount: i64) -> Result<i64, PowerError> {
        if amount < 0 {
            return Err(PowerError::NegativeDrain { value: amount });
        }
        let proposed = current.checked_add(amount).ok_or(PowerError::Overflow {
            context: "drain counter",
        })?;
        self.next_drained(current, proposed)
    }
}

/// Validate a reported last-online timestamp.
///
/// # Errors
///
/// Returns [`PowerError::TimestampBeforeEpoch`] or
/// [`PowerError::TimestampInFuture`].
pub fn check_last_online(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), PowerError> {
    if timestamp < DateTime::<Utc>::UNIX_EPOCH {
        return Err(PowerError::TimestampBeforeEpoch { timestamp });
    }
    if timestamp > now {
        return Err(PowerError::TimestampInFuture { timestamp });
    }
    Ok(())
}
