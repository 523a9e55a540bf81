//! Maximum power, clamping, and claim sufficiency.

use serde::Deserialize;

use crate::{PowerError, count_to_i64};

/// Constants of the power economy.
///
/// `maxPower = base + members * per_member + mutual_allies * per_ally`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PowerConfig {
    /// Power every faction gets regardless of size.
    #[serde(default = "default_base")]
    pub base: i64,

    /// Maximum power contributed by each member.
    #[serde(default = "default_per_member")]
    pub per_member: i64,

    /// Maximum power contributed by each mutual ally.
    #[serde(default = "default_per_ally")]
    pub per_ally: i64,

    /// Power each paid claim requires for the faction to stay protected.
    #[serde(default = "default_claim_weight")]
    pub claim_weight: i64,

    /// Derived power at or below which a low-power warning fires.
    #[serde(default = "default_low_power_warning")]
    pub low_power_warning: i64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            per_member: default_per_member(),
            per_ally: default_per_ally(),
            claim_weight: default_claim_weight(),
            low_power_warning: default_low_power_warning(),
        }
    }
}

const fn default_base() -> i64 {
    20
}

const fn default_per_member() -> i64 {
    20
}

const fn default_per_ally() -> i64 {
    10
}

const fn default_claim_weight() -> i64 {
    5
}

const fn default_low_power_warning() -> i64 {
    5
}

// ---------------------------------------------------------------------------
// Adjustment result
// ---------------------------------------------------------------------------

/// Outcome of a clamped base-power change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerAdjustment {
    /// Base power before the change.
    pub old_base: i64,
    /// Base power after clamping.
    pub new_base: i64,
}

impl PowerAdjustment {
    /// The delta actually applied after clamping.
    pub const fn applied(&self) -> i64 {
        self.new_base.saturating_sub(self.old_base)
    }

    /// Whether the base value moved.
    pub const fn changed(&self) -> bool {
        self.new_base != self.old_base
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

impl PowerConfig {
    /// Upper bound on a faction's base power.
    ///
    /// # Errors
    ///
    /// Returns [`PowerError::Overflow`] if the sum leaves the `i64` range.
    pub fn max_power(&self, members: usize, mutual_allies: usize) -> Result<i64, PowerError> {
        let overflow = PowerError::Overflow {
            context: "max power",
        };
        let member_part = count_to_i64(members, "member count")?
            .checked_mul(self.per_member)
            .ok_or_else(|| overflow.clone())?;
        let ally_part = count_to_i64(mutual_allies, "ally count")?
            .checked_mul(self.per_ally)
            .ok_or_else(|| overflow.clone())?;
        self.base
            .checked_add(member_part)
            .and_then(|v| v.checked_add(ally_part))
            .ok_or(overflow)
    }

    /// Move base power by `delta`, clamped to `[0, max_power]`.
    pub fn adjust(&self, old_base: i64, delta: i64, max_power: i64) -> PowerAdjustment {
        self.set(old_base, old_base.saturating_add(delta), max_power)
    }

    /// Set base power to `requested`, clamped to `[0, max_power]`.
    ///
    /// A negative `max_power` (only reachable with negative config
    /// constants) clamps to zero.
    pub fn set(&self, old_base: i64, requested: i64, max_power: i64) -> PowerAdjustment {
        let upper = max_power.max(0);
        PowerAdjustment {
            old_base,
            new_base: requested.clamp(0, upper),
        }
    }

    /// Power needed to keep `claims` paid claims protected.
    ///
    /// # Errors
    ///
    /// Returns [`PowerError::Overflow`] on overflow.
    pub fn required_for_claims(&self, claims: usize) -> Result<i64, PowerError> {
        count_to_i64(claims, "claim count")?
            .checked_mul(self.claim_weight)
            .ok_or(PowerError::Overflow {
                context: "claim requirement",
            })
    }

    /// `power >= claims * claim_weight`. An unrepresentable requirement is
    /// never satisfied.
    pub fn has_sufficient_claim_power(&self, power: i64, claims: usize) -> bool {
        self.required_for_claims(claims)
            .is_ok_and(|required| power >= required)
    }

    /// Whether a faction holding `paid` claims may add `additional` more.
    ///
    /// The budget is the faction's potential power (`max_power + admin`),
    /// not its current power, so a faction can claim land it has the
    /// members to defend even while its base is still recovering.
    ///
    /// # Errors
    ///
    /// Returns [`PowerError::Overflow`] on overflow.
    pub fn can_afford_claims(
        &self,
        max_power: i64,
        admin_power: i64,
        paid: usize,
        additional: usize,
    ) -> Result<bool, PowerError> {
        let total = paid.checked_add(additional).ok_or(PowerError::Overflow {
            context: "claim count",
        })?;
        let required = self.required_for_claims(total)?;
        Ok(max_power.saturating_add(admin_power) >= required)
    }

    /// Whether a drop from `old_power` to `new_power` crosses into the
    /// warning band `(0, low_power_warning]`.
    pub const fn crosses_low_power(&self, old_power: i64, new_power: i64) -> bool {
        new_power > 0 && new_power <= self.low_power_warning && old_power > self.low_power_warning
    }
}
