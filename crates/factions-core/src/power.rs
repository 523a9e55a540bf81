//! Power adjustment, inactivity decay, and the zero-power sweep.
//!
//! The arithmetic lives in [`factions_power`]; this module applies it to
//! faction and user records, emits the events, and routes zero-power
//! factions into [`Realm::disband`].

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use factions_events::FactionEvent;
use factions_power::{PowerAdjustment, PowerError};
use factions_types::{EntityKind, Faction, FactionId, UserId};

use crate::error::InvariantViolation;
use crate::realm::Realm;

/// Result of [`Realm::adjust_power`] or [`Realm::set_power`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerOutcome {
    /// Base power before and after clamping.
    pub adjustment: PowerAdjustment,
    /// The faction reached zero power and was disbanded.
    pub disbanded: bool,
}

/// Summary of one decay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecayReport {
    /// Inactive members that drained power this pass.
    pub members_drained: usize,
    /// Total power drained.
    pub power_drained: i64,
    /// Factions disbanded because a drain took them to zero.
    pub disbanded: Vec<FactionId>,
}

impl Realm {
    /// Move a faction's base power by `delta`, clamped to
    /// `[0, max_power]`. Always emits [`FactionEvent::PowerChanged`]; a
    /// faction left at zero derived power is disbanded before returning.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::UnknownFaction`] or an overflow.
    pub fn adjust_power(
        &mut self,
        faction_id: FactionId,
        delta: i64,
    ) -> Result<PowerOutcome, InvariantViolation> {
        let max = self.max_power(faction_id)?;
        let old_base = self.base_of(faction_id)?;
        let adjustment = self.config.power.adjust(old_base, delta, max);
        self.apply_base(faction_id, adjustment)
    }

    /// Set a faction's base power, with the same clamp and disband rules as
    /// [`Realm::adjust_power`].
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::UnknownFaction`] or an overflow.
    pub fn set_power(
        &mut self,
        faction_id: FactionId,
        base: i64,
    ) -> Result<PowerOutcome, InvariantViolation> {
        let max = self.max_power(faction_id)?;
        let old_base = self.base_of(faction_id)?;
        let adjustment = self.config.power.set(old_base, base, max);
        self.apply_base(faction_id, adjustment)
    }

    /// Add to the unclamped admin component. Returns the new derived power.
    ///
    /// A negative total here does not disband immediately; the zero-power
    /// sweep picks it up.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::UnknownFaction`] or an overflow.
    pub fn add_admin_power(
        &mut self,
        faction_id: FactionId,
        amount: i64,
    ) -> Result<i64, InvariantViolation> {
        let faction = self.faction_mut(faction_id)?;
        faction.admin_power = faction.admin_power.checked_add(amount).ok_or(
            PowerError::Overflow {
                context: "admin power",
            },
        )?;
        let power = faction.power();
        info!(%faction_id, amount, power, "Admin power added");
        self.emit(&FactionEvent::FactionModified { faction_id });
        Ok(power)
    }

    /// Whether the faction has enough power to protect every paid claim.
    /// Unknown factions never do.
    pub fn has_sufficient_claim_power(&self, faction_id: FactionId) -> bool {
        self.faction(faction_id).is_some_and(|f| {
            self.config
                .power
                .has_sufficient_claim_power(f.power(), self.claims.paid_count(faction_id))
        })
    }

    /// Overwrite a user's drain counter.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::UnknownUser`], or a wrapped
    /// [`PowerError`] for a negative or decreasing value. Values above the
    /// cap are clamped to it.
    pub fn set_power_drained(
        &mut self,
        user: UserId,
        drained: i64,
    ) -> Result<i64, InvariantViolation> {
        let current = self
            .users
            .get(&user)
            .map(|u| u.power_drained)
            .ok_or(InvariantViolation::UnknownUser(user))?;
        let next = self.config.decay.next_drained(current, drained)?;
        if let Some(record) = self.users.get_mut(&user) {
            record.power_drained = next;
        }
        self.mark_dirty(EntityKind::Users);
        Ok(next)
    }

    /// Lower a base that exceeds the current maximum (after a member left
    /// or an alliance ended). Never disbands.
    pub(crate) fn reclamp_power(&mut self, faction_id: FactionId) -> Result<(), InvariantViolation> {
        let max = self.max_power(faction_id)?.max(0);
        let faction = self.faction_mut(faction_id)?;
        let old_base = faction.base_power;
        if old_base <= max {
            return Ok(());
        }
        faction.base_power = max;
        debug!(%faction_id, old_base, new_base = max, "Base power re-clamped");
        self.emit(&FactionEvent::PowerChanged {
            faction_id,
            old_base,
            new_base: max,
        });
        Ok(())
    }

    // -------------------------------------------------------------------
    // Scheduled passes
    // -------------------------------------------------------------------

    /// Drain power from factions on behalf of their inactive members.
    ///
    /// Each inactive member below the drain cap drains
    /// `min(drain_amount, faction power, remaining cap)` once per pass. The
    /// drain lands on base power, and their counter grows by what base power
    /// actually lost.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`]. Drains applied before it
    /// stay applied.
    pub fn decay_pass(&mut self, now: DateTime<Utc>) -> Result<DecayReport, InvariantViolation> {
        let mut report = DecayReport::default();
        let decay = self.config.decay.clone();
        if !decay.enabled {
            return Ok(report);
        }

        let candidates: Vec<(UserId, FactionId, i64)> = self
            .users
            .values()
            .filter(|u| !decay.at_cap(u.power_drained))
            .filter(|u| decay.is_inactive(u.last_online, now))
            .filter_map(|u| {
                let faction_id = u.faction_id()?;
                self.factions
                    .contains_key(&faction_id)
                    .then_some((u.id, faction_id, u.power_drained))
            })
            .collect();

        for (user, faction_id, drained) in candidates {
            // An earlier drain this pass may have disbanded the faction.
            let Some(power) = self.faction(faction_id).map(Faction::power) else {
                continue;
            };
            let amount = decay.drain_for(power, drained);
            if amount == 0 {
                continue;
            }
            decay.record_drain(drained, amount)?;
            let outcome = self.adjust_power(faction_id, amount.saturating_neg())?;
            if outcome.disbanded {
                report.disbanded.push(faction_id);
            }
            // Admin power can cover a drain that base power cannot absorb.
            let applied = outcome.adjustment.applied().saturating_neg();
            if applied <= 0 {
                continue;
            }
            let next = decay.record_drain(drained, applied)?;
            if let Some(record) = self.users.get_mut(&user) {
                record.power_drained = next;
            }
            self.mark_dirty(EntityKind::Users);
            debug!(
                %user,
                %faction_id,
                amount = applied,
                drained = next,
                "Inactive member drained power"
            );

            report.members_drained = report.members_drained.saturating_add(1);
            report.power_drained = report.power_drained.saturating_add(applied);
        }

        info!(
            members = report.members_drained,
            power = report.power_drained,
            disbanded = report.disbanded.len(),
            "Decay pass complete"
        );
        Ok(report)
    }

    /// Disband every faction whose derived power is zero.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] from [`Realm::disband`].
    pub fn disband_pass(&mut self) -> Result<Vec<FactionId>, InvariantViolation> {
        let powerless: Vec<FactionId> = self
            .factions
            .values()
            .filter(|f| f.power() == 0)
            .map(|f| f.id)
            .collect();
        for faction_id in &powerless {
            self.disband(*faction_id)?;
        }
        if !powerless.is_empty() {
            info!(count = powerless.len(), "Disbanded powerless factions");
        }
        Ok(powerless)
    }

    fn base_of(&self, faction_id: FactionId) -> Result<i64, InvariantViolation> {
        self.faction(faction_id)
            .map(|f| f.base_power)
            .ok_or(InvariantViolation::UnknownFaction(faction_id))
    }

    fn apply_base(
        &mut self,
        faction_id: FactionId,
        adjustment: PowerAdjustment,
    ) -> Result<PowerOutcome, InvariantViolation> {
        let faction = self.faction_mut(faction_id)?;
        let old_power = faction.power();
        faction.base_power = adjustment.new_base;
        let power = faction.power();

        self.emit(&FactionEvent::PowerChanged {
            faction_id,
            old_base: adjustment.old_base,
            new_base: adjustment.new_base,
        });
        if self.config.power.crosses_low_power(old_power, power) {
            warn!(%faction_id, power, "Faction power is low");
            self.emit(&FactionEvent::PowerLow { faction_id, power });
        }

        let disbanded = power == 0;
        if disbanded {
            info!(%faction_id, "Faction reached zero power");
            self.disband(faction_id)?;
        }
        Ok(PowerOutcome {
            adjustment,
            disbanded,
        })
    }
}
