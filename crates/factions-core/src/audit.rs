//! Referential clean-up sweep.
//!
//! Reads already treat dangling references as absent; the audit makes the
//! stored records agree. Removing one kind of record can orphan another (a
//! faction disbanded for lacking an owner leaves claims and memberships
//! behind), so the sweep repeats a bounded number of rounds until a round
//! changes nothing.

use std::collections::BTreeSet;

use tracing::{info, warn};

use factions_events::FactionEvent;
use factions_types::{EntityKind, FactionId, Rank};

use crate::error::InvariantViolation;
use crate::realm::Realm;
use crate::world::LevelRegistry;

/// Maximum sweep rounds per audit.
pub const AUDIT_ROUNDS: usize = 4;

/// Counts of what an audit corrected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Claims of missing factions or invalid levels.
    pub claims_removed: usize,
    /// Relationships pointing at missing factions.
    pub relationships_dropped: usize,
    /// Homes in invalid levels.
    pub homes_cleared: usize,
    /// Factions disbanded for having no owner.
    pub factions_disbanded: usize,
    /// Memberships pointing at missing factions.
    pub memberships_cleared: usize,
    /// Rounds run.
    pub rounds: usize,
}

impl AuditReport {
    /// Total corrections.
    pub const fn corrections(&self) -> usize {
        self.claims_removed
            .saturating_add(self.relationships_dropped)
            .saturating_add(self.homes_cleared)
            .saturating_add(self.factions_disbanded)
            .saturating_add(self.memberships_cleared)
    }
}

impl Realm {
    /// Run the full audit against the host's current levels.
    ///
    /// # Errors
    ///
    /// Propagates an [`InvariantViolation`] from disbanding.
    pub fn audit(&mut self, levels: &dyn LevelRegistry) -> Result<AuditReport, InvariantViolation> {
        let mut report = AuditReport::default();
        for _ in 0..AUDIT_ROUNDS {
            let before = report.corrections();
            report.rounds = report.rounds.saturating_add(1);
            self.audit_claims(levels, &mut report);
            self.audit_factions(levels, &mut report)?;
            self.audit_users(&mut report);
            if report.corrections() == before {
                break;
            }
        }
        if report.corrections() > 0 {
            info!(
                claims = report.claims_removed,
                relationships = report.relationships_dropped,
                homes = report.homes_cleared,
                disbanded = report.factions_disbanded,
                memberships = report.memberships_cleared,
                rounds = report.rounds,
                "Audit corrected realm"
            );
        }
        Ok(report)
    }

    fn audit_claims(&mut self, levels: &dyn LevelRegistry, report: &mut AuditReport) {
        let factions = &self.factions;
        let removed = self.claims.audit(
            |faction_id| factions.contains_key(&faction_id),
            |level| levels.is_valid_level(level),
        );
        report.claims_removed = report.claims_removed.saturating_add(removed.len());
        for claim in removed {
            self.emit(&FactionEvent::ClaimRemoved {
                cell: claim.cell,
                faction_id: claim.faction_id,
            });
        }
    }

    fn audit_factions(
        &mut self,
        levels: &dyn LevelRegistry,
        report: &mut AuditReport,
    ) -> Result<(), InvariantViolation> {
        let live: BTreeSet<FactionId> = self.factions.keys().copied().collect();
        let mut modified = Vec::new();
        for faction in self.factions.values_mut() {
            let before = faction.relationships.len();
            faction.relationships.retain(|target, _| live.contains(target));
            let dropped = before.saturating_sub(faction.relationships.len());

            let home_invalid = faction
                .home
                .as_ref()
                .is_some_and(|home| !levels.is_valid_level(&home.level));
            if home_invalid {
                faction.home = None;
                report.homes_cleared = report.homes_cleared.saturating_add(1);
            }
            if dropped > 0 || home_invalid {
                warn!(faction_id = %faction.id, dropped, home_invalid, "Audit repaired faction");
                report.relationships_dropped = report.relationships_dropped.saturating_add(dropped);
                modified.push(faction.id);
            }
        }
        for faction_id in modified {
            self.emit(&FactionEvent::FactionModified { faction_id });
        }

        let owned: BTreeSet<FactionId> = self
            .users
            .values()
            .filter_map(|u| u.membership)
            .filter(|m| m.rank == Rank::Owner)
            .map(|m| m.faction_id)
            .collect();
        let ownerless: Vec<FactionId> = live.difference(&owned).copied().collect();
        for faction_id in ownerless {
            warn!(%faction_id, "Audit disbanding faction without an owner");
            self.disband(faction_id)?;
            report.factions_disbanded = report.factions_disbanded.saturating_add(1);
        }
        Ok(())
    }

    fn audit_users(&mut self, report: &mut AuditReport) {
        let mut cleared: usize = 0;
        for user in self.users.values_mut() {
            if let Some(membership) = user.membership
                && !self.factions.contains_key(&membership.faction_id)
            {
                warn!(
                    user = %user.id,
                    faction_id = %membership.faction_id,
                    "Audit cleared dangling membership"
                );
                user.membership = None;
                cleared = cleared.saturating_add(1);
            }
        }
        if cleared > 0 {
            report.memberships_cleared = report.memberships_cleared.saturating_add(cleared);
            self.mark_dirty(EntityKind::Users);
        }
    }
}
