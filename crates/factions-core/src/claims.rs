//! Claiming, unclaiming, per-player grants, and access levels.
//!
//! Every operation here is policy-gated and returns a [`Denial`] when the
//! actor may not proceed. Checks run before any mutation, so a denied call
//! changes nothing.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use factions_events::FactionEvent;
use factions_territory::ResolvedClaim;
use factions_types::{CellKey, Claim, FactionId, Rank, UserId};

use crate::error::{Denial, InvariantViolation};
use crate::realm::Realm;

impl Realm {
    /// The paid claim or synthesized buffer at `cell`.
    pub fn get_claim(&self, cell: &CellKey) -> Option<ResolvedClaim<'_>> {
        self.claims.get(cell)
    }

    /// Whether `faction_id` may take `cell`, ignoring power and rank.
    ///
    /// # Errors
    ///
    /// [`Denial::AlreadyOwned`], [`Denial::AlreadyClaimed`],
    /// [`Denial::InOtherBuffer`], or [`Denial::AdjacentToBuffer`], in that
    /// order of precedence.
    pub fn check_claimable(&self, faction_id: FactionId, cell: &CellKey) -> Result<(), Denial> {
        if let Some(paid) = self.claims.paid(cell) {
            return Err(if paid.faction_id == faction_id {
                Denial::AlreadyOwned(cell.clone())
            } else {
                Denial::AlreadyClaimed {
                    cell: cell.clone(),
                    owner: paid.faction_id,
                }
            });
        }
        if let Some(owner) = self.claims.buffer_owner(cell)
            && owner != faction_id
        {
            return Err(Denial::InOtherBuffer {
                cell: cell.clone(),
                owner,
            });
        }
        for neighbor in cell.neighbors() {
            if self.claims.paid(&neighbor).is_some() {
                continue;
            }
            if let Some(owner) = self.claims.buffer_owner(&neighbor)
                && owner != faction_id
            {
                return Err(Denial::AdjacentToBuffer {
                    cell: cell.clone(),
                    owner,
                });
            }
        }
        Ok(())
    }

    /// Claim one cell for the actor's faction.
    ///
    /// # Errors
    ///
    /// Rank below commander, any [`Realm::check_claimable`] denial, or
    /// [`Denial::InsufficientPower`].
    pub fn claim_cell(
        &mut self,
        actor: UserId,
        cell: CellKey,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        let faction_id = self.require_rank(actor, Rank::Commander)?.faction_id;
        self.check_claimable(faction_id, &cell)?;
        self.check_claim_power(faction_id, 1)?;
        self.insert_claim(Claim::new(cell, faction_id, now))?;
        Ok(())
    }

    /// Claim the `(2 * size - 1)^2` square centred on `center`, all or
    /// nothing. Cells the faction already owns are skipped. Returns the
    /// number of cells newly claimed.
    ///
    /// # Errors
    ///
    /// [`Denial::SizeOutOfRange`], rank below commander, the first
    /// conflicting cell's denial, or [`Denial::InsufficientPower`] for the
    /// whole batch.
    pub fn claim_square(
        &mut self,
        actor: UserId,
        center: &CellKey,
        size: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, Denial> {
        let max = self.config.protection.max_claim_square;
        if size == 0 || size > max {
            return Err(Denial::SizeOutOfRange { size, max });
        }
        let faction_id = self.require_rank(actor, Rank::Commander)?.faction_id;

        let mut wanted = BTreeSet::new();
        for cell in square(center, size) {
            match self.check_claimable(faction_id, &cell) {
                Ok(()) => {
                    wanted.insert(cell);
                }
                Err(Denial::AlreadyOwned(_)) if size > 1 => {}
                Err(denial) => {
                    debug!(%actor, %cell, %denial, "Square claim refused");
                    return Err(denial);
                }
            }
        }
        self.check_claim_power(faction_id, wanted.len())?;

        let count = wanted.len();
        for cell in wanted {
            self.insert_claim(Claim::new(cell, faction_id, now))?;
        }
        info!(%faction_id, %center, size, count, "Square claimed");
        Ok(count)
    }

    /// Release a paid claim. Leaders may release their own faction's land;
    /// bypassing users may release anyone's.
    ///
    /// # Errors
    ///
    /// [`Denial::NotClaimed`], [`Denial::IsBuffer`], [`Denial::NotOwnClaim`],
    /// or a rank denial.
    pub fn unclaim(&mut self, actor: UserId, cell: &CellKey) -> Result<Claim, Denial> {
        let owner = match self.claims.get(cell) {
            None => return Err(Denial::NotClaimed(cell.clone())),
            Some(ResolvedClaim::Buffer(_)) => return Err(Denial::IsBuffer(cell.clone())),
            Some(ResolvedClaim::Paid(claim)) => claim.faction_id,
        };
        let bypass = self.users.get(&actor).is_some_and(|u| u.bypass);
        if !bypass {
            let membership = self.require_rank(actor, Rank::Leader)?;
            if membership.faction_id != owner {
                return Err(Denial::NotOwnClaim(cell.clone()));
            }
        }

        let claim = self.claims.remove(cell)?;
        info!(%actor, %cell, faction_id = %owner, bypass, "Claim removed");
        self.emit(&FactionEvent::ClaimRemoved {
            cell: cell.clone(),
            faction_id: owner,
        });
        Ok(claim)
    }

    /// Release every paid claim of the actor's faction. Returns how many
    /// were removed.
    ///
    /// # Errors
    ///
    /// Rank below leader.
    pub fn unclaim_all(&mut self, actor: UserId) -> Result<usize, Denial> {
        let faction_id = self.require_rank(actor, Rank::Leader)?.faction_id;
        let count = self.claims.remove_all(faction_id).len();
        info!(%actor, %faction_id, count, "All claims removed");
        self.emit(&FactionEvent::AllClaimsRemoved { faction_id, count });
        Ok(count)
    }

    // -------------------------------------------------------------------
    // Grants
    // -------------------------------------------------------------------

    /// Let `target` build on the paid claim at `cell` regardless of its
    /// access level.
    ///
    /// # Errors
    ///
    /// [`Denial::NotClaimed`], [`Denial::IsBuffer`], [`Denial::NotOwnClaim`]
    /// if the granter is outside the owning faction, a rank denial below
    /// leader, [`Denial::TargetNotInFaction`], or [`Denial::AlreadyGranted`].
    pub fn grant(&mut self, cell: &CellKey, target: UserId, granter: UserId) -> Result<(), Denial> {
        let faction_id = self.editable_claim_owner(cell, granter)?;
        if self
            .membership_of(target)
            .is_none_or(|m| m.faction_id != faction_id)
        {
            return Err(Denial::TargetNotInFaction(target));
        }
        if !self.claims.grant(cell, target)? {
            return Err(Denial::AlreadyGranted(target));
        }
        debug!(%cell, %target, %granter, "Grant added");
        self.emit(&FactionEvent::ClaimModified {
            cell: cell.clone(),
            faction_id,
        });
        Ok(())
    }

    /// Remove `target`'s grant at `cell`. Returns `false`, with no event, if
    /// there was nothing to remove.
    pub fn revoke(&mut self, cell: &CellKey, target: UserId) -> bool {
        let Some(faction_id) = self.claims.paid(cell).map(|c| c.faction_id) else {
            return false;
        };
        if !self.claims.revoke(cell, target) {
            return false;
        }
        debug!(%cell, %target, "Grant revoked");
        self.emit(&FactionEvent::ClaimModified {
            cell: cell.clone(),
            faction_id,
        });
        true
    }

    /// Players granted at `cell`. Empty for buffers and unclaimed cells.
    pub fn grants_at(&self, cell: &CellKey) -> Vec<UserId> {
        self.claims
            .paid(cell)
            .map(|c| c.granted.iter().copied().collect())
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------
    // Access level
    // -------------------------------------------------------------------

    /// Raise the rank required to build on a paid claim, up to owner.
    ///
    /// # Errors
    ///
    /// As [`Realm::grant`] for the claim checks, or
    /// [`Denial::AccessLevelBound`] at owner.
    pub fn raise_access_level(&mut self, actor: UserId, cell: &CellKey) -> Result<Rank, Denial> {
        self.step_access_level(actor, cell, Rank::above)
    }

    /// Lower the rank required to build on a paid claim, down to member.
    ///
    /// # Errors
    ///
    /// As [`Realm::grant`] for the claim checks, or
    /// [`Denial::AccessLevelBound`] at member.
    pub fn lower_access_level(&mut self, actor: UserId, cell: &CellKey) -> Result<Rank, Denial> {
        self.step_access_level(actor, cell, |rank| {
            rank.below().filter(|r| r.outranks_or_equals(Rank::Member))
        })
    }

    // -------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------

    fn step_access_level(
        &mut self,
        actor: UserId,
        cell: &CellKey,
        step: impl FnOnce(Rank) -> Option<Rank>,
    ) -> Result<Rank, Denial> {
        let faction_id = self.editable_claim_owner(cell, actor)?;
        let claim = self
            .claims
            .paid_mut(cell)
            .ok_or_else(|| Denial::NotClaimed(cell.clone()))?;
        let level = claim.access_level;
        let next = step(level).ok_or(Denial::AccessLevelBound { level })?;
        claim.access_level = next;
        info!(%cell, %actor, from = %level, to = %next, "Access level changed");
        self.emit(&FactionEvent::ClaimModified {
            cell: cell.clone(),
            faction_id,
        });
        Ok(next)
    }

    /// Owner of the paid claim at `cell`, provided `actor` is a leader or
    /// owner of it.
    fn editable_claim_owner(&self, cell: &CellKey, actor: UserId) -> Result<FactionId, Denial> {
        let owner = match self.claims.get(cell) {
            None => return Err(Denial::NotClaimed(cell.clone())),
            Some(ResolvedClaim::Buffer(_)) => return Err(Denial::IsBuffer(cell.clone())),
            Some(ResolvedClaim::Paid(claim)) => claim.faction_id,
        };
        let membership = self.require_membership(actor)?;
        if membership.faction_id != owner {
            return Err(Denial::NotOwnClaim(cell.clone()));
        }
        self.require_rank(actor, Rank::Leader)?;
        Ok(owner)
    }

    fn check_claim_power(&self, faction_id: FactionId, additional: usize) -> Result<(), Denial> {
        let max = self.max_power(faction_id)?;
        let admin = self.faction(faction_id).map_or(0, |f| f.admin_power);
        let paid = self.claims.paid_count(faction_id);
        let power = &self.config.power;
        if power
            .can_afford_claims(max, admin, paid, additional)
            .map_err(InvariantViolation::from)?
        {
            return Ok(());
        }
        let required = power
            .required_for_claims(paid.saturating_add(additional))
            .unwrap_or(i64::MAX);
        let available = max.saturating_add(admin);
        debug!(%faction_id, required, available, "Claim refused for power");
        Err(Denial::InsufficientPower {
            required,
            available,
        })
    }

    fn insert_claim(&mut self, claim: Claim) -> Result<(), Denial> {
        let cell = claim.cell.clone();
        let faction_id = claim.faction_id;
        if self.claims.add(claim)? {
            info!(%cell, %faction_id, "Claim added");
            self.emit(&FactionEvent::ClaimAdded { cell, faction_id });
        }
        Ok(())
    }
}

/// Cells of the `(2 * size - 1)` square around `center`, skipping any that
/// fall off the coordinate range.
fn square(center: &CellKey, size: u32) -> Vec<CellKey> {
    let reach = i32::try_from(size.saturating_sub(1)).unwrap_or(i32::MAX);
    let mut cells = Vec::new();
    for dx in reach.saturating_neg()..=reach {
        for dz in reach.saturating_neg()..=reach {
            if let Some(cell) = center.offset(dx, dz) {
                cells.push(cell);
            }
        }
    }
    cells
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use factions_events::EventRecorder;

    use super::*;
    use crate::config::FactionsConfig;

    fn cell(x: i32, z: i32) -> CellKey {
        CellKey::new("overworld", x, z)
    }

    struct Fixture {
        realm: Realm,
        owner: UserId,
        fid: FactionId,
    }

    fn fixture() -> Fixture {
        let mut realm = Realm::new(FactionsConfig::default());
        let owner = UserId::new();
        let fid = realm.create_faction(owner, "Harrow", Utc::now()).unwrap();
        Fixture { realm, owner, fid }
    }

    #[test]
    fn claim_cell_adds_and_emits() {
        let mut f = fixture();
        let recorder = EventRecorder::new();
        f.realm.subscribe(Box::new(recorder.clone()));

        assert!(f.realm.claim_cell(f.owner, cell(0, 0), Utc::now()).is_ok());
        assert_eq!(f.realm.claims().paid_count(f.fid), 1);
        assert_eq!(
            recorder.events(),
            vec![FactionEvent::ClaimAdded {
                cell: cell(0, 0),
                faction_id: f.fid
            }]
        );
        assert_eq!(
            f.realm.claim_cell(f.owner, cell(0, 0), Utc::now()),
            Err(Denial::AlreadyOwned(cell(0, 0)))
        );
    }

    #[test]
    fn members_cannot_claim() {
        let mut f = fixture();
        let member = UserId::new();
        f.realm.join_faction(member, f.fid, Rank::Member, Utc::now()).unwrap();
        assert_eq!(
            f.realm.claim_cell(member, cell(0, 0), Utc::now()),
            Err(Denial::InsufficientRank {
                required: Rank::Commander
            })
        );
    }

    #[test]
    fn buffers_block_other_factions() {
        let mut f = fixture();
        let now = Utc::now();
        let rival = UserId::new();
        let rival_fid = f.realm.create_faction(rival, "Thorn", now).unwrap();
        f.realm.claim_cell(f.owner, cell(0, 0), now).unwrap();

        // Inside the buffer ring.
        assert!(matches!(
            f.realm.claim_cell(rival, cell(1, 1), now),
            Err(Denial::InOtherBuffer { owner, .. }) if owner == f.fid
        ));
        // Touching the buffer ring.
        assert!(matches!(
            f.realm.claim_cell(rival, cell(2, 0), now),
            Err(Denial::AdjacentToBuffer { owner, .. }) if owner == f.fid
        ));
        // Paid by someone else.
        assert!(matches!(
            f.realm.claim_cell(rival, cell(0, 0), now),
            Err(Denial::AlreadyClaimed { .. })
        ));
        // Clear of the ring.
        assert!(f.realm.claim_cell(rival, cell(3, 0), now).is_ok());
        assert_eq!(f.realm.claims().paid_count(rival_fid), 1);
        // The owner may extend into its own buffer.
        assert!(f.realm.claim_cell(f.owner, cell(-1, 0), now).is_ok());
    }

    #[test]
    fn claim_power_gate_uses_potential_power() {
        let mut f = fixture();
        let now = Utc::now();
        // One member: max power 40, weight 5, so eight claims fit.
        for x in 0..8 {
            assert!(f.realm.claim_cell(f.owner, cell(x, 0), now).is_ok());
        }
        assert_eq!(
            f.realm.claim_cell(f.owner, cell(8, 0), now),
            Err(Denial::InsufficientPower {
                required: 45,
                available: 40
            })
        );
        f.realm.add_admin_power(f.fid, 5).unwrap();
        assert!(f.realm.claim_cell(f.owner, cell(8, 0), now).is_ok());
    }

    #[test]
    fn square_is_all_or_nothing() {
        let mut f = fixture();
        let now = Utc::now();
        assert!(matches!(
            f.realm.claim_square(f.owner, &cell(0, 0), 2, now),
            Err(Denial::InsufficientPower { required: 45, .. })
        ));
        assert_eq!(f.realm.claims().len(), 0);

        f.realm.add_admin_power(f.fid, 20).unwrap();
        assert_eq!(f.realm.claim_square(f.owner, &cell(0, 0), 2, now), Ok(9));
        // Overlapping squares only count the new cells.
        assert_eq!(f.realm.claim_square(f.owner, &cell(1, 0), 2, now), Ok(3));

        let rival = UserId::new();
        f.realm.create_faction(rival, "Thorn", now).unwrap();
        let before = f.realm.claims().len();
        assert!(f.realm.claim_square(rival, &cell(3, 0), 2, now).is_err());
        assert_eq!(f.realm.claims().len(), before);

        assert_eq!(
            f.realm.claim_square(f.owner, &cell(0, 0), 0, now),
            Err(Denial::SizeOutOfRange { size: 0, max: 7 })
        );
    }

    #[test]
    fn unclaim_rules() {
        let mut f = fixture();
        let now = Utc::now();
        let rival = UserId::new();
        f.realm.create_faction(rival, "Thorn", now).unwrap();
        f.realm.claim_cell(f.owner, cell(0, 0), now).unwrap();

        assert_eq!(
            f.realm.unclaim(f.owner, &cell(1, 0)).map(|c| c.cell),
            Err(Denial::IsBuffer(cell(1, 0)))
        );
        assert_eq!(
            f.realm.unclaim(f.owner, &cell(9, 9)).map(|c| c.cell),
            Err(Denial::NotClaimed(cell(9, 9)))
        );
        assert_eq!(
            f.realm.unclaim(rival, &cell(0, 0)).map(|c| c.cell),
            Err(Denial::NotOwnClaim(cell(0, 0)))
        );

        f.realm.set_bypass(rival, true, now);
        assert!(f.realm.unclaim(rival, &cell(0, 0)).is_ok());
        assert!(f.realm.get_claim(&cell(1, 0)).is_none());
    }

    #[test]
    fn unclaim_all_reports_count() {
        let mut f = fixture();
        let now = Utc::now();
        f.realm.add_admin_power(f.fid, 5).unwrap();
        f.realm.claim_square(f.owner, &cell(0, 0), 2, now).unwrap();
        assert_eq!(f.realm.unclaim_all(f.owner), Ok(9));
        assert_eq!(f.realm.claims().paid_count(f.fid), 0);
    }

    #[test]
    fn grant_rules() {
        let mut f = fixture();
        let now = Utc::now();
        let member = UserId::new();
        let outsider = UserId::new();
        f.realm.join_faction(member, f.fid, Rank::Member, now).unwrap();
        f.realm.claim_cell(f.owner, cell(0, 0), now).unwrap();

        assert_eq!(
            f.realm.grant(&cell(1, 0), member, f.owner),
            Err(Denial::IsBuffer(cell(1, 0)))
        );
        assert_eq!(
            f.realm.grant(&cell(0, 0), outsider, f.owner),
            Err(Denial::TargetNotInFaction(outsider))
        );
        assert!(matches!(
            f.realm.grant(&cell(0, 0), f.owner, member),
            Err(Denial::InsufficientRank { .. })
        ));
        // Rank alone is not enough: the granter must belong to the claim's faction.
        let rival = UserId::new();
        f.realm.create_faction(rival, "Rival", now).unwrap();
        assert_eq!(
            f.realm.grant(&cell(0, 0), member, rival),
            Err(Denial::NotOwnClaim(cell(0, 0)))
        );
        assert!(f.realm.grant(&cell(0, 0), member, f.owner).is_ok());
        assert_eq!(
            f.realm.grant(&cell(0, 0), member, f.owner),
            Err(Denial::AlreadyGranted(member))
        );
        assert_eq!(f.realm.grants_at(&cell(0, 0)), vec![member]);
    }

    #[test]
    fn revoke_is_idempotent_and_silent() {
        let mut f = fixture();
        let now = Utc::now();
        let member = UserId::new();
        f.realm.join_faction(member, f.fid, Rank::Member, now).unwrap();
        f.realm.claim_cell(f.owner, cell(0, 0), now).unwrap();
        f.realm.grant(&cell(0, 0), member, f.owner).unwrap();

        let recorder = EventRecorder::new();
        f.realm.subscribe(Box::new(recorder.clone()));
        assert!(f.realm.revoke(&cell(0, 0), member));
        assert_eq!(recorder.events().len(), 1);
        assert!(!f.realm.revoke(&cell(0, 0), member));
        assert!(!f.realm.revoke(&cell(1, 0), member));
        assert_eq!(recorder.events().len(), 1);
    }

    #[test]
    fn access_level_is_bounded() {
        let mut f = fixture();
        let now = Utc::now();
        f.realm.claim_cell(f.owner, cell(0, 0), now).unwrap();

        assert_eq!(
            f.realm.lower_access_level(f.owner, &cell(0, 0)),
            Err(Denial::AccessLevelBound { level: Rank::Member })
        );
        assert_eq!(f.realm.raise_access_level(f.owner, &cell(0, 0)), Ok(Rank::Commander));
        assert_eq!(f.realm.raise_access_level(f.owner, &cell(0, 0)), Ok(Rank::Leader));
        assert_eq!(f.realm.raise_access_level(f.owner, &cell(0, 0)), Ok(Rank::Owner));
        assert_eq!(
            f.realm.raise_access_level(f.owner, &cell(0, 0)),
            Err(Denial::AccessLevelBound { level: Rank::Owner })
        );
        assert_eq!(f.realm.lower_access_level(f.owner, &cell(0, 0)), Ok(Rank::Leader));
    }
}
