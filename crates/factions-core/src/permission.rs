//! The permission resolver.
//!
//! [`decide`] is a pure function over a snapshot of facts about the actor
//! and the claim; [`Realm::resolve`] gathers those facts from the realm.
//! Keeping the rule table separate from the lookups makes every branch
//! testable without building a realm.
//!
//! # Rule order
//!
//! 1. Bypassing actors are always allowed.
//! 2. Unclaimed cells, claims of vanished factions, and claims of factions
//!    without enough power to cover their land are unprotected.
//! 3. Factionless actors get the owner's guest permissions.
//! 4. Members: a grant allows build actions on paid claims; buffers admit
//!    member rank and up; otherwise rank must meet the access level.
//! 5. Outsiders: mutual allies (when enabled) and relationship permissions
//!    apply only to member-level claims.

use factions_types::{CellKey, Decision, Permission, Rank, UserId, Verdict};

use crate::realm::Realm;
use crate::world::BlockPos;

/// The actor's position relative to the claim owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    /// Not in any faction.
    Factionless,
    /// A member of the owning faction, at this rank.
    Member(Rank),
    /// In a different faction.
    Outsider {
        /// The two factions are mutual allies.
        mutual_allies: bool,
        /// The owner's relationship toward the actor's faction lists the
        /// action.
        relation_allows: bool,
    },
}

/// What the resolver knows about a protected claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimFacts {
    /// The cell is a synthesized buffer.
    pub is_buffer: bool,
    /// Minimum rank to act without a grant.
    pub access_level: Rank,
    /// The actor holds an explicit grant here.
    pub actor_granted: bool,
    /// The owner's guest permissions list the action.
    pub guest_allows: bool,
    /// The actor's standing toward the owner.
    pub standing: Standing,
}

/// Apply the rule table to one action.
///
/// `claim` is `None` when no protection is in effect at the cell.
pub const fn decide(
    bypass: bool,
    claim: Option<ClaimFacts>,
    action: Permission,
    ally_override: bool,
) -> Verdict {
    if bypass {
        return Verdict::Allow;
    }
    let Some(claim) = claim else {
        return Verdict::Inapplicable;
    };
    let member_level = matches!(claim.access_level, Rank::Member);

    let allowed = match claim.standing {
        Standing::Factionless => claim.guest_allows,
        Standing::Member(rank) => {
            if !claim.is_buffer && action.is_build() && claim.actor_granted {
                true
            } else if claim.is_buffer {
                rank.outranks_or_equals(Rank::Member)
            } else {
                rank.outranks_or_equals(claim.access_level)
                    || matches!(rank, Rank::Owner)
                    || (matches!(rank, Rank::Guest) && claim.guest_allows && member_level)
            }
        }
        Standing::Outsider {
            mutual_allies,
            relation_allows,
        } => member_level && ((ally_override && mutual_allies) || relation_allows),
    };
    if allowed { Verdict::Allow } else { Verdict::Deny }
}

impl Realm {
    /// Resolve whether `actor` may perform `action` in `cell`.
    pub fn resolve(&self, actor: UserId, cell: &CellKey, action: Permission) -> Verdict {
        let bypass = self.users.get(&actor).is_some_and(|u| u.bypass);
        let facts = self.claim_facts(actor, cell, action);
        decide(
            bypass,
            facts,
            action,
            self.config.relationships.ally_overrides_permissions,
        )
    }

    /// Two-valued answer for the host world at a block position.
    pub fn check_action(&self, actor: UserId, pos: &BlockPos, action: Permission) -> Decision {
        self.resolve(actor, &pos.cell(), action).decision()
    }

    /// Facts about the claim at `cell`, or `None` when it is unprotected.
    fn claim_facts(&self, actor: UserId, cell: &CellKey, action: Permission) -> Option<ClaimFacts> {
        if !self.config.protection.claim_protection {
            return None;
        }
        let claim = self.claims.get(cell)?;
        let owner_id = claim.faction_id();
        let owner = self.factions.get(&owner_id)?;
        if !self.has_sufficient_claim_power(owner_id) {
            return None;
        }

        let standing = match self.membership_of(actor) {
            None => Standing::Factionless,
            Some(m) if m.faction_id == owner_id => Standing::Member(m.rank),
            Some(m) => Standing::Outsider {
                mutual_allies: self.is_mutual_allies(owner_id, m.faction_id),
                relation_allows: owner
                    .relationship_record(m.faction_id)
                    .is_some_and(|r| r.permissions.contains(&action)),
            },
        };
        Some(ClaimFacts {
            is_buffer: claim.is_buffer(),
            access_level: claim.access_level(),
            actor_granted: claim.is_granted(actor),
            guest_allows: owner.guest_permissions.contains(&action),
            standing,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use factions_types::{FactionId, RelationshipStatus};

    use super::*;
    use crate::config::FactionsConfig;

    fn paid(access_level: Rank, standing: Standing) -> ClaimFacts {
        ClaimFacts {
            is_buffer: false,
            access_level,
            actor_granted: false,
            guest_allows: false,
            standing,
        }
    }

    // --- pure rule table ---

    #[test]
    fn bypass_always_allows() {
        let facts = paid(Rank::Owner, Standing::Factionless);
        assert_eq!(
            decide(true, Some(facts), Permission::BreakBlocks, false),
            Verdict::Allow
        );
        assert_eq!(decide(true, None, Permission::BreakBlocks, false), Verdict::Allow);
    }

    #[test]
    fn unprotected_is_inapplicable() {
        assert_eq!(
            decide(false, None, Permission::BreakBlocks, true),
            Verdict::Inapplicable
        );
    }

    #[test]
    fn grant_beats_access_level_for_build_only() {
        let mut facts = paid(Rank::Leader, Standing::Member(Rank::Member));
        facts.actor_granted = true;
        assert_eq!(
            decide(false, Some(facts), Permission::BreakBlocks, false),
            Verdict::Allow
        );
        assert_eq!(
            decide(false, Some(facts), Permission::UseInventories, false),
            Verdict::Deny
        );
    }

    #[test]
    fn grant_never_applies_to_buffers() {
        let facts = ClaimFacts {
            is_buffer: true,
            access_level: Rank::Member,
            actor_granted: true,
            guest_allows: false,
            standing: Standing::Member(Rank::Guest),
        };
        assert_eq!(
            decide(false, Some(facts), Permission::PlaceBlocks, false),
            Verdict::Deny
        );
    }

    #[test]
    fn member_rank_against_access_level() {
        let commander = paid(Rank::Commander, Standing::Member(Rank::Commander));
        let member = paid(Rank::Commander, Standing::Member(Rank::Member));
        let owner = paid(Rank::Owner, Standing::Member(Rank::Owner));
        assert_eq!(decide(false, Some(commander), Permission::BreakBlocks, false), Verdict::Allow);
        assert_eq!(decide(false, Some(member), Permission::BreakBlocks, false), Verdict::Deny);
        assert_eq!(decide(false, Some(owner), Permission::BreakBlocks, false), Verdict::Allow);
    }

    #[test]
    fn guest_rank_uses_guest_permissions_on_member_claims() {
        let mut facts = paid(Rank::Member, Standing::Member(Rank::Guest));
        assert_eq!(decide(false, Some(facts), Permission::UseBlocks, false), Verdict::Deny);
        facts.guest_allows = true;
        assert_eq!(decide(false, Some(facts), Permission::UseBlocks, false), Verdict::Allow);
        facts.access_level = Rank::Commander;
        assert_eq!(decide(false, Some(facts), Permission::UseBlocks, false), Verdict::Deny);
    }

    #[test]
    fn outsiders_need_member_level_claims() {
        let allied = paid(
            Rank::Member,
            Standing::Outsider {
                mutual_allies: true,
                relation_allows: false,
            },
        );
        assert_eq!(decide(false, Some(allied), Permission::BreakBlocks, true), Verdict::Allow);
        assert_eq!(decide(false, Some(allied), Permission::BreakBlocks, false), Verdict::Deny);

        let mut permitted = paid(
            Rank::Member,
            Standing::Outsider {
                mutual_allies: false,
                relation_allows: true,
            },
        );
        assert_eq!(decide(false, Some(permitted), Permission::UseBlocks, false), Verdict::Allow);
        permitted.access_level = Rank::Leader;
        assert_eq!(decide(false, Some(permitted), Permission::UseBlocks, true), Verdict::Deny);
    }

    // --- realm lookups ---

    struct World {
        realm: Realm,
        owner: UserId,
        member: UserId,
        fid: FactionId,
        cell: CellKey,
    }

    fn world() -> World {
        let now = Utc::now();
        let mut realm = Realm::new(FactionsConfig::default());
        let owner = UserId::new();
        let member = UserId::new();
        let fid = realm.create_faction(owner, "Quarry", now).unwrap();
        realm.join_faction(member, fid, Rank::Member, now).unwrap();
        let cell = CellKey::new("overworld", 0, 0);
        realm.claim_cell(owner, cell.clone(), now).unwrap();
        World {
            realm,
            owner,
            member,
            fid,
            cell,
        }
    }

    #[test]
    fn explicit_grant_overrides_leader_access_level() {
        let mut w = world();
        w.realm.raise_access_level(w.owner, &w.cell).unwrap();
        w.realm.raise_access_level(w.owner, &w.cell).unwrap();
        assert_eq!(
            w.realm.claims().paid(&w.cell).map(|c| c.access_level),
            Some(Rank::Leader)
        );
        assert_eq!(
            w.realm.resolve(w.member, &w.cell, Permission::BreakBlocks),
            Verdict::Deny
        );
        w.realm.grant(&w.cell, w.member, w.owner).unwrap();
        assert_eq!(
            w.realm.resolve(w.member, &w.cell, Permission::BreakBlocks),
            Verdict::Allow
        );
    }

    #[test]
    fn factionless_uses_guest_permissions() {
        let w = world();
        let stranger = UserId::new();
        assert_eq!(
            w.realm.resolve(stranger, &w.cell, Permission::UseBlocks),
            Verdict::Allow
        );
        assert_eq!(
            w.realm.resolve(stranger, &w.cell, Permission::BreakBlocks),
            Verdict::Deny
        );
        // Buffer cells are protected too.
        let buffer = CellKey::new("overworld", 1, 1);
        assert_eq!(
            w.realm.resolve(stranger, &buffer, Permission::BreakBlocks),
            Verdict::Deny
        );
        let wild = CellKey::new("overworld", 9, 9);
        assert_eq!(
            w.realm.resolve(stranger, &wild, Permission::BreakBlocks),
            Verdict::Inapplicable
        );
    }

    #[test]
    fn underpowered_owner_loses_protection() {
        let mut w = world();
        let now = Utc::now();
        w.realm.claim_cell(w.owner, CellKey::new("overworld", 5, 0), now).unwrap();
        w.realm.set_power(w.fid, 10).unwrap();
        let stranger = UserId::new();
        assert_eq!(
            w.realm.resolve(stranger, &w.cell, Permission::BreakBlocks),
            Verdict::Deny
        );

        w.realm.adjust_power(w.fid, -1).unwrap();
        assert_eq!(
            w.realm.resolve(stranger, &w.cell, Permission::BreakBlocks),
            Verdict::Inapplicable
        );
        assert_eq!(
            w.realm.resolve(stranger, &w.cell, Permission::UseBlocks),
            Verdict::Inapplicable
        );
    }

    #[test]
    fn mutual_allies_share_member_claims() {
        let mut w = world();
        let now = Utc::now();
        let ally_owner = UserId::new();
        let ally = w.realm.create_faction(ally_owner, "Kiln", now).unwrap();

        assert_eq!(
            w.realm.resolve(ally_owner, &w.cell, Permission::BreakBlocks),
            Verdict::Deny
        );
        w.realm.declare(w.owner, ally, RelationshipStatus::Ally).unwrap();
        w.realm.declare(ally_owner, w.fid, RelationshipStatus::Ally).unwrap();
        assert_eq!(
            w.realm.resolve(ally_owner, &w.cell, Permission::BreakBlocks),
            Verdict::Allow
        );

        w.realm.config.relationships.ally_overrides_permissions = false;
        assert_eq!(
            w.realm.resolve(ally_owner, &w.cell, Permission::BreakBlocks),
            Verdict::Deny
        );
    }

    #[test]
    fn check_action_folds_inapplicable_to_allow() {
        let w = world();
        let stranger = UserId::new();
        let inside = BlockPos::new("overworld", 3, 64, 3);
        let outside = BlockPos::new("overworld", 500, 64, 500);
        assert_eq!(
            w.realm.check_action(stranger, &inside, Permission::BreakBlocks),
            Decision::Deny
        );
        assert_eq!(
            w.realm.check_action(stranger, &outside, Permission::BreakBlocks),
            Decision::Allow
        );
    }

    #[test]
    fn disabled_protection_is_inapplicable() {
        let mut w = world();
        w.realm.config.protection.claim_protection = false;
        assert_eq!(
            w.realm.resolve(UserId::new(), &w.cell, Permission::BreakBlocks),
            Verdict::Inapplicable
        );
    }
}
