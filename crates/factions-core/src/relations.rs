//! Directed relationships, guest policy, and friendly-fire shielding.
//!
//! Relationships are one-way: A may call B an ally while B stays neutral.
//! Only when both directions say ally are the two "mutual allies", which
//! raises both factions' maximum power and unlocks the ally override in the
//! permission resolver.
//!
//! A neutral relationship with no permissions is never stored. Every write
//! goes through [`Realm::set_relationship`], which drops such records.

use tracing::{debug, info};

use factions_events::FactionEvent;
use factions_types::{FactionId, Permission, Rank, Relationship, RelationshipStatus, UserId};

use crate::error::{Denial, InvariantViolation};
use crate::realm::Realm;

impl Realm {
    /// `source`'s stance toward `target`. Never absent: an unknown source or
    /// missing record reads as neutral with no permissions.
    pub fn relationship(&self, source: FactionId, target: FactionId) -> Relationship {
        self.factions
            .get(&source)
            .map_or_else(|| Relationship::neutral(target), |f| f.relationship(target))
    }

    /// Both directions say ally.
    pub fn is_mutual_allies(&self, a: FactionId, b: FactionId) -> bool {
        a != b
            && self.relationship(a, b).status == RelationshipStatus::Ally
            && self.relationship(b, a).status == RelationshipStatus::Ally
    }

    /// Number of live factions that are mutual allies of `faction_id`.
    pub fn mutual_ally_count(&self, faction_id: FactionId) -> usize {
        self.factions.get(&faction_id).map_or(0, |faction| {
            faction
                .relationships
                .values()
                .filter(|r| r.status == RelationshipStatus::Ally)
                .filter(|r| self.factions.contains_key(&r.target))
                .filter(|r| self.is_mutual_allies(faction_id, r.target))
                .count()
        })
    }

    /// Store `relationship` as `source`'s stance toward its target, removing
    /// the record instead when it is the default.
    ///
    /// Changing an alliance can shrink the maximum power of both sides, so
    /// both bases are re-clamped afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::UnknownFaction`] if `source` does not
    /// exist.
    pub fn set_relationship(
        &mut self,
        source: FactionId,
        relationship: Relationship,
    ) -> Result<(), InvariantViolation> {
        let target = relationship.target;
        let faction = self.faction_mut(source)?;
        if relationship.is_default() {
            faction.relationships.remove(&target);
        } else {
            faction.relationships.insert(target, relationship);
        }
        self.emit(&FactionEvent::FactionModified { faction_id: source });

        self.reclamp_power(source)?;
        if self.factions.contains_key(&target) {
            self.reclamp_power(target)?;
        }
        Ok(())
    }

    /// Set the actor's faction's status toward `target`, keeping any
    /// permissions already granted to it.
    ///
    /// # Errors
    ///
    /// [`Denial::InsufficientRank`] below leader, [`Denial::SelfRelationship`],
    /// [`Denial::FactionNotFound`], or [`Denial::NoChange`].
    pub fn declare(
        &mut self,
        actor: UserId,
        target: FactionId,
        status: RelationshipStatus,
    ) -> Result<(), Denial> {
        let source = self.relation_source(actor, target)?;
        let mut relationship = self.relationship(source, target);
        if relationship.status == status {
            return Err(Denial::NoChange);
        }
        relationship.status = status;
        info!(%source, %target, ?status, "Relationship declared");
        self.set_relationship(source, relationship)?;
        Ok(())
    }

    /// Let members of `target` perform `permission` on the actor's faction's
    /// member-level claims.
    ///
    /// # Errors
    ///
    /// As [`Realm::declare`].
    pub fn add_relationship_permission(
        &mut self,
        actor: UserId,
        target: FactionId,
        permission: Permission,
    ) -> Result<(), Denial> {
        let source = self.relation_source(actor, target)?;
        let mut relationship = self.relationship(source, target);
        if !relationship.permissions.insert(permission) {
            return Err(Denial::NoChange);
        }
        self.set_relationship(source, relationship)?;
        Ok(())
    }

    /// Withdraw a permission from `target`.
    ///
    /// # Errors
    ///
    /// As [`Realm::declare`].
    pub fn remove_relationship_permission(
        &mut self,
        actor: UserId,
        target: FactionId,
        permission: Permission,
    ) -> Result<(), Denial> {
        let source = self.relation_source(actor, target)?;
        let mut relationship = self.relationship(source, target);
        if !relationship.permissions.remove(&permission) {
            return Err(Denial::NoChange);
        }
        self.set_relationship(source, relationship)?;
        Ok(())
    }

    /// Let factionless players perform `permission` on the actor's claims.
    ///
    /// # Errors
    ///
    /// [`Denial::InsufficientRank`] below leader or [`Denial::NoChange`].
    pub fn add_guest_permission(
        &mut self,
        actor: UserId,
        permission: Permission,
    ) -> Result<(), Denial> {
        let faction_id = self.require_rank(actor, Rank::Leader)?.faction_id;
        if !self.faction_mut(faction_id)?.guest_permissions.insert(permission) {
            return Err(Denial::NoChange);
        }
        self.emit(&FactionEvent::FactionModified { faction_id });
        Ok(())
    }

    /// Withdraw a guest permission.
    ///
    /// # Errors
    ///
    /// [`Denial::InsufficientRank`] below leader or [`Denial::NoChange`].
    pub fn remove_guest_permission(
        &mut self,
        actor: UserId,
        permission: Permission,
    ) -> Result<(), Denial> {
        let faction_id = self.require_rank(actor, Rank::Leader)?.faction_id;
        if !self.faction_mut(faction_id)?.guest_permissions.remove(&permission) {
            return Err(Denial::NoChange);
        }
        self.emit(&FactionEvent::FactionModified { faction_id });
        Ok(())
    }

    /// Whether `victim` is protected from `attacker` by the friendly-fire
    /// rule: same faction, or mutual allies, while friendly fire is off.
    pub fn is_shielded(&self, attacker: UserId, victim: UserId) -> bool {
        if self.config.protection.friendly_fire || attacker == victim {
            return false;
        }
        let (Some(a), Some(v)) = (self.membership_of(attacker), self.membership_of(victim)) else {
            return false;
        };
        a.faction_id == v.faction_id || self.is_mutual_allies(a.faction_id, v.faction_id)
    }

    fn relation_source(&self, actor: UserId, target: FactionId) -> Result<FactionId, Denial> {
        let source = self.require_rank(actor, Rank::Leader)?.faction_id;
        if source == target {
            return Err(Denial::SelfRelationship);
        }
        if !self.factions.contains_key(&target) {
            debug!(%actor, %target, "Relationship target missing");
            return Err(Denial::FactionNotFound(target));
        }
        Ok(source)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::FactionsConfig;

    struct Pair {
        realm: Realm,
        a_owner: UserId,
        b_owner: UserId,
        a: FactionId,
        b: FactionId,
    }

    fn pair() -> Pair {
        let now = Utc::now();
        let mut realm = Realm::new(FactionsConfig::default());
        let a_owner = UserId::new();
        let b_owner = UserId::new();
        let a = realm.create_faction(a_owner, "Aster", now).unwrap();
        let b = realm.create_faction(b_owner, "Birch", now).unwrap();
        Pair {
            realm,
            a_owner,
            b_owner,
            a,
            b,
        }
    }

    #[test]
    fn missing_record_reads_neutral() {
        let p = pair();
        let rel = p.realm.relationship(p.a, p.b);
        assert_eq!(rel.status, RelationshipStatus::Neutral);
        assert!(rel.permissions.is_empty());
        assert_eq!(rel.target, p.b);
    }

    #[test]
    fn mutual_alliance_needs_both_sides() {
        let mut p = pair();
        assert!(p.realm.declare(p.a_owner, p.b, RelationshipStatus::Ally).is_ok());
        assert!(!p.realm.is_mutual_allies(p.a, p.b));
        assert_eq!(p.realm.mutual_ally_count(p.a), 0);

        assert!(p.realm.declare(p.b_owner, p.a, RelationshipStatus::Ally).is_ok());
        assert!(p.realm.is_mutual_allies(p.a, p.b));
        assert!(p.realm.is_mutual_allies(p.b, p.a));
        assert_eq!(p.realm.mutual_ally_count(p.a), 1);
        // base 20 + one member 20 + one ally 10
        assert_eq!(p.realm.max_power(p.a), Ok(50));
    }

    #[test]
    fn neutral_without_permissions_is_not_stored() {
        let mut p = pair();
        assert!(p.realm.declare(p.a_owner, p.b, RelationshipStatus::Enemy).is_ok());
        assert!(p.realm.faction(p.a).unwrap().relationship_record(p.b).is_some());
        assert!(p.realm.declare(p.a_owner, p.b, RelationshipStatus::Neutral).is_ok());
        assert!(p.realm.faction(p.a).unwrap().relationship_record(p.b).is_none());
    }

    #[test]
    fn neutral_with_permissions_is_kept() {
        let mut p = pair();
        assert!(
            p.realm
                .add_relationship_permission(p.a_owner, p.b, Permission::UseBlocks)
                .is_ok()
        );
        let stored = p.realm.faction(p.a).unwrap().relationship_record(p.b).cloned();
        assert_eq!(stored.map(|r| r.status), Some(RelationshipStatus::Neutral));
        assert_eq!(
            p.realm
                .add_relationship_permission(p.a_owner, p.b, Permission::UseBlocks),
            Err(Denial::NoChange)
        );
        assert!(
            p.realm
                .remove_relationship_permission(p.a_owner, p.b, Permission::UseBlocks)
                .is_ok()
        );
        assert!(p.realm.faction(p.a).unwrap().relationships.is_empty());
    }

    #[test]
    fn declare_rejects_self_and_unknown() {
        let mut p = pair();
        assert_eq!(
            p.realm.declare(p.a_owner, p.a, RelationshipStatus::Ally),
            Err(Denial::SelfRelationship)
        );
        assert!(matches!(
            p.realm.declare(p.a_owner, FactionId::new(), RelationshipStatus::Ally),
            Err(Denial::FactionNotFound(_))
        ));
        assert!(matches!(
            p.realm.declare(UserId::new(), p.b, RelationshipStatus::Ally),
            Err(Denial::NotInFaction)
        ));
    }

    #[test]
    fn breaking_alliance_reclamps_base() {
        let mut p = pair();
        assert!(p.realm.declare(p.a_owner, p.b, RelationshipStatus::Ally).is_ok());
        assert!(p.realm.declare(p.b_owner, p.a, RelationshipStatus::Ally).is_ok());
        assert!(p.realm.set_power(p.a, 50).is_ok());
        assert_eq!(p.realm.faction(p.a).map(|f| f.base_power), Some(50));

        assert!(p.realm.declare(p.b_owner, p.a, RelationshipStatus::Neutral).is_ok());
        assert_eq!(p.realm.faction(p.a).map(|f| f.base_power), Some(40));
    }

    #[test]
    fn disbanding_an_ally_reclamps_the_survivor() {
        let mut p = pair();
        assert!(p.realm.declare(p.a_owner, p.b, RelationshipStatus::Ally).is_ok());
        assert!(p.realm.declare(p.b_owner, p.a, RelationshipStatus::Ally).is_ok());
        assert!(p.realm.set_power(p.a, 50).is_ok());

        assert!(p.realm.disband(p.b).is_ok());
        let max = p.realm.max_power(p.a).unwrap();
        assert_eq!(max, 40);
        assert_eq!(p.realm.faction(p.a).map(|f| f.base_power), Some(max));
        assert!(p.realm.faction(p.a).unwrap().relationships.is_empty());
    }

    #[test]
    fn guest_permissions_edit() {
        let mut p = pair();
        assert_eq!(
            p.realm.add_guest_permission(p.a_owner, Permission::UseBlocks),
            Err(Denial::NoChange)
        );
        assert!(
            p.realm
                .add_guest_permission(p.a_owner, Permission::UseInventories)
                .is_ok()
        );
        assert!(
            p.realm
                .faction(p.a)
                .unwrap()
                .guest_permissions
                .contains(&Permission::UseInventories)
        );
        assert!(
            p.realm
                .remove_guest_permission(p.a_owner, Permission::UseBlocks)
                .is_ok()
        );
    }

    #[test]
    fn friendly_fire_shield() {
        let mut p = pair();
        let now = Utc::now();
        let a_member = UserId::new();
        assert!(p.realm.join_faction(a_member, p.a, Rank::Member, now).is_ok());

        assert!(p.realm.is_shielded(p.a_owner, a_member));
        assert!(!p.realm.is_shielded(p.a_owner, p.b_owner));
        assert!(!p.realm.is_shielded(p.a_owner, UserId::new()));

        assert!(p.realm.declare(p.a_owner, p.b, RelationshipStatus::Ally).is_ok());
        assert!(p.realm.declare(p.b_owner, p.a, RelationshipStatus::Ally).is_ok());
        assert!(p.realm.is_shielded(a_member, p.b_owner));

        p.realm.config.protection.friendly_fire = true;
        assert!(!p.realm.is_shielded(p.a_owner, a_member));
    }
}
