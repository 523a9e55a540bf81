//! Membership and faction lifecycle.
//!
//! Two layers live here. The primitive transitions
//! ([`Realm::join_faction`], [`Realm::leave_faction`], [`Realm::disband`])
//! keep users, claims, and relationships consistent and are what the power
//! and audit passes call. The actor-facing operations (`create_faction`,
//! `join`, `kick`, `promote`, ...) check policy first and return a
//! [`Denial`] when it refuses.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use factions_events::FactionEvent;
use factions_types::{EntityKind, Faction, FactionId, Home, Membership, Rank, User, UserId};

use crate::error::{Denial, InvariantViolation};
use crate::realm::Realm;

impl Realm {
    // -------------------------------------------------------------------
    // Primitive transitions
    // -------------------------------------------------------------------

    /// Put `user` in `faction_id` at `rank`, starting a new drain epoch.
    ///
    /// A user already in another faction leaves it first.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::UnknownFaction`] if the faction does not
    /// exist.
    pub fn join_faction(
        &mut self,
        user: UserId,
        faction_id: FactionId,
        rank: Rank,
        now: DateTime<Utc>,
    ) -> Result<(), InvariantViolation> {
        if !self.factions.contains_key(&faction_id) {
            return Err(InvariantViolation::UnknownFaction(faction_id));
        }
        let previous = self
            .user(user)
            .and_then(User::faction_id)
            .filter(|current| *current != faction_id);
        if previous.is_some() {
            self.leave_faction(user);
        }
        let record = self.user_entry(user, now);
        record.membership = Some(Membership { faction_id, rank });
        record.power_drained = 0;
        info!(%user, %faction_id, %rank, "Member joined");
        self.emit(&FactionEvent::MemberJoined {
            user_id: user,
            faction_id,
        });
        // The faction left behind lost a member's worth of max power.
        if let Some(old) = previous
            && self.factions.contains_key(&old)
        {
            self.reclamp_power(old)?;
        }
        Ok(())
    }

    /// Remove `user` from their faction and revoke every grant they held on
    /// its claims. Returns the faction left, or `None` if already
    /// factionless.
    pub fn leave_faction(&mut self, user: UserId) -> Option<FactionId> {
        let record = self.users.get_mut(&user)?;
        // Capture before clearing: grants are revoked against the old faction.
        let faction_id = record.membership.take()?.faction_id;

        for cell in self.claims.revoke_everywhere(faction_id, user) {
            self.emit(&FactionEvent::ClaimModified { cell, faction_id });
        }
        info!(%user, %faction_id, "Member left");
        self.emit(&FactionEvent::MemberLeft {
            user_id: user,
            faction_id,
        });
        Some(faction_id)
    }

    /// Remove a faction and everything hanging off it: members leave,
    /// relationships pointing at it are dropped, its claims are released.
    ///
    /// This is the only path that deletes a faction.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::UnknownFaction`] if it does not exist.
    pub fn disband(&mut self, faction_id: FactionId) -> Result<(), InvariantViolation> {
        if !self.factions.contains_key(&faction_id) {
            return Err(InvariantViolation::UnknownFaction(faction_id));
        }

        for member in self.members(faction_id) {
            self.leave_faction(member);
        }

        let touched: Vec<FactionId> = self
            .factions
            .values_mut()
            .filter(|f| f.id != faction_id)
            .filter_map(|f| f.relationships.remove(&faction_id).map(|_| f.id))
            .collect();
        for other in touched {
            self.emit(&FactionEvent::FactionModified { faction_id: other });
            self.reclamp_power(other)?;
        }

        let released = self.claims.remove_all(faction_id);
        self.emit(&FactionEvent::AllClaimsRemoved {
            faction_id,
            count: released.len(),
        });

        let name = self
            .factions
            .remove(&faction_id)
            .map(|f| f.name)
            .unwrap_or_default();
        info!(%faction_id, %name, claims = released.len(), "Faction disbanded");
        self.emit(&FactionEvent::FactionDisbanded { faction_id });
        Ok(())
    }

    // -------------------------------------------------------------------
    // Founding and joining
    // -------------------------------------------------------------------

    /// Found a faction with `founder` as owner.
    ///
    /// # Errors
    ///
    /// [`Denial::AlreadyInFaction`], [`Denial::EmptyName`], or
    /// [`Denial::NameTaken`].
    pub fn create_faction(
        &mut self,
        founder: UserId,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<FactionId, Denial> {
        if self.membership_of(founder).is_some() {
            return Err(Denial::AlreadyInFaction);
        }
        let name = self.check_name(name, None)?;

        let faction = Faction {
            id: FactionId::new(),
            name,
            description: String::new(),
            motd: String::new(),
            color: String::from("white"),
            open: false,
            base_power: self.config.power.base.max(0),
            admin_power: 0,
            invites: BTreeSet::new(),
            relationships: BTreeMap::new(),
            guest_permissions: self.config.relationships.default_guest_permissions.clone(),
            home: None,
            created_at: now,
        };
        let faction_id = faction.id;
        info!(%faction_id, name = %faction.name, %founder, "Faction created");
        self.factions.insert(faction_id, faction);
        self.emit(&FactionEvent::FactionCreated {
            faction_id,
            founder,
        });
        self.join_faction(founder, faction_id, Rank::Owner, now)?;
        Ok(faction_id)
    }

    /// Join an open faction, or a closed one the user was invited to.
    /// Consumes the invite and joins as [`Rank::Member`].
    ///
    /// # Errors
    ///
    /// [`Denial::FactionNotFound`], [`Denial::AlreadyInFaction`], or
    /// [`Denial::NotInvited`].
    pub fn join(
        &mut self,
        user: UserId,
        faction_id: FactionId,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        if !self.factions.contains_key(&faction_id) {
            return Err(Denial::FactionNotFound(faction_id));
        }
        if self.membership_of(user).is_some() {
            return Err(Denial::AlreadyInFaction);
        }
        let faction = self.faction_mut(faction_id)?;
        let invited = faction.invites.remove(&user);
        if !invited && !faction.open {
            return Err(Denial::NotInvited);
        }
        if invited {
            self.emit(&FactionEvent::FactionModified { faction_id });
        }
        self.join_faction(user, faction_id, Rank::Member, now)?;
        Ok(())
    }

    /// Leave the actor's faction. A sole owner's departure disbands it; an
    /// owner with other members must transfer ownership first.
    ///
    /// # Errors
    ///
    /// [`Denial::NotInFaction`] or [`Denial::OwnerMustTransfer`].
    pub fn leave(&mut self, actor: UserId) -> Result<FactionId, Denial> {
        let membership = self.require_membership(actor)?;
        let faction_id = membership.faction_id;
        if membership.rank == Rank::Owner {
            if self.member_count(faction_id) > 1 {
                return Err(Denial::OwnerMustTransfer);
            }
            self.disband(faction_id)?;
            return Ok(faction_id);
        }
        self.leave_faction(actor);
        self.reclamp_power(faction_id)?;
        Ok(faction_id)
    }

    /// Invite `target` to the actor's faction.
    ///
    /// # Errors
    ///
    /// [`Denial::InsufficientRank`] below commander, [`Denial::AlreadyMember`],
    /// or [`Denial::AlreadyInvited`].
    pub fn invite(&mut self, actor: UserId, target: UserId) -> Result<(), Denial> {
        let membership = self.require_rank(actor, Rank::Commander)?;
        let faction_id = membership.faction_id;
        if self
            .membership_of(target)
            .is_some_and(|m| m.faction_id == faction_id)
        {
            return Err(Denial::AlreadyMember(target));
        }
        let faction = self.faction_mut(faction_id)?;
        if !faction.invites.insert(target) {
            return Err(Denial::AlreadyInvited);
        }
        debug!(%actor, %target, %faction_id, "Invite sent");
        self.emit(&FactionEvent::FactionModified { faction_id });
        Ok(())
    }

    /// Withdraw an invite.
    ///
    /// # Errors
    ///
    /// [`Denial::InsufficientRank`] below commander or [`Denial::NotInvited`].
    pub fn uninvite(&mut self, actor: UserId, target: UserId) -> Result<(), Denial> {
        let faction_id = self.require_rank(actor, Rank::Commander)?.faction_id;
        let faction = self.faction_mut(faction_id)?;
        if !faction.invites.remove(&target) {
            return Err(Denial::NotInvited);
        }
        self.emit(&FactionEvent::FactionModified { faction_id });
        Ok(())
    }

    // -------------------------------------------------------------------
    // Discipline and ranks
    // -------------------------------------------------------------------

    /// Remove `target` from the actor's faction.
    ///
    /// Leaders and owners may kick; a leader cannot kick another leader or
    /// the owner.
    ///
    /// # Errors
    ///
    /// [`Denial::CannotTargetSelf`], [`Denial::InsufficientRank`],
    /// [`Denial::TargetNotInFaction`], or [`Denial::TargetOutranks`].
    pub fn kick(&mut self, actor: UserId, target: UserId) -> Result<(), Denial> {
        if actor == target {
            return Err(Denial::CannotTargetSelf);
        }
        let membership = self.require_rank(actor, Rank::Leader)?;
        let target_rank = self.target_rank(membership.faction_id, target)?;
        if !membership.rank.outranks(target_rank) {
            return Err(Denial::TargetOutranks { rank: target_rank });
        }
        self.leave_faction(target);
        self.reclamp_power(membership.faction_id)?;
        info!(%actor, %target, faction_id = %membership.faction_id, "Member kicked");
        Ok(())
    }

    /// Raise `target` one rank. The actor must outrank the resulting rank,
    /// and nobody is promoted to owner this way.
    ///
    /// # Errors
    ///
    /// [`Denial::CannotTargetSelf`], [`Denial::TargetNotInFaction`],
    /// [`Denial::RankLimit`], or [`Denial::TargetOutranks`].
    pub fn promote(&mut self, actor: UserId, target: UserId) -> Result<Rank, Denial> {
        if actor == target {
            return Err(Denial::CannotTargetSelf);
        }
        let membership = self.require_membership(actor)?;
        let current = self.target_rank(membership.faction_id, target)?;
        let next = current
            .above()
            .filter(|r| *r != Rank::Owner)
            .ok_or(Denial::RankLimit { rank: current })?;
        if !membership.rank.outranks(next) {
            return Err(Denial::TargetOutranks { rank: current });
        }
        self.set_rank(target, membership.faction_id, next);
        Ok(next)
    }

    /// Lower `target` one rank. The actor must outrank the target's current
    /// rank.
    ///
    /// # Errors
    ///
    /// [`Denial::CannotTargetSelf`], [`Denial::TargetNotInFaction`],
    /// [`Denial::TargetOutranks`], or [`Denial::RankLimit`].
    pub fn demote(&mut self, actor: UserId, target: UserId) -> Result<Rank, Denial> {
        if actor == target {
            return Err(Denial::CannotTargetSelf);
        }
        let membership = self.require_membership(actor)?;
        let current = self.target_rank(membership.faction_id, target)?;
        if !membership.rank.outranks(current) {
            return Err(Denial::TargetOutranks { rank: current });
        }
        let next = current.below().ok_or(Denial::RankLimit { rank: current })?;
        self.set_rank(target, membership.faction_id, next);
        Ok(next)
    }

    /// Hand ownership to `target`; the previous owner becomes a leader.
    ///
    /// # Errors
    ///
    /// [`Denial::CannotTargetSelf`], [`Denial::InsufficientRank`] unless the
    /// actor is the owner, or [`Denial::TargetNotInFaction`].
    pub fn transfer_ownership(&mut self, actor: UserId, target: UserId) -> Result<(), Denial> {
        if actor == target {
            return Err(Denial::CannotTargetSelf);
        }
        let membership = self.require_rank(actor, Rank::Owner)?;
        self.target_rank(membership.faction_id, target)?;
        self.set_rank(target, membership.faction_id, Rank::Owner);
        self.set_rank(actor, membership.faction_id, Rank::Leader);
        info!(from = %actor, to = %target, faction_id = %membership.faction_id, "Ownership transferred");
        Ok(())
    }

    /// Disband the actor's faction. Owner only.
    ///
    /// # Errors
    ///
    /// [`Denial::InsufficientRank`] unless the actor is the owner.
    pub fn disband_by(&mut self, actor: UserId) -> Result<FactionId, Denial> {
        let faction_id = self.require_rank(actor, Rank::Owner)?.faction_id;
        self.disband(faction_id)?;
        Ok(faction_id)
    }

    // -------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------

    /// Rename the actor's faction.
    ///
    /// # Errors
    ///
    /// [`Denial::InsufficientRank`] below leader, [`Denial::EmptyName`], or
    /// [`Denial::NameTaken`].
    pub fn rename(&mut self, actor: UserId, name: &str) -> Result<(), Denial> {
        let faction_id = self.require_rank(actor, Rank::Leader)?.faction_id;
        let name = self.check_name(name, Some(faction_id))?;
        self.edit_faction(faction_id, |f| f.name = name)
    }

    /// Set the description.
    ///
    /// # Errors
    ///
    /// [`Denial::InsufficientRank`] below leader.
    pub fn set_description(&mut self, actor: UserId, description: &str) -> Result<(), Denial> {
        let faction_id = self.require_rank(actor, Rank::Leader)?.faction_id;
        let description = description.trim().to_owned();
        self.edit_faction(faction_id, |f| f.description = description)
    }

    /// Set the message of the day.
    ///
    /// # Errors
    ///
    /// [`Denial::InsufficientRank`] below leader.
    pub fn set_motd(&mut self, actor: UserId, motd: &str) -> Result<(), Denial> {
        let faction_id = self.require_rank(actor, Rank::Leader)?.faction_id;
        let motd = motd.trim().to_owned();
        self.edit_faction(faction_id, |f| f.motd = motd)
    }

    /// Set the display colour.
    ///
    /// # Errors
    ///
    /// [`Denial::InsufficientRank`] below leader.
    pub fn set_color(&mut self, actor: UserId, color: &str) -> Result<(), Denial> {
        let faction_id = self.require_rank(actor, Rank::Leader)?.faction_id;
        let color = color.trim().to_lowercase();
        self.edit_faction(faction_id, |f| f.color = color)
    }

    /// Open or close the faction to uninvited joins.
    ///
    /// # Errors
    ///
    /// [`Denial::InsufficientRank`] below leader.
    pub fn set_open(&mut self, actor: UserId, open: bool) -> Result<(), Denial> {
        let faction_id = self.require_rank(actor, Rank::Leader)?.faction_id;
        self.edit_faction(faction_id, |f| f.open = open)
    }

    /// Set the faction home.
    ///
    /// # Errors
    ///
    /// [`Denial::InsufficientRank`] below leader.
    pub fn set_home(&mut self, actor: UserId, home: Home) -> Result<(), Denial> {
        let faction_id = self.require_rank(actor, Rank::Leader)?.faction_id;
        self.faction_mut(faction_id)?.home = Some(home);
        self.emit(&FactionEvent::HomeSet { faction_id });
        Ok(())
    }

    // -------------------------------------------------------------------
    // Per-user flags
    // -------------------------------------------------------------------

    /// Toggle claim-protection bypass for `user`.
    pub fn set_bypass(&mut self, user: UserId, bypass: bool, now: DateTime<Utc>) {
        let record = self.user_entry(user, now);
        if record.bypass != bypass {
            record.bypass = bypass;
            info!(%user, bypass, "Bypass changed");
            self.mark_dirty(EntityKind::Users);
        }
    }

    /// Record that `user` was online at `seen`.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::Power`] if `seen` is before the epoch
    /// or after `now`.
    pub fn record_seen(
        &mut self,
        user: UserId,
        seen: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), InvariantViolation> {
        factions_power::decay::check_last_online(seen, now)?;
        self.user_entry(user, now).last_online = seen;
        self.mark_dirty(EntityKind::Users);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------

    fn check_name(&self, name: &str, renaming: Option<FactionId>) -> Result<String, Denial> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Denial::EmptyName);
        }
        if self
            .faction_by_name(name)
            .is_some_and(|f| Some(f.id) != renaming)
        {
            return Err(Denial::NameTaken {
                name: name.to_owned(),
            });
        }
        Ok(name.to_owned())
    }

    fn target_rank(&self, faction_id: FactionId, target: UserId) -> Result<Rank, Denial> {
        self.membership_of(target)
            .filter(|m| m.faction_id == faction_id)
            .map(|m| m.rank)
            .ok_or(Denial::TargetNotInFaction(target))
    }

    fn set_rank(&mut self, user: UserId, faction_id: FactionId, rank: Rank) {
        if let Some(record) = self.users.get_mut(&user) {
            record.membership = Some(Membership { faction_id, rank });
            info!(%user, %faction_id, %rank, "Rank changed");
            self.emit(&FactionEvent::RankChanged {
                user_id: user,
                faction_id,
                rank,
            });
        }
    }

    fn edit_faction(
        &mut self,
        faction_id: FactionId,
        edit: impl FnOnce(&mut Faction),
    ) -> Result<(), Denial> {
        edit(self.faction_mut(faction_id)?);
        self.emit(&FactionEvent::FactionModified { faction_id });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use factions_events::EventRecorder;
    use factions_types::{CellKey, Claim};

    use super::*;
    use crate::config::FactionsConfig;

    fn realm() -> Realm {
        Realm::new(FactionsConfig::default())
    }

    #[test]
    fn founder_becomes_owner_with_base_power() {
        let mut realm = realm();
        let owner = UserId::new();
        let fid = realm.create_faction(owner, "Irongate", Utc::now()).unwrap();
        assert_eq!(realm.membership_of(owner).map(|m| m.rank), Some(Rank::Owner));
        assert_eq!(realm.faction(fid).map(|f| f.base_power), Some(20));
    }

    #[test]
    fn names_are_unique_case_insensitively() {
        let mut realm = realm();
        let now = Utc::now();
        assert!(realm.create_faction(UserId::new(), "Irongate", now).is_ok());
        assert!(matches!(
            realm.create_faction(UserId::new(), "  IRONGATE ", now),
            Err(Denial::NameTaken { .. })
        ));
        assert_eq!(
            realm.create_faction(UserId::new(), "   ", now),
            Err(Denial::EmptyName)
        );
    }

    #[test]
    fn closed_faction_requires_invite() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let joiner = UserId::new();
        let fid = realm.create_faction(owner, "Vale", now).unwrap();

        assert_eq!(realm.join(joiner, fid, now), Err(Denial::NotInvited));
        assert!(realm.invite(owner, joiner).is_ok());
        assert_eq!(realm.invite(owner, joiner), Err(Denial::AlreadyInvited));
        assert!(realm.join(joiner, fid, now).is_ok());
        assert_eq!(realm.membership_of(joiner).map(|m| m.rank), Some(Rank::Member));
        assert!(realm.faction(fid).unwrap().invites.is_empty());
    }

    #[test]
    fn open_faction_accepts_anyone() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let fid = realm.create_faction(owner, "Vale", now).unwrap();
        assert!(realm.set_open(owner, true).is_ok());
        assert!(realm.join(UserId::new(), fid, now).is_ok());
        assert_eq!(realm.member_count(fid), 2);
    }

    #[test]
    fn joining_resets_drain_counter() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let user = UserId::new();
        let fid = realm.create_faction(owner, "Vale", now).unwrap();
        realm.user_entry(user, now).power_drained = 15;
        assert!(realm.join_faction(user, fid, Rank::Member, now).is_ok());
        assert_eq!(realm.user(user).map(|u| u.power_drained), Some(0));
    }

    #[test]
    fn moving_to_another_faction_reclamps_the_old_one() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let user = UserId::new();
        let vale = realm.create_faction(owner, "Vale", now).unwrap();
        let rook = realm.create_faction(UserId::new(), "Rook", now).unwrap();
        assert!(realm.join_faction(user, vale, Rank::Member, now).is_ok());
        assert!(realm.set_power(vale, 60).is_ok());

        assert!(realm.join_faction(user, rook, Rank::Member, now).is_ok());
        assert_eq!(realm.membership_of(user).map(|m| m.faction_id), Some(rook));
        assert_eq!(realm.faction(vale).map(|f| f.base_power), Some(40));
        assert_eq!(realm.max_power(vale), Ok(40));
    }

    #[test]
    fn leaving_revokes_grants_on_old_faction() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let member = UserId::new();
        let fid = realm.create_faction(owner, "Vale", now).unwrap();
        assert!(realm.join_faction(member, fid, Rank::Member, now).is_ok());
        let cell = CellKey::new("overworld", 0, 0);
        assert!(realm.claims.add(Claim::new(cell.clone(), fid, now)).is_ok());
        assert!(realm.claims.grant(&cell, member).is_ok());

        let recorder = EventRecorder::new();
        realm.subscribe(Box::new(recorder.clone()));
        assert_eq!(realm.leave_faction(member), Some(fid));

        assert!(realm.claims.paid(&cell).unwrap().granted.is_empty());
        assert!(realm.membership_of(member).is_none());
        let names: Vec<&str> = recorder.events().iter().map(FactionEvent::name).collect();
        assert_eq!(names, vec!["claim_modified", "member_left"]);
        assert_eq!(realm.leave_faction(member), None);
    }

    #[test]
    fn owner_cannot_abandon_populated_faction() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let fid = realm.create_faction(owner, "Vale", now).unwrap();
        assert!(realm.join_faction(UserId::new(), fid, Rank::Member, now).is_ok());
        assert_eq!(realm.leave(owner), Err(Denial::OwnerMustTransfer));
    }

    #[test]
    fn sole_owner_leaving_disbands() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let fid = realm.create_faction(owner, "Vale", now).unwrap();
        assert_eq!(realm.leave(owner), Ok(fid));
        assert!(realm.faction(fid).is_none());
    }

    #[test]
    fn kick_rules() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let leader = UserId::new();
        let other_leader = UserId::new();
        let member = UserId::new();
        let fid = realm.create_faction(owner, "Vale", now).unwrap();
        for (user, rank) in [
            (leader, Rank::Leader),
            (other_leader, Rank::Leader),
            (member, Rank::Member),
        ] {
            assert!(realm.join_faction(user, fid, rank, now).is_ok());
        }

        assert_eq!(realm.kick(leader, leader), Err(Denial::CannotTargetSelf));
        assert!(matches!(
            realm.kick(leader, other_leader),
            Err(Denial::TargetOutranks { .. })
        ));
        assert!(matches!(
            realm.kick(leader, owner),
            Err(Denial::TargetOutranks { .. })
        ));
        assert!(matches!(
            realm.kick(member, leader),
            Err(Denial::InsufficientRank { .. })
        ));
        assert!(realm.kick(leader, member).is_ok());
        assert!(realm.kick(owner, other_leader).is_ok());
        assert_eq!(realm.member_count(fid), 2);
    }

    #[test]
    fn promotion_stops_below_owner() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let user = UserId::new();
        let fid = realm.create_faction(owner, "Vale", now).unwrap();
        assert!(realm.join_faction(user, fid, Rank::Guest, now).is_ok());

        assert_eq!(realm.promote(owner, user), Ok(Rank::Member));
        assert_eq!(realm.promote(owner, user), Ok(Rank::Commander));
        assert_eq!(realm.promote(owner, user), Ok(Rank::Leader));
        assert_eq!(
            realm.promote(owner, user),
            Err(Denial::RankLimit { rank: Rank::Leader })
        );
        assert!(matches!(
            realm.demote(user, owner),
            Err(Denial::TargetOutranks { .. })
        ));
        assert_eq!(realm.demote(owner, user), Ok(Rank::Commander));
    }

    #[test]
    fn leader_cannot_promote_to_leader() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let leader = UserId::new();
        let user = UserId::new();
        let fid = realm.create_faction(owner, "Vale", now).unwrap();
        assert!(realm.join_faction(leader, fid, Rank::Leader, now).is_ok());
        assert!(realm.join_faction(user, fid, Rank::Commander, now).is_ok());
        assert!(matches!(
            realm.promote(leader, user),
            Err(Denial::TargetOutranks { .. })
        ));
    }

    #[test]
    fn ownership_transfer_swaps_ranks() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let heir = UserId::new();
        let fid = realm.create_faction(owner, "Vale", now).unwrap();
        assert!(realm.join_faction(heir, fid, Rank::Member, now).is_ok());
        assert!(realm.transfer_ownership(owner, heir).is_ok());
        assert_eq!(realm.membership_of(heir).map(|m| m.rank), Some(Rank::Owner));
        assert_eq!(realm.membership_of(owner).map(|m| m.rank), Some(Rank::Leader));
        assert!(matches!(
            realm.transfer_ownership(owner, heir),
            Err(Denial::InsufficientRank { .. })
        ));
    }

    #[test]
    fn disband_cascades() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let other_owner = UserId::new();
        let fid = realm.create_faction(owner, "Vale", now).unwrap();
        let other = realm.create_faction(other_owner, "Crag", now).unwrap();
        assert!(realm.declare(other_owner, fid, factions_types::RelationshipStatus::Enemy).is_ok());
        assert!(realm.claims.add(Claim::new(CellKey::new("overworld", 0, 0), fid, now)).is_ok());

        assert!(realm.disband(fid).is_ok());
        assert!(realm.faction(fid).is_none());
        assert!(realm.membership_of(owner).is_none());
        assert_eq!(realm.claims.paid_count(fid), 0);
        assert!(realm.faction(other).unwrap().relationship_record(fid).is_none());
        assert!(matches!(
            realm.disband(fid),
            Err(InvariantViolation::UnknownFaction(_))
        ));
    }

    #[test]
    fn record_seen_rejects_future() {
        let mut realm = realm();
        let now = Utc::now();
        let user = UserId::new();
        let future = now + chrono::TimeDelta::minutes(1);
        assert!(realm.record_seen(user, future, now).is_err());
        assert!(realm.record_seen(user, now, now).is_ok());
    }

    #[test]
    fn metadata_edits_need_leader() {
        let mut realm = realm();
        let now = Utc::now();
        let owner = UserId::new();
        let member = UserId::new();
        let fid = realm.create_faction(owner, "Vale", now).unwrap();
        assert!(realm.join_faction(member, fid, Rank::Member, now).is_ok());

        assert!(matches!(
            realm.set_motd(member, "hi"),
            Err(Denial::InsufficientRank { .. })
        ));
        assert!(realm.set_description(owner, "  river folk ").is_ok());
        assert!(realm.rename(owner, "Valehome").is_ok());
        let faction = realm.faction(fid).unwrap();
        assert_eq!(faction.description, "river folk");
        assert_eq!(faction.name, "Valehome");
        // Renaming to your own name (any case) is allowed.
        assert!(realm.rename(owner, "VALEHOME").is_ok());
    }
}
