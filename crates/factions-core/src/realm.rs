//! The realm: the single owned repository of factions, users, and claims.
//!
//! [`Realm`] replaces process-wide maps with one explicit owner constructed
//! at startup. Every mutation goes through a `&mut Realm` method, emits its
//! [`FactionEvent`]s, and marks the collections it touched as dirty;
//! [`Realm::commit`] then saves exactly those collections.
//!
//! Operations are split across sibling modules by concern:
//!
//! - [`crate::membership`] -- founding, joining, leaving, ranks, disband
//! - [`crate::power`] -- power adjustment, decay, zero-power sweep
//! - [`crate::relations`] -- relationships, guest policy, friendly fire
//! - [`crate::claims`] -- claiming, unclaiming, grants, access levels
//! - [`crate::permission`] -- the permission resolver
//! - [`crate::audit`] -- referential clean-up
//!
//! The claim store's buffer cache is a `RefCell`, so `Realm` is `Send` but
//! not `Sync`. It lives on the writer task in [`crate::dispatch`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use factions_db::{DbError, Persistence};
use factions_events::{EventBus, EventObserver, FactionEvent};
use factions_territory::ClaimStore;
use factions_types::{Claim, EntityKind, Faction, FactionId, Membership, Rank, User, UserId};

use crate::config::FactionsConfig;
use crate::error::{Denial, InvariantViolation};

/// Authoritative faction, user, and claim state.
#[derive(Debug)]
pub struct Realm {
    /// Loaded configuration.
    pub(crate) config: FactionsConfig,
    /// Factions by id.
    pub(crate) factions: BTreeMap<FactionId, Faction>,
    /// Users by id. Never shrinks.
    pub(crate) users: BTreeMap<UserId, User>,
    /// Paid claims and buffer derivation.
    pub(crate) claims: ClaimStore,
    /// Notification sink.
    bus: EventBus,
    /// Collections changed since the last commit.
    dirty: BTreeSet<EntityKind>,
}

impl Realm {
    /// An empty realm.
    pub const fn new(config: FactionsConfig) -> Self {
        Self {
            config,
            factions: BTreeMap::new(),
            users: BTreeMap::new(),
            claims: ClaimStore::new(),
            bus: EventBus::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Rebuild a realm from persisted records.
    ///
    /// Users whose `last_online` predates the epoch (records written before
    /// activity tracking existed) are treated as seen at `now`.
    pub fn from_collections(
        config: FactionsConfig,
        factions: impl IntoIterator<Item = Faction>,
        claims: impl IntoIterator<Item = Claim>,
        users: impl IntoIterator<Item = User>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut realm = Self::new(config);
        realm.factions = factions.into_iter().map(|f| (f.id, f)).collect();
        realm.claims = ClaimStore::from_claims(claims);

        let mut migrated: usize = 0;
        for mut user in users {
            if user.last_online <= DateTime::<Utc>::UNIX_EPOCH {
                user.last_online = now;
                migrated = migrated.saturating_add(1);
            }
            realm.users.insert(user.id, user);
        }
        if migrated > 0 {
            info!(migrated, "Migrated users without activity timestamps");
            realm.dirty.insert(EntityKind::Users);
        }

        info!(
            factions = realm.factions.len(),
            claims = realm.claims.len(),
            users = realm.users.len(),
            "Realm loaded"
        );
        realm
    }

    /// Load every collection from `store` and rebuild the realm.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any collection fails to load.
    pub fn load<P: Persistence>(
        config: FactionsConfig,
        store: &P,
        now: DateTime<Utc>,
    ) -> Result<Self, DbError> {
        let factions: BTreeMap<String, Faction> = store.load(EntityKind::Factions)?;
        let claims: BTreeMap<String, Claim> = store.load(EntityKind::Claims)?;
        let users: BTreeMap<String, User> = store.load(EntityKind::Users)?;
        Ok(Self::from_collections(
            config,
            factions.into_values(),
            claims.into_values(),
            users.into_values(),
            now,
        ))
    }

    // -------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------

    /// Save every dirty collection. Returns the kinds written.
    ///
    /// A kind whose save fails stays dirty and is retried on the next
    /// commit.
    ///
    /// # Errors
    ///
    /// Returns the first [`DbError`]; kinds after it are not attempted.
    pub fn commit<P: Persistence>(&mut self, store: &mut P) -> Result<Vec<EntityKind>, DbError> {
        let mut written = Vec::new();
        while let Some(kind) = self.dirty.first().copied() {
            match kind {
                EntityKind::Factions => store.save(kind, &self.keyed_factions())?,
                EntityKind::Claims => store.save(kind, &self.keyed_claims())?,
                EntityKind::Users => store.save(kind, &self.keyed_users())?,
            }
            self.dirty.remove(&kind);
            written.push(kind);
        }
        if !written.is_empty() {
            debug!(?written, "Realm committed");
        }
        Ok(written)
    }

    /// Mark every collection dirty, forcing a full save on the next commit.
    pub fn mark_all_dirty(&mut self) {
        self.dirty.extend(EntityKind::ALL);
    }

    /// Whether `kind` has unsaved changes.
    pub fn is_dirty(&self, kind: EntityKind) -> bool {
        self.dirty.contains(&kind)
    }

    fn keyed_factions(&self) -> BTreeMap<String, &Faction> {
        self.factions
            .values()
            .map(|f| (f.id.to_string(), f))
            .collect()
    }

    fn keyed_claims(&self) -> BTreeMap<String, &Claim> {
        self.claims
            .iter()
            .map(|c| (c.cell.storage_key(), c))
            .collect()
    }

    fn keyed_users(&self) -> BTreeMap<String, &User> {
        self.users.values().map(|u| (u.id.to_string(), u)).collect()
    }

    // -------------------------------------------------------------------
    // Observers
    // -------------------------------------------------------------------

    /// Register an observer. Delivery order is registration order.
    pub fn subscribe(&mut self, observer: Box<dyn EventObserver>) {
        self.bus.subscribe(observer);
    }

    /// Mark the event's collections dirty and deliver it.
    pub(crate) fn emit(&mut self, event: &FactionEvent) {
        self.dirty.extend(event.dirties().iter().copied());
        self.bus.publish(event);
    }

    /// Mark a collection dirty without an event (activity, bypass, drain).
    pub(crate) fn mark_dirty(&mut self, kind: EntityKind) {
        self.dirty.insert(kind);
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// Active configuration.
    pub const fn config(&self) -> &FactionsConfig {
        &self.config
    }

    /// A faction by id.
    pub fn faction(&self, id: FactionId) -> Option<&Faction> {
        self.factions.get(&id)
    }

    /// Every faction, ordered by id.
    pub fn factions(&self) -> impl Iterator<Item = &Faction> {
        self.factions.values()
    }

    /// Number of factions.
    pub fn faction_count(&self) -> usize {
        self.factions.len()
    }

    /// A faction by name, case-insensitively.
    pub fn faction_by_name(&self, name: &str) -> Option<&Faction> {
        let wanted = name.trim().to_lowercase();
        self.factions
            .values()
            .find(|f| f.name.to_lowercase() == wanted)
    }

    /// A user by id.
    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// Every known user, ordered by id.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// The claim store.
    pub const fn claims(&self) -> &ClaimStore {
        &self.claims
    }

    /// Members of `faction_id`, ordered by id.
    pub fn members(&self, faction_id: FactionId) -> Vec<UserId> {
        self.users
            .values()
            .filter(|u| u.is_member_of(faction_id))
            .map(|u| u.id)
            .collect()
    }

    /// Number of members of `faction_id`.
    pub fn member_count(&self, faction_id: FactionId) -> usize {
        self.users
            .values()
            .filter(|u| u.is_member_of(faction_id))
            .count()
    }

    /// The user's membership, treating a dangling faction reference as no
    /// membership.
    pub fn membership_of(&self, user: UserId) -> Option<Membership> {
        self.users
            .get(&user)
            .and_then(|u| u.membership)
            .filter(|m| self.factions.contains_key(&m.faction_id))
    }

    /// Upper bound on the faction's base power.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::UnknownFaction`] or a wrapped
    /// [`factions_power::PowerError`] on overflow.
    pub fn max_power(&self, faction_id: FactionId) -> Result<i64, InvariantViolation> {
        if !self.factions.contains_key(&faction_id) {
            return Err(InvariantViolation::UnknownFaction(faction_id));
        }
        Ok(self.config.power.max_power(
            self.member_count(faction_id),
            self.mutual_ally_count(faction_id),
        )?)
    }

    // -------------------------------------------------------------------
    // Internal helpers shared by the operation modules
    // -------------------------------------------------------------------

    /// The user record, created factionless (last seen `now`) if missing.
    pub(crate) fn user_entry(&mut self, id: UserId, now: DateTime<Utc>) -> &mut User {
        if !self.users.contains_key(&id) {
            self.dirty.insert(EntityKind::Users);
        }
        self.users.entry(id).or_insert_with(|| User::new(id, now))
    }

    /// The actor's live membership, or [`Denial::NotInFaction`].
    pub(crate) fn require_membership(&self, actor: UserId) -> Result<Membership, Denial> {
        self.membership_of(actor).ok_or(Denial::NotInFaction)
    }

    /// The actor's membership if their rank is at least `min`.
    pub(crate) fn require_rank(&self, actor: UserId, min: Rank) -> Result<Membership, Denial> {
        let membership = self.require_membership(actor)?;
        if membership.rank.outranks_or_equals(min) {
            Ok(membership)
        } else {
            debug!(%actor, rank = %membership.rank, required = %min, "Rank too low");
            Err(Denial::InsufficientRank { required: min })
        }
    }

    /// Mutable faction or [`InvariantViolation::UnknownFaction`].
    pub(crate) fn faction_mut(
        &mut self,
        faction_id: FactionId,
    ) -> Result<&mut Faction, InvariantViolation> {
        self.factions
            .get_mut(&faction_id)
            .ok_or(InvariantViolation::UnknownFaction(faction_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::TimeDelta;
    use factions_db::MemoryStore;

    use super::*;

    #[test]
    fn legacy_activity_timestamps_are_migrated() {
        let now = Utc::now();
        let legacy = User::new(UserId::new(), DateTime::<Utc>::UNIX_EPOCH);
        let recent = User::new(UserId::new(), now - TimeDelta::hours(1));
        let realm = Realm::from_collections(
            FactionsConfig::default(),
            [],
            [],
            [legacy.clone(), recent.clone()],
            now,
        );
        assert_eq!(realm.user(legacy.id).unwrap().last_online, now);
        assert_eq!(realm.user(recent.id).unwrap().last_online, recent.last_online);
        assert!(realm.is_dirty(EntityKind::Users));
    }

    #[test]
    fn commit_saves_only_dirty_kinds_and_reloads() {
        let now = Utc::now();
        let mut realm = Realm::new(FactionsConfig::default());
        let founder = UserId::new();
        let fid = realm.create_faction(founder, "Stonehold", now).unwrap();

        let mut store = MemoryStore::new();
        let written = realm.commit(&mut store).unwrap();
        assert!(written.contains(&EntityKind::Factions));
        assert!(written.contains(&EntityKind::Users));
        assert!(!realm.is_dirty(EntityKind::Factions));

        // Nothing changed: nothing written.
        assert!(realm.commit(&mut store).unwrap().is_empty());

        let reloaded = Realm::load(FactionsConfig::default(), &store, now).unwrap();
        assert_eq!(reloaded.faction(fid).map(|f| f.name.as_str()), Some("Stonehold"));
        assert_eq!(
            reloaded.membership_of(founder).map(|m| m.rank),
            Some(Rank::Owner)
        );
    }

    #[test]
    fn dangling_membership_reads_as_factionless() {
        let now = Utc::now();
        let mut user = User::new(UserId::new(), now);
        user.membership = Some(Membership {
            faction_id: FactionId::new(),
            rank: Rank::Member,
        });
        let realm =
            Realm::from_collections(FactionsConfig::default(), [], [], [user.clone()], now);
        assert!(realm.membership_of(user.id).is_none());
    }

    #[test]
    fn max_power_counts_members() {
        let now = Utc::now();
        let mut realm = Realm::new(FactionsConfig::default());
        let fid = realm.create_faction(UserId::new(), "Ashfall", now).unwrap();
        assert_eq!(realm.max_power(fid), Ok(40));
        assert!(matches!(
            realm.max_power(FactionId::new()),
            Err(InvariantViolation::UnknownFaction(_))
        ));
    }
}
