//! Paid-claim storage with lazily derived, cached buffers.
//!
//! The [`ClaimStore`] owns every paid claim, keyed by cell, plus a
//! per-faction index. Buffer lookups scan the eight neighbours of an unpaid
//! cell and cache the owner when one is found. Wilderness lookups are never
//! cached, so the cache holds at most the buffer ring. Any change to the paid set clears the whole cache; grants and access levels do not touch it
//! because they never affect buffer ownership.
//!
//! The cache sits in a [`RefCell`] so lookups can fill it through `&self`.
//! That makes the store `Send` but not `Sync`: it must live on a single
//! writer, which is exactly how the realm owns it.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use factions_types::{CellKey, Claim, FactionId, UserId};

use crate::error::TerritoryError;
use crate::resolved::{BufferClaim, ResolvedClaim};

/// All paid claims in the world.
#[derive(Debug, Default)]
pub struct ClaimStore {
    /// Paid claims indexed by cell.
    claims: BTreeMap<CellKey, Claim>,
    /// Cells owned per faction.
    by_faction: BTreeMap<FactionId, BTreeSet<CellKey>>,
    /// Buffer owner per buffer cell looked up since the last paid-set change.
    buffer_cache: RefCell<BTreeMap<CellKey, FactionId>>,
}

impl ClaimStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            claims: BTreeMap::new(),
            by_faction: BTreeMap::new(),
            buffer_cache: RefCell::new(BTreeMap::new()),
        }
    }

    /// Build a store from persisted claims. Later duplicates of a cell
    /// replace earlier ones.
    pub fn from_claims(claims: impl IntoIterator<Item = Claim>) -> Self {
        let mut store = Self::new();
        for claim in claims {
            store.insert_unchecked(claim);
        }
        store
    }

    /// Number of paid claims.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether there are no paid claims.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Every paid claim, ordered by cell.
    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    // -------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------

    /// What occupies `cell`: its paid claim, else a buffer owned by the
    /// first paid neighbour in [`CellKey::neighbors`] order, else nothing.
    pub fn get(&self, cell: &CellKey) -> Option<ResolvedClaim<'_>> {
        if let Some(claim) = self.claims.get(cell) {
            return Some(ResolvedClaim::Paid(claim));
        }
        self.buffer_owner(cell).map(|faction_id| {
            ResolvedClaim::Buffer(BufferClaim {
                cell: cell.clone(),
                faction_id,
            })
        })
    }

    /// The paid claim at `cell`, ignoring buffers.
    pub fn paid(&self, cell: &CellKey) -> Option<&Claim> {
        self.claims.get(cell)
    }

    /// Mutable access to a paid claim for access-level and grant edits.
    pub fn paid_mut(&mut self, cell: &CellKey) -> Option<&mut Claim> {
        self.claims.get_mut(cell)
    }

    /// Owner of the buffer at `cell`, or `None` if the cell is paid or has no
    /// paid neighbour.
    pub fn buffer_owner(&self, cell: &CellKey) -> Option<FactionId> {
        if self.claims.contains_key(cell) {
            return None;
        }
        if let Ok(cache) = self.buffer_cache.try_borrow()
            && let Some(cached) = cache.get(cell)
        {
            return Some(*cached);
        }
        let owner = cell
            .neighbors()
            .find_map(|neighbor| self.claims.get(&neighbor).map(|c| c.faction_id))?;
        if let Ok(mut cache) = self.buffer_cache.try_borrow_mut() {
            cache.insert(cell.clone(), owner);
        }
        Some(owner)
    }

    /// Number of cached buffer cells.
    pub fn cached_lookups(&self) -> usize {
        self.buffer_cache.try_borrow().map_or(0, |cache| cache.len())
    }

    // -------------------------------------------------------------------
    // Per-faction listings
    // -------------------------------------------------------------------

    /// Paid claims of `faction_id`, ordered by cell.
    pub fn paid_by_faction(&self, faction_id: FactionId) -> Vec<&Claim> {
        self.by_faction
            .get(&faction_id)
            .map(|cells| cells.iter().filter_map(|c| self.claims.get(c)).collect())
            .unwrap_or_default()
    }

    /// Number of paid claims held by `faction_id`.
    pub fn paid_count(&self, faction_id: FactionId) -> usize {
        self.by_faction.get(&faction_id).map_or(0, BTreeSet::len)
    }

    /// Every unpaid cell adjacent to a paid claim of `faction_id`,
    /// deduplicated and ordered.
    ///
    /// This is the neighbour ring of the faction's land. Where two
    /// factions' rings overlap the cell appears in both listings, while
    /// [`ClaimStore::get`] attributes it to a single owner by scan order.
    pub fn buffer_by_faction(&self, faction_id: FactionId) -> Vec<CellKey> {
        let Some(cells) = self.by_faction.get(&faction_id) else {
            return Vec::new();
        };
        let ring: BTreeSet<CellKey> = cells
            .iter()
            .flat_map(CellKey::neighbors)
            .filter(|n| !self.claims.contains_key(n))
            .collect();
        ring.into_iter().collect()
    }

    // -------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------

    /// Add a paid claim.
    ///
    /// Returns `Ok(true)` if inserted, `Ok(false)` if the same faction
    /// already holds the cell (nothing changes).
    ///
    /// # Errors
    ///
    /// Returns [`TerritoryError::AlreadyClaimed`] if another faction holds it.
    pub fn add(&mut self, claim: Claim) -> Result<bool, TerritoryError> {
        if let Some(existing) = self.claims.get(&claim.cell) {
            if existing.faction_id == claim.faction_id {
                return Ok(false);
            }
            return Err(TerritoryError::AlreadyClaimed {
                cell: claim.cell,
                owner: existing.faction_id,
            });
        }
        self.insert_unchecked(claim);
        self.invalidate_buffers();
        Ok(true)
    }

    /// Remove the paid claim at `cell`.
    ///
    /// # Errors
    ///
    /// Returns [`TerritoryError::IsBuffer`] for a buffer cell and
    /// [`TerritoryError::NotFound`] for an empty one.
    pub fn remove(&mut self, cell: &CellKey) -> Result<Claim, TerritoryError> {
        let Some(claim) = self.claims.remove(cell) else {
            return Err(self.missing_claim_error(cell));
        };
        self.unindex(&claim);
        self.invalidate_buffers();
        Ok(claim)
    }

    /// Remove every paid claim of `faction_id`.
    pub fn remove_all(&mut self, faction_id: FactionId) -> Vec<Claim> {
        let cells = self.by_faction.remove(&faction_id).unwrap_or_default();
        let removed: Vec<Claim> = cells
            .iter()
            .filter_map(|cell| self.claims.remove(cell))
            .collect();
        if !removed.is_empty() {
            self.invalidate_buffers();
        }
        removed
    }

    // -------------------------------------------------------------------
    // Grants
    // -------------------------------------------------------------------

    /// Add `user` to the grant set at `cell`. Returns `false` if already
    /// granted.
    ///
    /// # Errors
    ///
    /// Returns [`TerritoryError::IsBuffer`] or [`TerritoryError::NotFound`].
    pub fn grant(&mut self, cell: &CellKey, user: UserId) -> Result<bool, TerritoryError> {
        if let Some(claim) = self.claims.get_mut(cell) {
            return Ok(claim.granted.insert(user));
        }
        Err(self.missing_claim_error(cell))
    }

    /// Remove `user` from the grant set at `cell`. Returns whether anything
    /// was removed.
    pub fn revoke(&mut self, cell: &CellKey, user: UserId) -> bool {
        self.claims
            .get_mut(cell)
            .is_some_and(|claim| claim.granted.remove(&user))
    }

    /// Revoke `user` on every claim of `faction_id`. Returns the cells that
    /// changed.
    pub fn revoke_everywhere(&mut self, faction_id: FactionId, user: UserId) -> Vec<CellKey> {
        let Some(cells) = self.by_faction.get(&faction_id) else {
            return Vec::new();
        };
        let mut changed = Vec::new();
        for cell in cells {
            if let Some(claim) = self.claims.get_mut(cell)
                && claim.granted.remove(&user)
            {
                changed.push(cell.clone());
            }
        }
        changed
    }

    // -------------------------------------------------------------------
    // Audit
    // -------------------------------------------------------------------

    /// Remove claims whose faction no longer exists or whose level is no
    /// longer valid. Returns the removed claims.
    pub fn audit(
        &mut self,
        faction_exists: impl Fn(FactionId) -> bool,
        level_valid: impl Fn(&str) -> bool,
    ) -> Vec<Claim> {
        let stale: Vec<CellKey> = self
            .claims
            .values()
            .filter(|c| !faction_exists(c.faction_id) || !level_valid(&c.cell.level))
            .map(|c| c.cell.clone())
            .collect();
        let mut removed = Vec::with_capacity(stale.len());
        for cell in stale {
            if let Some(claim) = self.claims.remove(&cell) {
                warn!(
                    cell = %claim.cell,
                    faction_id = %claim.faction_id,
                    "Audit removed stale claim"
                );
                self.unindex(&claim);
                removed.push(claim);
            }
        }
        if !removed.is_empty() {
            self.invalidate_buffers();
        }
        removed
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    fn insert_unchecked(&mut self, claim: Claim) {
        if let Some(previous) = self.claims.get(&claim.cell).map(|c| c.faction_id) {
            if let Some(cells) = self.by_faction.get_mut(&previous) {
                cells.remove(&claim.cell);
            }
        }
        self.by_faction
            .entry(claim.faction_id)
            .or_default()
            .insert(claim.cell.clone());
        self.claims.insert(claim.cell.clone(), claim);
    }

    fn unindex(&mut self, claim: &Claim) {
        if let Some(cells) = self.by_faction.get_mut(&claim.faction_id) {
            cells.remove(&claim.cell);
            if cells.is_empty() {
                self.by_faction.remove(&claim.faction_id);
            }
        }
    }

    fn missing_claim_error(&self, cell: &CellKey) -> TerritoryError {
        self.buffer_owner(cell).map_or_else(
            || TerritoryError::NotFound(cell.clone()),
            |owner| TerritoryError::IsBuffer {
                cell: cell.clone(),
                owner,
            },
        )
    }

    fn invalidate_buffers(&self) {
        if let Ok(mut cache) = self.buffer_cache.try_borrow_mut() {
            if !cache.is_empty() {
                debug!(entries = cache.len(), "Buffer cache invalidated");
            }
            cache.clear();
        }
    }
}
