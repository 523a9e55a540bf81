//! Persisted record types: factions, users, claims, relationships.
//!
//! These are plain data. Invariants that span records (power clamping,
//! membership consistency, claim uniqueness) are enforced by the services
//! that own the collections, not here.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{Permission, Rank, RelationshipStatus};
use crate::ids::{FactionId, UserId};

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// Separator used in the storage form of a [`CellKey`].
const KEY_SEPARATOR: char = '|';

/// Address of one chunk cell: a level (dimension) plus grid coordinates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    /// Level / dimension identifier, e.g. `minecraft:overworld`.
    pub level: String,
    /// Cell X coordinate.
    pub x: i32,
    /// Cell Z coordinate.
    pub z: i32,
}

impl CellKey {
    /// Build a key from its parts.
    pub fn new(level: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            level: level.into(),
            x,
            z,
        }
    }

    /// The cell `(dx, dz)` away in the same level, or `None` on overflow.
    pub fn offset(&self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self {
            level: self.level.clone(),
            x: self.x.checked_add(dx)?,
            z: self.z.checked_add(dz)?,
        })
    }

    /// The eight Chebyshev neighbours in fixed scan order: `dx` from -1 to 1
    /// outer, `dz` from -1 to 1 inner, skipping the centre. Buffer ownership
    /// tie-breaks depend on this order.
    pub fn neighbors(&self) -> impl Iterator<Item = Self> + '_ {
        (-1..=1_i32).flat_map(move |dx| {
            (-1..=1_i32).filter_map(move |dz| {
                if dx == 0 && dz == 0 {
                    None
                } else {
                    self.offset(dx, dz)
                }
            })
        })
    }

    /// Chebyshev distance to `other`, or `None` across levels.
    pub fn chebyshev(&self, other: &Self) -> Option<u32> {
        if self.level != other.level {
            return None;
        }
        Some(self.x.abs_diff(other.x).max(self.z.abs_diff(other.z)))
    }

    /// Stable string key used by persistence: `level|x|z`.
    pub fn storage_key(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}", self.level, self.x, self.z)
    }

    /// Parse the output of [`CellKey::storage_key`].
    ///
    /// The level may itself contain the separator; coordinates are taken
    /// from the right.
    pub fn parse_storage_key(key: &str) -> Option<Self> {
        let mut parts = key.rsplitn(3, KEY_SEPARATOR);
        let z = parts.next()?.parse().ok()?;
        let x = parts.next()?.parse().ok()?;
        let level = parts.next()?;
        if level.is_empty() {
            return None;
        }
        Some(Self::new(level, x, z))
    }
}

impl core::fmt::Display for CellKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({}, {})", self.level, self.x, self.z)
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// A paid (explicitly claimed, persisted) cell.
///
/// Buffers are never represented with this type; see the territory crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// The claimed cell.
    pub cell: CellKey,
    /// Owning faction.
    pub faction_id: FactionId,
    /// When the claim was made.
    pub created_at: DateTime<Utc>,
    /// Minimum rank allowed to act here absent a grant.
    pub access_level: Rank,
    /// Players explicitly allowed to build here regardless of rank.
    #[serde(default)]
    pub granted: BTreeSet<UserId>,
}

impl Claim {
    /// A fresh claim with access level [`Rank::Member`] and no grants.
    pub const fn new(cell: CellKey, faction_id: FactionId, created_at: DateTime<Utc>) -> Self {
        Self {
            cell,
            faction_id,
            created_at,
            access_level: Rank::Member,
            granted: BTreeSet::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// Directed relationship record held by the source faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// The faction this stance is directed at.
    pub target: FactionId,
    /// Declared stance.
    pub status: RelationshipStatus,
    /// Actions the source faction lets the target's members perform on
    /// its claims.
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
}

impl Relationship {
    /// The implicit record for a pair with nothing stored.
    pub const fn neutral(target: FactionId) -> Self {
        Self {
            target,
            status: RelationshipStatus::Neutral,
            permissions: BTreeSet::new(),
        }
    }

    /// Whether this record is equivalent to having no record at all.
    pub fn is_default(&self) -> bool {
        self.status == RelationshipStatus::Neutral && self.permissions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Factions
// ---------------------------------------------------------------------------

/// Faction home teleport target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Home {
    /// Level the home is in.
    pub level: String,
    /// Block-space X.
    pub x: f64,
    /// Block-space Y.
    pub y: f64,
    /// Block-space Z.
    pub z: f64,
    /// Facing yaw in degrees.
    pub yaw: f32,
    /// Facing pitch in degrees.
    pub pitch: f32,
}

/// A faction record.
///
/// `base_power` is kept inside `[0, max_power]` by the power service;
/// `admin_power` is an unclamped operator adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    /// Unique identifier.
    pub id: FactionId,
    /// Display name, unique case-insensitively.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Message of the day shown to members.
    #[serde(default)]
    pub motd: String,
    /// Display colour name.
    #[serde(default)]
    pub color: String,
    /// Whether anyone may join without an invite.
    #[serde(default)]
    pub open: bool,
    /// Base power, clamped to `[0, max_power]`.
    pub base_power: i64,
    /// Operator-granted power, not clamped.
    #[serde(default)]
    pub admin_power: i64,
    /// Users holding a pending invite.
    #[serde(default)]
    pub invites: BTreeSet<UserId>,
    /// Outgoing relationship records, one per target at most.
    #[serde(default)]
    pub relationships: BTreeMap<FactionId, Relationship>,
    /// Actions factionless actors (and guests) may perform on its claims.
    #[serde(default)]
    pub guest_permissions: BTreeSet<Permission>,
    /// Optional home location.
    #[serde(default)]
    pub home: Option<Home>,
    /// When the faction was founded.
    pub created_at: DateTime<Utc>,
}

impl Faction {
    /// Derived power: `max(0, base + admin)`.
    pub const fn power(&self) -> i64 {
        let total = self.base_power.saturating_add(self.admin_power);
        if total < 0 { 0 } else { total }
    }

    /// The stored record toward `target`, if any.
    pub fn relationship_record(&self, target: FactionId) -> Option<&Relationship> {
        self.relationships.get(&target)
    }

    /// The stance toward `target`. Never absent: missing records read as
    /// neutral with no permissions.
    pub fn relationship(&self, target: FactionId) -> Relationship {
        self.relationship_record(target)
            .cloned()
            .unwrap_or_else(|| Relationship::neutral(target))
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A user's place in a faction. Rank exists exactly when membership does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// The faction joined.
    pub faction_id: FactionId,
    /// Rank inside it.
    pub rank: Rank,
}

/// A user record. Created lazily on first reference, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Host player id.
    pub id: UserId,
    /// Current membership, if any.
    #[serde(default)]
    pub membership: Option<Membership>,
    /// Ignore every claim protection.
    #[serde(default)]
    pub bypass: bool,
    /// Last time the user was seen online.
    pub last_online: DateTime<Utc>,
    /// Power drained from the current faction on this user's account.
    #[serde(default)]
    pub power_drained: i64,
}

impl User {
    /// A factionless user last seen at `now`.
    pub const fn new(id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            membership: None,
            bypass: false,
            last_online: now,
            power_drained: 0,
        }
    }

    /// Faction the user belongs to.
    pub fn faction_id(&self) -> Option<FactionId> {
        self.membership.map(|m| m.faction_id)
    }

    /// Rank inside the current faction.
    pub fn rank(&self) -> Option<Rank> {
        self.membership.map(|m| m.rank)
    }

    /// Whether the user belongs to `faction_id`.
    pub fn is_member_of(&self, faction_id: FactionId) -> bool {
        self.faction_id() == Some(faction_id)
    }
}
