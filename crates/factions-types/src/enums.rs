//! Enumeration types for faction territory and permissions.
//!
//! [`Rank`] carries an explicit authority order rather than relying on
//! declaration order; every rank comparison in the workspace goes through
//! [`Rank::authority`].

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rank
// ---------------------------------------------------------------------------

/// A member's rank inside a faction.
///
/// Ordering is by authority: `Owner > Leader > Commander > Member > Guest`.
/// The `Ord` impl is derived from [`Rank::authority`], so reordering the
/// variants below never changes comparison results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    /// Founder or current owner. Exactly one per healthy faction.
    Owner,
    /// Trusted officer: may grant, kick, unclaim, edit relationships.
    Leader,
    /// May claim land and invite players.
    Commander,
    /// Regular member.
    Member,
    /// Lowest rank; builds only where guest permissions allow.
    Guest,
}

impl Rank {
    /// Every rank, highest authority first.
    pub const ALL: [Self; 5] = [
        Self::Owner,
        Self::Leader,
        Self::Commander,
        Self::Member,
        Self::Guest,
    ];

    /// Numeric authority of this rank. Higher means more authority.
    pub const fn authority(self) -> u8 {
        match self {
            Self::Owner => 4,
            Self::Leader => 3,
            Self::Commander => 2,
            Self::Member => 1,
            Self::Guest => 0,
        }
    }

    /// Whether this rank has at least the authority of `other`.
    pub const fn outranks_or_equals(self, other: Self) -> bool {
        self.authority() >= other.authority()
    }

    /// Whether this rank has strictly more authority than `other`.
    pub const fn outranks(self, other: Self) -> bool {
        self.authority() > other.authority()
    }

    /// The next rank up, or `None` for [`Rank::Owner`].
    pub const fn above(self) -> Option<Self> {
        match self {
            Self::Owner => None,
            Self::Leader => Some(Self::Owner),
            Self::Commander => Some(Self::Leader),
            Self::Member => Some(Self::Commander),
            Self::Guest => Some(Self::Member),
        }
    }

    /// The next rank down, or `None` for [`Rank::Guest`].
    pub const fn below(self) -> Option<Self> {
        match self {
            Self::Owner => Some(Self::Leader),
            Self::Leader => Some(Self::Commander),
            Self::Commander => Some(Self::Member),
            Self::Member => Some(Self::Guest),
            Self::Guest => None,
        }
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.authority().cmp(&other.authority())
    }
}

impl core::fmt::Display for Rank {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Owner => "owner",
            Self::Leader => "leader",
            Self::Commander => "commander",
            Self::Member => "member",
            Self::Guest => "guest",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Relationships and permissions
// ---------------------------------------------------------------------------

/// Directed diplomatic stance of one faction toward another.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RelationshipStatus {
    /// No stance. The implicit default for any pair without a record.
    #[default]
    Neutral,
    /// Declared ally. Mutual only when both sides declare it.
    Ally,
    /// Declared enemy.
    Enemy,
}

/// An action an actor can attempt inside a claimed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Break blocks.
    BreakBlocks,
    /// Place blocks (including liquids).
    PlaceBlocks,
    /// Interact with blocks (doors, buttons, levers).
    UseBlocks,
    /// Interact with entities (villagers, mounts).
    UseEntities,
    /// Damage entities.
    AttackEntities,
    /// Open containers.
    UseInventories,
}

impl Permission {
    /// Whether this is a build-class action. Per-claim grants apply only to
    /// these.
    pub const fn is_build(self) -> bool {
        matches!(self, Self::BreakBlocks | Self::PlaceBlocks)
    }
}

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

/// Three-valued outcome of permission resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// The action is permitted by an explicit rule.
    Allow,
    /// The action is forbidden.
    Deny,
    /// No protection is in effect at the cell.
    Inapplicable,
}

impl Verdict {
    /// Fold into the two-valued decision handed to action-gating callers.
    /// [`Verdict::Inapplicable`] means "no protection", so it allows.
    pub const fn decision(self) -> Decision {
        match self {
            Self::Allow | Self::Inapplicable => Decision::Allow,
            Self::Deny => Decision::Deny,
        }
    }
}

/// Final allow/deny answer returned to the host world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// Let the action proceed.
    Allow,
    /// Cancel the action.
    Deny,
}

impl Decision {
    /// Whether the action may proceed.
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// The three persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Faction records keyed by faction id.
    Factions,
    /// Paid claims keyed by cell storage key.
    Claims,
    /// User records keyed by user id.
    Users,
}

impl EntityKind {
    /// Every kind, in save order.
    pub const ALL: [Self; 3] = [Self::Factions, Self::Claims, Self::Users];

    /// Collection name used by storage backends.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Factions => "factions",
            Self::Claims => "claims",
            Self::Users => "users",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
