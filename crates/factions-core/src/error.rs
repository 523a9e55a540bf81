//! Error types for realm operations.
//!
//! Two families, split by how callers treat them:
//!
//! - [`InvariantViolation`] -- the call was malformed (unknown record,
//!   negative drain, timestamp in the future). State is left untouched.
//! - [`Denial`] -- the call was well-formed but policy says no (low rank,
//!   claim conflict, not enough power). Frequent and expected; callers show
//!   it to the player.
//!
//! Dangling references (a claim whose faction is gone, a user pointing at a
//! disbanded faction) are neither: reads treat them as absent and the audit
//! sweep cleans them up.

use factions_power::PowerError;
use factions_territory::TerritoryError;
use factions_types::{CellKey, FactionId, Rank, UserId};

/// A rejected mutation that would break a realm invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// The faction does not exist.
    #[error("unknown faction {0}")]
    UnknownFaction(FactionId),

    /// The user does not exist.
    #[error("unknown user {0}")]
    UnknownUser(UserId),

    /// Power arithmetic or drain bookkeeping rejected the update.
    #[error(transparent)]
    Power(#[from] PowerError),
}

/// A policy refusal. Expected, frequent, and never a fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    /// The actor must belong to a faction for this.
    #[error("not in a faction")]
    NotInFaction,

    /// The actor already belongs to a faction.
    #[error("already in a faction")]
    AlreadyInFaction,

    /// The actor's rank is too low.
    #[error("requires rank {required} or higher")]
    InsufficientRank {
        /// Minimum rank for the action.
        required: Rank,
    },

    /// The target faction does not exist.
    #[error("faction {0} not found")]
    FactionNotFound(FactionId),

    /// The target user is not in the actor's faction.
    #[error("user {0} is not in your faction")]
    TargetNotInFaction(UserId),

    /// The action cannot target oneself.
    #[error("cannot target yourself")]
    CannotTargetSelf,

    /// The target's rank is at or above what the actor may act on.
    #[error("cannot act on a member of rank {rank}")]
    TargetOutranks {
        /// The protected target's rank.
        rank: Rank,
    },

    /// The rank cannot move further in that direction.
    #[error("rank {rank} cannot be changed further")]
    RankLimit {
        /// The rank at its limit.
        rank: Rank,
    },

    /// The owner must hand over ownership before leaving a populated faction.
    #[error("transfer ownership before leaving")]
    OwnerMustTransfer,

    /// The faction name is blank.
    #[error("faction name cannot be empty")]
    EmptyName,

    /// Another faction already uses this name.
    #[error("faction name {name:?} is taken")]
    NameTaken {
        /// The contested name.
        name: String,
    },

    /// The user holds no invite to a closed faction.
    #[error("not invited")]
    NotInvited,

    /// The user is already invited.
    #[error("already invited")]
    AlreadyInvited,

    /// The user is already a member.
    #[error("user {0} is already a member")]
    AlreadyMember(UserId),

    /// The cell is already a paid claim of the actor's faction.
    #[error("{0} is already yours")]
    AlreadyOwned(CellKey),

    /// The cell is a paid claim of another faction.
    #[error("{cell} is claimed by another faction")]
    AlreadyClaimed {
        /// The contested cell.
        cell: CellKey,
        /// Its owner.
        owner: FactionId,
    },

    /// The cell lies in another faction's buffer.
    #[error("{cell} is inside another faction's buffer")]
    InOtherBuffer {
        /// The buffer cell.
        cell: CellKey,
        /// The buffer's owner.
        owner: FactionId,
    },

    /// The cell touches another faction's buffer.
    #[error("{cell} borders another faction's buffer")]
    AdjacentToBuffer {
        /// The requested cell.
        cell: CellKey,
        /// The neighbouring buffer's owner.
        owner: FactionId,
    },

    /// Not enough potential power to hold the requested claims.
    #[error("not enough power: need {required}, have {available}")]
    InsufficientPower {
        /// Power the claims would require.
        required: i64,
        /// Power available to spend.
        available: i64,
    },

    /// Square size outside `1..=max`.
    #[error("claim size {size} outside 1..={max}")]
    SizeOutOfRange {
        /// Requested size.
        size: u32,
        /// Configured maximum.
        max: u32,
    },

    /// No paid claim or buffer at the cell.
    #[error("{0} is not claimed")]
    NotClaimed(CellKey),

    /// The cell is a buffer; buffers cannot be edited.
    #[error("{0} is a buffer")]
    IsBuffer(CellKey),

    /// The claim belongs to another faction.
    #[error("{0} belongs to another faction")]
    NotOwnClaim(CellKey),

    /// The player already holds a grant here.
    #[error("user {0} is already granted")]
    AlreadyGranted(UserId),

    /// Access level is already at its bound.
    #[error("access level is already {level}")]
    AccessLevelBound {
        /// The current, bounding level.
        level: Rank,
    },

    /// A faction cannot hold a relationship toward itself.
    #[error("cannot set a relationship with your own faction")]
    SelfRelationship,

    /// The request would change nothing.
    #[error("nothing to change")]
    NoChange,

    /// A malformed request slipped through the policy layer.
    #[error(transparent)]
    Invalid(#[from] InvariantViolation),
}

impl From<TerritoryError> for Denial {
    fn from(err: TerritoryError) -> Self {
        match err {
            TerritoryError::AlreadyClaimed { cell, owner } => Self::AlreadyClaimed { cell, owner },
            TerritoryError::IsBuffer { cell, .. } => Self::IsBuffer(cell),
            TerritoryError::NotFound(cell) => Self::NotClaimed(cell),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn territory_errors_map_to_denials() {
        let cell = CellKey::new("overworld", 1, 1);
        let owner = FactionId::new();
        assert_eq!(
            Denial::from(TerritoryError::IsBuffer {
                cell: cell.clone(),
                owner
            }),
            Denial::IsBuffer(cell.clone())
        );
        assert_eq!(
            Denial::from(TerritoryError::NotFound(cell.clone())),
            Denial::NotClaimed(cell)
        );
    }

    #[test]
    fn power_errors_wrap_as_invariant_violations() {
        let violation = InvariantViolation::from(PowerError::NegativeDrain { value: -3 });
        assert!(violation.to_string().contains("-3"));
    }
}
