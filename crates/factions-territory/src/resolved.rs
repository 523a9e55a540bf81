//! The result of looking up a cell.

use factions_types::{CellKey, Claim, FactionId, Rank, UserId};

/// A synthetic claim on an unpaid cell next to a paid one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferClaim {
    /// The buffer cell.
    pub cell: CellKey,
    /// Owner inherited from the first paid neighbour in scan order.
    pub faction_id: FactionId,
}

/// What occupies a cell: a paid claim or a derived buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedClaim<'a> {
    /// An explicit, persisted claim.
    Paid(&'a Claim),
    /// A derived buffer.
    Buffer(BufferClaim),
}

impl ResolvedClaim<'_> {
    /// The owning faction.
    pub const fn faction_id(&self) -> FactionId {
        match self {
            Self::Paid(claim) => claim.faction_id,
            Self::Buffer(buffer) => buffer.faction_id,
        }
    }

    /// The cell looked up.
    pub const fn cell(&self) -> &CellKey {
        match self {
            Self::Paid(claim) => &claim.cell,
            Self::Buffer(buffer) => &buffer.cell,
        }
    }

    /// Whether this is a derived buffer.
    pub const fn is_buffer(&self) -> bool {
        matches!(self, Self::Buffer(_))
    }

    /// Minimum rank required absent a grant. Buffers are always
    /// [`Rank::Member`].
    pub const fn access_level(&self) -> Rank {
        match self {
            Self::Paid(claim) => claim.access_level,
            Self::Buffer(_) => Rank::Member,
        }
    }

    /// Whether `user` holds an explicit grant here. Always false on buffers.
    pub fn is_granted(&self, user: UserId) -> bool {
        match self {
            Self::Paid(claim) => claim.granted.contains(&user),
            Self::Buffer(_) => false,
        }
    }

    /// The paid claim, if this is one.
    pub const fn as_paid(&self) -> Option<&Claim> {
        match self {
            Self::Paid(claim) => Some(*claim),
            Self::Buffer(_) => None,
        }
    }
}
