//! Error types for the `factions-territory` crate.

use factions_types::{CellKey, FactionId};

/// Errors raised by claim-store mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TerritoryError {
    /// The cell is already a paid claim of another faction.
    #[error("cell {cell} is already claimed by faction {owner}")]
    AlreadyClaimed {
        /// The contested cell.
        cell: CellKey,
        /// Its current owner.
        owner: FactionId,
    },

    /// The cell is a buffer, which cannot be removed or granted on.
    #[error("cell {cell} is a buffer of faction {owner}")]
    IsBuffer {
        /// The buffer cell.
        cell: CellKey,
        /// The faction whose claim generates it.
        owner: FactionId,
    },

    /// No paid claim exists at the cell.
    #[error("no claim at {0}")]
    NotFound(CellKey),
}
