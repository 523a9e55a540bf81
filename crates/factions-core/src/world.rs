//! Host-world seam: block positions and level validity.
//!
//! The realm never sees raw world state. The host reports positions as
//! [`BlockPos`] and answers "does this level still exist" through a
//! [`LevelRegistry`].

use std::collections::BTreeSet;

use factions_types::CellKey;

/// Blocks per cell edge is `1 << CELL_SHIFT`.
const CELL_SHIFT: u32 = 4;

/// A block position in a level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockPos {
    /// Level identifier.
    pub level: String,
    /// Block X.
    pub x: i32,
    /// Block Y. Cells are columns, so Y never affects the cell.
    pub y: i32,
    /// Block Z.
    pub z: i32,
}

impl BlockPos {
    /// Build a position.
    pub fn new(level: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            level: level.into(),
            x,
            y,
            z,
        }
    }

    /// The cell containing this block. Arithmetic shift floors, so block
    /// -1 lands in cell -1.
    pub fn cell(&self) -> CellKey {
        CellKey::new(
            self.level.clone(),
            self.x.wrapping_shr(CELL_SHIFT),
            self.z.wrapping_shr(CELL_SHIFT),
        )
    }
}

/// Answers whether a level identifier is still valid.
///
/// The writer task owns one for the periodic audit, hence `Send`.
pub trait LevelRegistry: core::fmt::Debug + Send {
    /// Whether `level` exists in the host world.
    fn is_valid_level(&self, level: &str) -> bool;
}

/// A fixed set of known levels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownLevels {
    levels: BTreeSet<String>,
}

impl KnownLevels {
    /// Build from level identifiers.
    pub fn new<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            levels: levels.into_iter().map(Into::into).collect(),
        }
    }
}

impl LevelRegistry for KnownLevels {
    fn is_valid_level(&self, level: &str) -> bool {
        self.levels.contains(level)
    }
}

/// Accepts every level. For hosts that never remove levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnyLevel;

impl LevelRegistry for AnyLevel {
    fn is_valid_level(&self, _level: &str) -> bool {
        true
    }
}
