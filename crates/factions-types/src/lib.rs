//! Shared type definitions for the factions workspace.
//!
//! This crate is the single source of truth for identifiers, enums and
//! persisted records used by every other crate. It carries no behaviour
//! beyond small derived accessors.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for factions and users
//! - [`enums`] -- Ranks, stances, permissions, verdicts, persisted kinds
//! - [`structs`] -- Faction, user, claim and relationship records

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Decision, EntityKind, Permission, Rank, RelationshipStatus, Verdict};
pub use ids::{FactionId, UserId};
pub use structs::{CellKey, Claim, Faction, Home, Membership, Relationship, User};
