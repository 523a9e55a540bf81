//! Persistence collaborator for the factions realm.
//!
//! The realm treats storage as a synchronous, whole-collection key/value
//! service: it loads each [`EntityKind`] once at startup and replaces the
//! whole collection on every commit that dirtied it. Nothing here knows
//! about faction semantics; records arrive already keyed.
//!
//! ```text
//! Realm::commit
//!     |
//!     +-- dirty kinds --> Persistence::save(kind, collection)
//!                            |-- JsonFileStore  (<dir>/<kind>.json, temp + rename)
//!                            +-- MemoryStore    (serde_json::Value per kind)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`Persistence`] trait
//! - [`json_store`] -- [`JsonFileStore`], one JSON document per collection
//! - [`memory_store`] -- [`MemoryStore`], for tests and dry runs
//! - [`error`] -- Shared error types
//!
//! [`EntityKind`]: factions_types::EntityKind

pub mod error;
pub mod json_store;
pub mod memory_store;
pub mod store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use json_store::JsonFileStore;
pub use memory_store::MemoryStore;
pub use store::Persistence;
