//! Faction territory: paid claims and the buffer zones derived from them.
//!
//! A paid claim is an explicit, persisted ownership record for one cell.
//! A buffer is the synthetic one-cell ring around paid claims: it is never
//! stored, never granted, and is recomputed on demand from the paid set.
//!
//! # Modules
//!
//! - [`store`] -- [`ClaimStore`]: paid claims, per-faction index, buffer cache
//! - [`resolved`] -- [`ResolvedClaim`]: what a cell lookup returns
//! - [`error`] -- [`TerritoryError`]

pub mod error;
pub mod resolved;
pub mod store;

pub use error::TerritoryError;
pub use resolved::{BufferClaim, ResolvedClaim};
pub use store::ClaimStore;
