//! The persistence contract.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use factions_types::EntityKind;

use crate::error::DbError;

/// Whole-collection storage keyed by stable strings.
///
/// `save` replaces the entire collection; there are no partial writes.
/// `load` of a collection that was never saved returns an empty map.
pub trait Persistence {
    /// Load every record of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend cannot be read or a record does
    /// not deserialize as `T`.
    fn load<T: DeserializeOwned>(&self, kind: EntityKind) -> Result<BTreeMap<String, T>, DbError>;

    /// Replace the stored collection of `kind` with `records`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or the write fails. A failed
    /// save leaves the previous collection in place.
    fn save<T: Serialize>(
        &mut self,
        kind: EntityKind,
        records: &BTreeMap<String, T>,
    ) -> Result<(), DbError>;
}
