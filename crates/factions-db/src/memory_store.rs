//! In-memory store that still round-trips through JSON values, so tests
//! exercise the same serde paths as the file store.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use factions_types::EntityKind;

use crate::error::DbError;
use crate::store::Persistence;

/// Collections held as [`serde_json::Value`]s.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: BTreeMap<EntityKind, serde_json::Value>,
    saves: BTreeMap<EntityKind, u64>,
}

impl MemoryStore {
    /// An empty store.
    pub const fn new() -> Self {
        Self {
            collections: BTreeMap::new(),
            saves: BTreeMap::new(),
        }
    }

    /// How many times `kind` has been saved.
    pub fn save_count(&self, kind: EntityKind) -> u64 {
        self.saves.get(&kind).copied().unwrap_or(0)
    }

    /// Raw stored value for `kind`.
    pub fn raw(&self, kind: EntityKind) -> Option<&serde_json::Value> {
        self.collections.get(&kind)
    }
}

impl Persistence for MemoryStore {
    fn load<T: DeserializeOwned>(&self, kind: EntityKind) -> Result<BTreeMap<String, T>, DbError> {
        match self.collections.get(&kind) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(BTreeMap::new()),
        }
    }

    fn save<T: Serialize>(
        &mut self,
        kind: EntityKind,
        records: &BTreeMap<String, T>,
    ) -> Result<(), DbError> {
        let value = serde_json::to_value(records)?;
        self.collections.insert(kind, value);
        let count = self.saves.entry(kind).or_insert(0);
        *count = count.saturating_add(1);
        Ok(())
    }
}
