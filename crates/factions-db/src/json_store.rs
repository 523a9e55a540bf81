//! One pretty-printed JSON document per collection.
//!
//! Writes go to `<kind>.json.tmp` first and are renamed over
//! `<kind>.json`, so a crash mid-write never truncates the live file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use factions_types::EntityKind;

use crate::error::DbError;
use crate::store::Persistence;

/// File-backed store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DbError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "JSON store opened");
        Ok(Self { dir })
    }

    /// The data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the live file for `kind`.
    pub fn path_for(&self, kind: EntityKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.as_str()))
    }

    fn temp_path_for(&self, kind: EntityKind) -> PathBuf {
        self.dir.join(format!("{}.json.tmp", kind.as_str()))
    }
}

impl Persistence for JsonFileStore {
    fn load<T: DeserializeOwned>(&self, kind: EntityKind) -> Result<BTreeMap<String, T>, DbError> {
        let path = self.path_for(kind);
        if !path.exists() {
            debug!(%kind, "No stored collection, starting empty");
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let records: BTreeMap<String, T> = serde_json::from_str(&raw)?;
        debug!(%kind, count = records.len(), "Collection loaded");
        Ok(records)
    }

    fn save<T: Serialize>(
        &mut self,
        kind: EntityKind,
        records: &BTreeMap<String, T>,
    ) -> Result<(), DbError> {
        let json = serde_json::to_string_pretty(records)?;
        let temp = self.temp_path_for(kind);
        fs::write(&temp, json)?;
        fs::rename(&temp, self.path_for(kind))?;
        debug!(%kind, count = records.len(), "Collection saved");
        Ok(())
    }
}
