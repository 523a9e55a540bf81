//! Configuration loading and typed config structures for the factions realm.
//!
//! The canonical configuration lives in `factions-config.yaml` at the project
//! root. Every section and field is optional; anything missing takes the
//! default listed on its `default_*` function.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use factions_power::{DecayConfig, PowerConfig};
use factions_types::Permission;

/// Environment variable that overrides `storage.data_dir`.
pub const DATA_DIR_ENV: &str = "FACTIONS_DATA_DIR";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level realm configuration.
///
/// Mirrors the structure of `factions-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FactionsConfig {
    /// Power economy constants.
    #[serde(default)]
    pub power: PowerConfig,

    /// Inactivity decay.
    #[serde(default)]
    pub decay: DecayConfig,

    /// Relationship and guest policy.
    #[serde(default)]
    pub relationships: RelationshipConfig,

    /// Claim protection switches.
    #[serde(default)]
    pub protection: ProtectionConfig,

    /// Tick rate and pass periods.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Where state is persisted.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl FactionsConfig {
    /// Load configuration from a YAML file.
    ///
    /// `FACTIONS_DATA_DIR` overrides `storage.data_dir` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.storage.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.storage.apply_env_overrides();
        Ok(config)
    }
}

/// Relationship and guest policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationshipConfig {
    /// Mutual allies may act on each other's member-level claims without an
    /// explicit relationship permission.
    #[serde(default = "default_ally_overrides_permissions")]
    pub ally_overrides_permissions: bool,

    /// Guest permissions a new faction starts with.
    #[serde(default = "default_guest_permissions")]
    pub default_guest_permissions: BTreeSet<Permission>,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            ally_overrides_permissions: default_ally_overrides_permissions(),
            default_guest_permissions: default_guest_permissions(),
        }
    }
}

/// Claim protection switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProtectionConfig {
    /// Master switch. When off, no claim is protected.
    #[serde(default = "default_claim_protection")]
    pub claim_protection: bool,

    /// When off, members of one faction (and mutual allies) cannot hurt
    /// each other.
    #[serde(default)]
    pub friendly_fire: bool,

    /// Largest square edge accepted by `claim_square`, in "size" units where
    /// size `n` covers `(2n - 1)^2` cells.
    #[serde(default = "default_max_claim_square")]
    pub max_claim_square: u32,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            claim_protection: default_claim_protection(),
            friendly_fire: false,
            max_claim_square: default_max_claim_square(),
        }
    }
}

/// Tick rate and pass periods.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduleConfig {
    /// Host ticks per real second.
    #[serde(default = "default_ticks_per_second")]
    pub ticks_per_second: u64,

    /// Minutes between zero-power disband sweeps.
    #[serde(default = "default_disband_check_minutes")]
    pub disband_check_minutes: u64,

    /// Minutes between referential audits. Zero turns the periodic audit
    /// off; the startup audit still runs.
    #[serde(default = "default_audit_minutes")]
    pub audit_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: default_ticks_per_second(),
            disband_check_minutes: default_disband_check_minutes(),
            audit_minutes: default_audit_minutes(),
        }
    }
}

/// Persistence location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `factions.json`, `claims.json`, `users.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    /// Override the data directory with `FACTIONS_DATA_DIR` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(val);
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

const fn default_ally_overrides_permissions() -> bool {
    true
}

fn default_guest_permissions() -> BTreeSet<Permission> {
    BTreeSet::from([Permission::UseBlocks, Permission::UseEntities])
}

const fn default_claim_protection() -> bool {
    true
}

const fn default_max_claim_square() -> u32 {
    7
}

const fn default_ticks_per_second() -> u64 {
    20
}

const fn default_disband_check_minutes() -> u64 {
    5
}

const fn default_audit_minutes() -> u64 {
    30
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
