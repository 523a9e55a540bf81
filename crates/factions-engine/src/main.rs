//! `factionsd`: the faction territory daemon.
//!
//! Wires the realm to its storage and its clock, then hands it to the
//! single writer task. The host integration (chat commands, block events)
//! talks to the writer through a [`RealmHandle`]; this binary only owns the
//! lifecycle.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `factions-config.yaml`
//! 3. Open the JSON store and load the realm
//! 4. Run the audit sweep against the host's levels and persist its
//!    corrections
//! 5. Spawn the writer task, which repeats the audit on schedule
//! 6. Drive ticks until ctrl-c
//! 7. Drain the writer and commit

mod error;
mod ticker;

use std::path::PathBuf;

use chrono::Utc;
use factions_core::{
    AnyLevel, FactionsConfig, KnownLevels, LevelRegistry, Realm, RealmWriter, TickScheduler,
};
use factions_db::JsonFileStore;
use factions_events::TracingObserver;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Environment variable naming the configuration file.
const CONFIG_PATH_ENV: &str = "FACTIONS_CONFIG";

/// Configuration file used when [`CONFIG_PATH_ENV`] is unset.
const DEFAULT_CONFIG_PATH: &str = "factions-config.yaml";

/// Environment variable listing the host's levels, comma separated.
const LEVELS_ENV: &str = "FACTIONS_LEVELS";

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("factionsd starting");

    let config = load_config()?;
    info!(
        data_dir = %config.storage.data_dir.display(),
        ticks_per_second = config.schedule.ticks_per_second,
        decay_enabled = config.decay.enabled,
        "Configuration loaded"
    );

    let mut store = JsonFileStore::open(&config.storage.data_dir)?;
    let scheduler = TickScheduler::new(&config)?;
    let mut realm = Realm::load(config, &store, Utc::now())?;
    realm.subscribe(Box::new(TracingObserver));

    let levels = host_levels();
    let report = realm.audit(levels.as_ref())?;
    let written = realm.commit(&mut store)?;
    info!(
        corrections = report.corrections(),
        rounds = report.rounds,
        collections_written = written.len(),
        "Startup audit complete"
    );

    let period = ticker::period(&scheduler);
    let (writer, handle) = RealmWriter::new(realm, store, scheduler, levels);
    let writer_task = tokio::spawn(writer.run());
    let ticker_task = tokio::spawn(ticker::drive(handle.clone(), period));
    info!(tick_ms = period.as_millis(), "Writer and tick driver running");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    ticker_task.abort();
    handle.shutdown()?;
    let (realm, _store) = writer_task.await.map_err(|e| EngineError::Task {
        message: format!("writer task failed: {e}"),
    })?;

    info!(
        factions = realm.faction_count(),
        claims = realm.claims().len(),
        "factionsd stopped"
    );
    Ok(())
}

/// Load configuration from `FACTIONS_CONFIG` or `factions-config.yaml`.
///
/// A missing file falls back to defaults; a malformed one is an error.
fn load_config() -> Result<FactionsConfig, EngineError> {
    let path = std::env::var(CONFIG_PATH_ENV)
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        Ok(FactionsConfig::from_file(&path)?)
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        let mut config = FactionsConfig::default();
        config.storage.apply_env_overrides();
        Ok(config)
    }
}

/// The host's levels from `FACTIONS_LEVELS`.
///
/// Unset or empty means every level is valid, so the audit never removes
/// claims or homes for their level.
fn host_levels() -> Box<dyn LevelRegistry> {
    let listed: Vec<String> = std::env::var(LEVELS_ENV)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .map(str::to_owned)
        .collect();
    if listed.is_empty() {
        info!("No level list configured, audit accepts every level");
        Box::new(AnyLevel)
    } else {
        info!(levels = ?listed, "Audit restricted to listed levels");
        Box::new(KnownLevels::new(listed))
    }
}
