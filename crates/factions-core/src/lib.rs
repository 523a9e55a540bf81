//! Realm service for faction territory: ownership, power, and permissions.
//!
//! The [`Realm`] owns every faction, user, and paid claim. Operations are
//! `&mut Realm` methods spread across the modules below; each one validates,
//! mutates, emits events, and marks the collections it touched for the next
//! commit. In a running process the realm lives on a single writer task
//! behind a [`RealmHandle`].
//!
//! # Modules
//!
//! - [`realm`] -- The [`Realm`] repository, loading and committing.
//! - [`membership`] -- Founding, joining, leaving, ranks, metadata, disband.
//! - [`relations`] -- Relationships, guest policy, friendly-fire shielding.
//! - [`power`] -- Power adjustment, inactivity decay, zero-power sweep.
//! - [`claims`] -- Claiming, unclaiming, grants, access levels.
//! - [`permission`] -- The permission resolver.
//! - [`audit`] -- Referential clean-up at load time.
//! - [`clock`] -- [`TickScheduler`]: host ticks to pass triggers.
//! - [`dispatch`] -- [`RealmWriter`] and [`RealmHandle`].
//! - [`config`] -- Loading `factions-config.yaml`.
//! - [`world`] -- Block positions and the host level registry.
//! - [`error`] -- [`Denial`] and [`InvariantViolation`].

pub mod audit;
pub mod claims;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod membership;
pub mod permission;
pub mod power;
pub mod realm;
pub mod relations;
pub mod world;

pub use audit::AuditReport;
pub use clock::{ClockError, DuePasses, TickScheduler};
pub use config::{ConfigError, FactionsConfig};
pub use dispatch::{DispatchError, RealmHandle, RealmWriter};
pub use error::{Denial, InvariantViolation};
pub use permission::{ClaimFacts, Standing, decide};
pub use power::{DecayReport, PowerOutcome};
pub use realm::Realm;
pub use world::{AnyLevel, BlockPos, KnownLevels, LevelRegistry};
