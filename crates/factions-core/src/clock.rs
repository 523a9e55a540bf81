//! Tick scheduler: turns host ticks into decay, disband and audit triggers.
//!
//! The host world delivers ticks at a fixed rate. The scheduler converts the
//! configured real-time periods (hours for decay, minutes for the disband
//! sweep and the audit) into tick counts once, then counts ticks and reports
//! which passes are due.
//!
//! # Design Principles
//!
//! - All conversions use checked arithmetic (no silent overflow).
//! - A zero period is a configuration error, except the decay interval
//!   which is floored at one hour, and the audit interval where zero means
//!   no periodic audit.
//! - A pass's counter resets when it fires, so a slow pass never triggers
//!   a burst of catch-up runs.

use crate::config::{FactionsConfig, ScheduleConfig};

/// Errors that can occur during scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Invalid schedule configuration (e.g. zero ticks per second).
    #[error("invalid schedule configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Which passes fired on a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuePasses {
    /// The inactivity decay pass is due.
    pub decay: bool,
    /// The zero-power disband sweep is due.
    pub disband: bool,
    /// The referential audit is due.
    pub audit: bool,
}

impl DuePasses {
    /// Whether anything is due.
    pub const fn any(self) -> bool {
        self.decay || self.disband || self.audit
    }
}

/// Counts ticks and reports due passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickScheduler {
    /// Ticks processed since construction.
    tick: u64,
    /// Host ticks per second.
    ticks_per_second: u64,
    /// Ticks between decay passes, `None` when decay is disabled.
    decay_period: Option<u64>,
    /// Ticks between disband sweeps.
    disband_period: u64,
    /// Ticks between audits, `None` when the periodic audit is off.
    audit_period: Option<u64>,
    /// Ticks since the last decay pass.
    since_decay: u64,
    /// Ticks since the last disband sweep.
    since_disband: u64,
    /// Ticks since the last audit.
    since_audit: u64,
}

impl TickScheduler {
    /// Build a scheduler from the realm configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] for a zero tick rate or a zero
    /// disband period, and [`ClockError::TickOverflow`] if a period does not
    /// fit in `u64` ticks.
    pub fn new(config: &FactionsConfig) -> Result<Self, ClockError> {
        let decay_period = if config.decay.enabled {
            let seconds = config
                .decay
                .interval_seconds()
                .ok()
                .ok_or(ClockError::TickOverflow)?;
            Some(seconds_to_ticks(&config.schedule, seconds)?)
        } else {
            None
        };
        let audit_period = match config.schedule.audit_minutes {
            0 => None,
            minutes => Some(minutes_to_ticks(&config.schedule, minutes)?),
        };
        Self::from_parts(
            config.schedule.ticks_per_second,
            decay_period,
            minutes_to_ticks(&config.schedule, config.schedule.disband_check_minutes)?,
        )?
        .with_audit_period(audit_period)
    }

    /// Build a scheduler from explicit periods (in ticks).
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if any period or the tick rate
    /// is zero.
    pub fn from_parts(
        ticks_per_second: u64,
        decay_period: Option<u64>,
        disband_period: u64,
    ) -> Result<Self, ClockError> {
        if ticks_per_second == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "ticks_per_second must be at least 1".to_owned(),
            });
        }
        if disband_period == 0 || decay_period == Some(0) {
            return Err(ClockError::InvalidConfig {
                reason: "pass periods must be at least 1 tick".to_owned(),
            });
        }
        Ok(Self {
            tick: 0,
            ticks_per_second,
            decay_period,
            disband_period,
            audit_period: None,
            since_decay: 0,
            since_disband: 0,
            since_audit: 0,
        })
    }

    /// Set the ticks between audits. `None` turns the periodic audit off.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] for a zero period.
    pub fn with_audit_period(mut self, audit_period: Option<u64>) -> Result<Self, ClockError> {
        if audit_period == Some(0) {
            return Err(ClockError::InvalidConfig {
                reason: "pass periods must be at least 1 tick".to_owned(),
            });
        }
        self.audit_period = audit_period;
        self.since_audit = 0;
        Ok(self)
    }

    /// Ticks processed so far.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Ticks between decay passes, if decay is enabled.
    pub const fn decay_period(&self) -> Option<u64> {
        self.decay_period
    }

    /// Ticks between disband sweeps.
    pub const fn disband_period(&self) -> u64 {
        self.disband_period
    }

    /// Ticks between audits, if the periodic audit is on.
    pub const fn audit_period(&self) -> Option<u64> {
        self.audit_period
    }

    /// Real-time length of one tick in milliseconds (at least 1).
    pub const fn tick_interval_ms(&self) -> u64 {
        match 1000_u64.checked_div(self.ticks_per_second) {
            Some(0) | None => 1,
            Some(ms) => ms,
        }
    }

    /// Advance one tick and report which passes are due.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would wrap.
    pub fn on_tick(&mut self) -> Result<DuePasses, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        self.since_disband = self.since_disband.saturating_add(1);
        self.since_decay = self.since_decay.saturating_add(1);
        self.since_audit = self.since_audit.saturating_add(1);

        let mut due = DuePasses::default();
        if self.since_disband >= self.disband_period {
            self.since_disband = 0;
            due.disband = true;
        }
        if let Some(period) = self.decay_period
            && self.since_decay >= period
        {
            self.since_decay = 0;
            due.decay = true;
        }
        if let Some(period) = self.audit_period
            && self.since_audit >= period
        {
            self.since_audit = 0;
            due.audit = true;
        }
        Ok(due)
    }
}

fn seconds_to_ticks(schedule: &ScheduleConfig, seconds: u64) -> Result<u64, ClockError> {
    schedule
        .ticks_per_second
        .checked_mul(seconds)
        .ok_or(ClockError::TickOverflow)
}

fn minutes_to_ticks(schedule: &ScheduleConfig, minutes: u64) -> Result<u64, ClockError> {
    let seconds = minutes.checked_mul(60).ok_or(ClockError::TickOverflow)?;
    seconds_to_ticks(schedule, seconds)
}
