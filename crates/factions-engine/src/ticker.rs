//! Host tick driver.
//!
//! Stands in for the game server's tick loop: sends one
//! [`RealmHandle::tick`] per scheduler period until the writer goes away.

use std::time::Duration;

use factions_core::{RealmHandle, TickScheduler};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Real-time length of one tick.
pub fn period(scheduler: &TickScheduler) -> Duration {
    Duration::from_millis(scheduler.tick_interval_ms())
}

/// Deliver ticks every `period` until the writer stops.
///
/// Missed ticks are delayed rather than burst, so a stalled writer never
/// receives a backlog of catch-up ticks.
pub async fn drive(handle: RealmHandle, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent: u64 = 0;
    loop {
        interval.tick().await;
        if handle.tick().is_err() {
            info!(sent, "Writer gone, tick driver stopping");
            return;
        }
        sent = sent.saturating_add(1);
        if sent.is_multiple_of(1_000) {
            debug!(sent, "Ticks delivered");
        }
    }
}
