//! Observer registration and ordered delivery.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::event::FactionEvent;

/// Receives every event published on the bus it is registered with.
///
/// Implementations must not assume they can change the outcome: by the time
/// `on_event` runs the mutation has already been applied.
pub trait EventObserver: Send {
    /// Called once per published event, in publication order.
    fn on_event(&mut self, event: &FactionEvent);
}

/// Ordered, synchronous observer list.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<Box<dyn EventObserver>>,
    published: u64,
}

impl EventBus {
    /// An empty bus.
    pub const fn new() -> Self {
        Self {
            observers: Vec::new(),
            published: 0,
        }
    }

    /// Register an observer. Delivery order is registration order.
    pub fn subscribe(&mut self, observer: Box<dyn EventObserver>) {
        self.observers.push(observer);
    }

    /// Number of registered observers.
    pub const fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Total events published since construction.
    pub const fn published(&self) -> u64 {
        self.published
    }

    /// Deliver `event` to every observer before returning.
    pub fn publish(&mut self, event: &FactionEvent) {
        self.published = self.published.saturating_add(1);
        for observer in &mut self.observers {
            observer.on_event(event);
        }
    }
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .field("published", &self.published)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Stock observers
// ---------------------------------------------------------------------------

/// Logs every event at `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl EventObserver for TracingObserver {
    fn on_event(&mut self, event: &FactionEvent) {
        debug!(
            event = event.name(),
            faction_id = %event.faction_id(),
            "Faction event"
        );
    }
}

/// Collects events into a shared buffer.
///
/// Clone the recorder before subscribing it; the clone kept outside the bus
/// reads what the subscribed one recorded.
#[derive(Debug, Default, Clone)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<FactionEvent>>>,
}

impl EventRecorder {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    pub fn events(&self) -> Vec<FactionEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.events.lock() {
            guard.clear();
        }
    }
}

impl EventObserver for EventRecorder {
    fn on_event(&mut self, event: &FactionEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event.clone());
        }
    }
}
