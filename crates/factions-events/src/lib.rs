//! Notification sink for faction state changes.
//!
//! Every durable mutation in the realm emits exactly one [`FactionEvent`]
//! per logical change. Events are delivered synchronously, in registration
//! order, to every [`EventObserver`] on the [`EventBus`]. Observers react;
//! they cannot veto or cancel an event.
//!
//! # Modules
//!
//! - [`event`] -- The [`FactionEvent`] enum and the collections each event dirties
//! - [`bus`] -- [`EventBus`], [`EventObserver`], and the stock observers

pub mod bus;
pub mod event;

pub use bus::{EventBus, EventObserver, EventRecorder, TracingObserver};
pub use event::FactionEvent;
