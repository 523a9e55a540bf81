//! Single-writer dispatch.
//!
//! One tokio task, the [`RealmWriter`], owns the [`Realm`] and the store.
//! Everything else holds a cloneable [`RealmHandle`] and sends it closures
//! over an unbounded channel. Commands run strictly in arrival order, and
//! after each one the writer commits whatever it dirtied.
//!
//! # Architecture
//!
//! - Producers never lock. [`RealmHandle::submit`] enqueues and returns;
//!   [`RealmHandle::call`] also awaits a oneshot reply.
//! - The writer runs inside a task-local scope. A `call` issued from that
//!   scope would wait on itself forever, so it fails fast with
//!   [`DispatchError::Reentrant`] instead.
//! - Ticks arrive as [`WriterCommand::Tick`] and drive the
//!   [`TickScheduler`]; due passes run on the writer like any other command.
//!   The audit checks claims and homes against the host's [`LevelRegistry`].

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use factions_db::Persistence;

use crate::clock::TickScheduler;
use crate::realm::Realm;
use crate::world::LevelRegistry;

tokio::task_local! {
    static ON_WRITER: ();
}

/// A unit of work for the writer.
pub type Job = Box<dyn FnOnce(&mut Realm) + Send>;

/// Messages accepted by the writer task.
pub enum WriterCommand {
    /// Run a closure against the realm.
    Run(Job),
    /// Advance the scheduler by one tick.
    Tick,
    /// Commit and stop.
    Shutdown,
}

impl core::fmt::Debug for WriterCommand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Run(_) => f.write_str("Run(..)"),
            Self::Tick => f.write_str("Tick"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Errors from talking to the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// A blocking call was made from the writer task itself.
    #[error("realm call issued from the writer task")]
    Reentrant,

    /// The writer has stopped.
    #[error("realm writer is not running")]
    WriterGone,
}

/// Cloneable producer side of the writer channel.
#[derive(Debug, Clone)]
pub struct RealmHandle {
    tx: mpsc::UnboundedSender<WriterCommand>,
}

impl RealmHandle {
    /// Whether the current task is the writer.
    pub fn on_writer() -> bool {
        ON_WRITER.try_with(|()| ()).is_ok()
    }

    /// Run `f` on the writer and wait for its result.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Reentrant`] when called from the writer task, and
    /// [`DispatchError::WriterGone`] if the writer stopped before replying.
    pub async fn call<T, F>(&self, f: F) -> Result<T, DispatchError>
    where
        F: FnOnce(&mut Realm) -> T + Send + 'static,
        T: Send + 'static,
    {
        if Self::on_writer() {
            return Err(DispatchError::Reentrant);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(move |realm| {
            if reply_tx.send(f(realm)).is_err() {
                debug!("Realm call abandoned by caller");
            }
        })?;
        reply_rx.await.ok().ok_or(DispatchError::WriterGone)
    }

    /// Queue `f` without waiting. Safe from any task, including the writer.
    ///
    /// # Errors
    ///
    /// [`DispatchError::WriterGone`] if the writer has stopped.
    pub fn submit<F>(&self, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce(&mut Realm) + Send + 'static,
    {
        self.send(WriterCommand::Run(Box::new(f)))
    }

    /// Deliver one host tick.
    ///
    /// # Errors
    ///
    /// [`DispatchError::WriterGone`] if the writer has stopped.
    pub fn tick(&self) -> Result<(), DispatchError> {
        self.send(WriterCommand::Tick)
    }

    /// Ask the writer to commit and stop after the commands already queued.
    ///
    /// # Errors
    ///
    /// [`DispatchError::WriterGone`] if the writer has already stopped.
    pub fn shutdown(&self) -> Result<(), DispatchError> {
        self.send(WriterCommand::Shutdown)
    }

    fn send(&self, command: WriterCommand) -> Result<(), DispatchError> {
        self.tx.send(command).ok().ok_or(DispatchError::WriterGone)
    }
}

/// The task that owns the realm.
#[derive(Debug)]
pub struct RealmWriter<P> {
    realm: Realm,
    store: P,
    scheduler: TickScheduler,
    levels: Box<dyn LevelRegistry>,
    rx: mpsc::UnboundedReceiver<WriterCommand>,
}

impl<P: Persistence + Send> RealmWriter<P> {
    /// Create the writer and its first handle. `levels` is the host's view
    /// of which levels exist, consulted by every periodic audit.
    pub fn new(
        realm: Realm,
        store: P,
        scheduler: TickScheduler,
        levels: Box<dyn LevelRegistry>,
    ) -> (Self, RealmHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = Self {
            realm,
            store,
            scheduler,
            levels,
            rx,
        };
        (writer, RealmHandle { tx })
    }

    /// Process commands until shutdown or until every handle is dropped.
    /// Returns the realm and store after a final commit.
    pub async fn run(self) -> (Realm, P) {
        ON_WRITER.scope((), self.process()).await
    }

    async fn process(mut self) -> (Realm, P) {
        info!("Realm writer started");
        let mut processed: u64 = 0;
        while let Some(command) = self.rx.recv().await {
            match command {
                WriterCommand::Run(job) => job(&mut self.realm),
                WriterCommand::Tick => self.on_tick(),
                WriterCommand::Shutdown => break,
            }
            processed = processed.saturating_add(1);
            self.commit();
        }
        self.commit();
        info!(processed, "Realm writer stopped");
        (self.realm, self.store)
    }

    fn on_tick(&mut self) {
        let due = match self.scheduler.on_tick() {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Scheduler failed");
                return;
            }
        };
        if due.decay
            && let Err(e) = self.realm.decay_pass(Utc::now())
        {
            warn!(error = %e, "Decay pass stopped early");
        }
        if due.disband
            && let Err(e) = self.realm.disband_pass()
        {
            warn!(error = %e, "Disband pass stopped early");
        }
        if due.audit {
            match self.realm.audit(self.levels.as_ref()) {
                Ok(report) if report.corrections() > 0 => {
                    info!(corrections = report.corrections(), "Periodic audit corrected state");
                }
                Ok(_) => debug!("Periodic audit found nothing"),
                Err(e) => warn!(error = %e, "Audit stopped early"),
            }
        }
    }

    fn commit(&mut self) {
        if let Err(e) = self.realm.commit(&mut self.store) {
            error!(error = %e, "Failed to persist realm; will retry after next command");
        }
    }
}
