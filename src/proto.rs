//! `Proto<T>`: the reactor template handed to `ReactorSystem::spawn` (§6).
//!
//! `Proto` is the crate's only configuration surface (see `SPEC_FULL.md`'s ambient-stack note):
//! there is no file- or env-based config layer underneath it, and its fields stay plain Rust
//! rather than `serde`-derived, since a queue factory and a scheduler selection are closures and
//! trait objects that cannot be deserialised.

use crate::connector::QueueFactory;
use crate::context::SystemEvent;
use crate::scheduler::{SchedulerSelection, DEFAULT_BATCH_BUDGET};

/// A handler pre-wired onto a spawned frame's `system` connector, so a caller can observe
/// lifecycle events without needing access to the reactor's own constructor.
pub(crate) type SystemSubscriber = Box<dyn FnMut(&SystemEvent) + Send>;

/// Describes how a reactor should be constructed and scheduled, without constructing it. `T` is
/// the event type of the reactor's `main` connector.
pub struct Proto<T> {
    pub(crate) name: Option<String>,
    pub(crate) scheduler: SchedulerSelection,
    pub(crate) main_queue_factory: Option<QueueFactory<T>>,
    pub(crate) batch_budget: u32,
    pub(crate) system_subscriber: Option<SystemSubscriber>,
}

impl<T> Default for Proto<T> {
    fn default() -> Self {
        Proto {
            name: None,
            scheduler: SchedulerSelection::default(),
            main_queue_factory: None,
            batch_budget: DEFAULT_BATCH_BUDGET,
            system_subscriber: None,
        }
    }
}

impl<T> Proto<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a name. The system always honours a request — a collision is disambiguated, not
    /// rejected (see `unique_store::UniqueStore::resolve_name`) — so the name actually assigned
    /// may differ from this one; look it up later with `ReactorSystem::find` if you need it.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn scheduled_on(mut self, name: impl Into<String>) -> Self {
        self.scheduler = SchedulerSelection::Named(name.into());
        self
    }

    pub fn scheduled_with(mut self, scheduler: std::sync::Arc<dyn crate::scheduler::Scheduler>) -> Self {
        self.scheduler = SchedulerSelection::Direct(scheduler);
        self
    }

    /// Overrides the `main` connector's queue backend (default: unbounded).
    pub fn with_main_queue_factory(mut self, factory: QueueFactory<T>) -> Self {
        self.main_queue_factory = Some(factory);
        self
    }

    /// Overrides the per-batch event budget (default: [`DEFAULT_BATCH_BUDGET`]).
    pub fn with_batch_budget(mut self, budget: u32) -> Self {
        self.batch_budget = budget;
        self
    }

    /// Wires a handler onto the spawned frame's `system` connector before its first batch runs,
    /// so a caller outside the reactor can observe its lifecycle events directly.
    pub fn with_system_subscriber<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&SystemEvent) + Send + 'static,
    {
        self.system_subscriber = Some(Box::new(handler));
        self
    }
}
