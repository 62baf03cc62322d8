//! Scheduler policies and the per-frame batch budget (§4.2).
//!
//! A [`Scheduler`] only has to guarantee that `schedule(frame)` eventually results in one call to
//! `frame.execute_batch()`; the frame's own `executing` flag is what keeps that to at-most-one
//! in flight, so a scheduler is free to treat `schedule` as fire-and-forget.

pub mod new_thread;
pub mod piggyback;
pub mod pool;
pub mod timer;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Error;
use crate::frame::Frame;

pub use new_thread::NewThreadScheduler;
pub use piggyback::PiggybackScheduler;
pub use pool::ThreadPoolScheduler;
pub use timer::TimerScheduler;

/// Decides when a frame's batch runs, and absorbs otherwise-uncaught handler/constructor errors.
pub trait Scheduler: Send + Sync {
    /// Arranges for `frame.execute_batch()` to run on some worker. Must be safe to call whether
    /// or not the frame is already queued — the frame's `executing` flag is the real dedup, a
    /// scheduler need not re-check.
    fn schedule(&self, frame: Arc<Frame>);

    /// The scheduler's top-level error handler (§4.2, §7). The default logs via `tracing`; a
    /// policy that wants different handling (metrics, a supervisor hook) overrides this.
    fn handler(&self, error: &Error) {
        tracing::error!(%error, "reactor error reached scheduler top-level handler");
    }
}

/// Per-frame, per-batch budget (§4.2). `on_batch_start` resets the counter; each dequeued event
/// calls `on_batch_event`; `can_consume` reports whether another may be dispatched this batch.
pub trait SchedulerState: Send {
    fn on_batch_start(&mut self);
    fn on_batch_event(&mut self);
    fn can_consume(&self) -> bool;
    fn on_batch_stop(&mut self);
}

/// Default budget: a fixed number of events per batch. This is the only fairness mechanism
/// across reactors sharing a pool (§4.2, §9).
pub struct BudgetSchedulerState {
    budget: u32,
    remaining: u32,
}

/// Default events-per-batch budget, matching the spec's suggested default.
pub const DEFAULT_BATCH_BUDGET: u32 = 50;

impl BudgetSchedulerState {
    pub fn new(budget: u32) -> Self {
        BudgetSchedulerState {
            budget,
            remaining: budget,
        }
    }
}

impl SchedulerState for BudgetSchedulerState {
    fn on_batch_start(&mut self) {
        self.remaining = self.budget;
    }

    fn on_batch_event(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    fn can_consume(&self) -> bool {
        self.remaining > 0
    }

    fn on_batch_stop(&mut self) {}
}

/// Where a `Proto` points a frame's schedule calls: a named lookup in the owning system's
/// [`Bundle`], or a scheduler handed over directly.
pub enum SchedulerSelection {
    Named(String),
    Direct(Arc<dyn Scheduler>),
}

impl Default for SchedulerSelection {
    fn default() -> Self {
        SchedulerSelection::Named("default".to_string())
    }
}

/// Named scheduler registry owned by a `ReactorSystem` (§6 "Scheduler registry").
pub struct Bundle {
    schedulers: RwLock<HashMap<String, Arc<dyn Scheduler>>>,
}

impl Bundle {
    /// Registers the built-ins named in §6: `default` (a CPU-sized thread pool), `new-thread`,
    /// and `piggyback` (falling back to `default` when called from inside a reactor).
    pub fn with_builtins() -> Self {
        let default: Arc<dyn Scheduler> = Arc::new(ThreadPoolScheduler::new(num_cpus::get().max(1)));
        let mut schedulers: HashMap<String, Arc<dyn Scheduler>> = HashMap::new();
        schedulers.insert("new-thread".to_string(), Arc::new(NewThreadScheduler::new()));
        schedulers.insert(
            "piggyback".to_string(),
            Arc::new(PiggybackScheduler::new(default.clone())),
        );
        schedulers.insert("default".to_string(), default);
        Bundle {
            schedulers: RwLock::new(schedulers),
        }
    }

    pub fn register(&self, name: impl Into<String>, scheduler: Arc<dyn Scheduler>) {
        self.schedulers.write().insert(name.into(), scheduler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Scheduler>> {
        self.schedulers.read().get(name).cloned()
    }
}
