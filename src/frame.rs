//! The frame: per-reactor bookkeeping (§3 "Frame", §4.1).
//!
//! A frame owns a reactor's connectors, its pending-queue set, its lifecycle state, and the
//! `executing` scheduling flag. Everything touched cross-thread lives behind `monitor`, the
//! mutual-exclusion primitive the spec calls out by name; event dispatch itself — the body of a
//! batch — runs without holding it.

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::connector::{Connector, ConnectorInner, ConnectorOps, QueueFactory};
use crate::context::{self, SystemEvent};
use crate::error::{Error, PanicPayload};
use crate::scheduler::{BudgetSchedulerState, Scheduler, SchedulerState};
use crate::system::SystemInner;

/// A frame is always handled through a reference-counted handle; there is exactly one owner (the
/// `ReactorSystem`'s frame store) and everything else — connectors, channels, the thread-local
/// context — holds a non-owning `Weak<Frame>` (§9 "Cycles").
pub type FrameHandle = Arc<Frame>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Fresh,
    Running,
    Terminated,
}

/// Connectors with a non-empty queue, each appearing at most once (§3 invariant 2).
#[derive(Default)]
struct PendingQueues {
    order: VecDeque<Arc<dyn ConnectorOps>>,
    members: HashSet<u64>,
}

impl PendingQueues {
    fn push(&mut self, connector: Arc<dyn ConnectorOps>) {
        if self.members.insert(connector.uid()) {
            self.order.push_back(connector);
        }
    }

    fn pop_front(&mut self) -> Option<Arc<dyn ConnectorOps>> {
        let connector = self.order.pop_front()?;
        self.members.remove(&connector.uid());
        Some(connector)
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

struct MonitorState {
    lifecycle: Lifecycle,
    pending: PendingQueues,
}

type Ctor = Box<dyn FnOnce() -> Result<Box<dyn Any + Send>, PanicPayload> + Send>;

pub struct Frame {
    uid: u64,
    name: String,
    system: Weak<SystemInner>,
    scheduler: Arc<dyn Scheduler>,
    monitor: Mutex<MonitorState>,
    connectors: Mutex<crate::unique_store::UniqueStore<Arc<dyn ConnectorOps>>>,
    non_daemon_count: AtomicUsize,
    executing: AtomicBool,
    forced: AtomicBool,
    /// The constructed reactor object, created lazily on the first batch. Kept alive for the
    /// frame's lifetime purely by being stored here; nothing calls back into it directly — all
    /// dispatch happens through the connectors' own event streams.
    iso: Mutex<Option<Box<dyn Any + Send>>>,
    system_connector: Mutex<Option<Arc<ConnectorInner<SystemEvent>>>>,
    ctor: Mutex<Option<Ctor>>,
    scheduler_state: Mutex<Box<dyn SchedulerState>>,
}

impl Frame {
    pub(crate) fn new(
        uid: u64,
        name: String,
        scheduler: Arc<dyn Scheduler>,
        system: Weak<SystemInner>,
        batch_budget: u32,
    ) -> FrameHandle {
        Arc::new(Frame {
            uid,
            name,
            system,
            scheduler,
            monitor: Mutex::new(MonitorState {
                lifecycle: Lifecycle::Fresh,
                pending: PendingQueues::default(),
            }),
            connectors: Mutex::new(crate::unique_store::UniqueStore::new()),
            non_daemon_count: AtomicUsize::new(0),
            executing: AtomicBool::new(false),
            forced: AtomicBool::new(false),
            iso: Mutex::new(None),
            system_connector: Mutex::new(None),
            ctor: Mutex::new(None),
            scheduler_state: Mutex::new(Box::new(BudgetSchedulerState::new(batch_budget))),
        })
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn install_ctor(&self, ctor: Ctor) {
        *self.ctor.lock() = Some(ctor);
    }

    pub(crate) fn install_system_connector(&self, connector: Arc<ConnectorInner<SystemEvent>>) {
        *self.system_connector.lock() = Some(connector);
    }

    // ---- queries (§4.1 "Queries") ----

    pub fn has_terminated(&self) -> bool {
        self.monitor.lock().lifecycle == Lifecycle::Terminated
    }

    pub fn has_pending_events(&self) -> bool {
        !self.monitor.lock().pending.is_empty()
    }

    /// Sum of sizes across pending connectors. Advisory only: the connectors are not locked
    /// atomically with each other while this walks them, so it may over- or under-count by a
    /// handful of events against a system under heavy concurrent load.
    pub fn estimate_total_pending_events(&self) -> usize {
        self.monitor
            .lock()
            .pending
            .order
            .iter()
            .map(|connector| connector.queue_len())
            .sum()
    }

    // ---- connector lifecycle (§4.1) ----

    /// Opens a new connector. Fails only if this frame has already terminated (§4.1).
    pub fn open_connector<T: Send + 'static>(
        self: &Arc<Self>,
        name: impl Into<String>,
        is_daemon: bool,
        queue_factory: Option<QueueFactory<T>>,
    ) -> Result<(Connector<T>, crate::connector::Channel<T>), Error> {
        if self.has_terminated() {
            return Err(Error::FrameTerminated {
                frame_uid: self.uid,
                frame_name: self.name.clone(),
            });
        }

        let requested = name.into();
        let mut store = self.connectors.lock();
        let uid = store.reserve_id();
        let resolved_name = store.resolve_name(&requested, uid);

        let inner = Arc::new(ConnectorInner::new(
            uid,
            resolved_name.clone(),
            is_daemon,
            Arc::downgrade(self),
            queue_factory.as_ref(),
        ));
        store.insert(uid, resolved_name, inner.clone() as Arc<dyn ConnectorOps>);
        drop(store);

        if !is_daemon {
            self.non_daemon_count.fetch_add(1, Ordering::AcqRel);
        }

        let connector = Connector::new(inner.clone());
        let channel = crate::connector::Channel { connector: inner };
        Ok((connector, channel))
    }

    /// Closes a connector and releases its uid (§4.1). Idempotent: returns `false` if the
    /// connector was already sealed or does not exist.
    pub fn seal_connector(self: &Arc<Self>, uid: u64) -> bool {
        let maybe = { self.connectors.lock().for_id(uid).cloned() };
        let connector = match maybe {
            Some(c) => c,
            None => return false,
        };

        let was_open = connector.close();
        if was_open {
            self.connectors.lock().try_release_by_id(uid);
            if !connector.is_daemon() {
                let previous = self.non_daemon_count.fetch_sub(1, Ordering::AcqRel);
                if previous == 1 {
                    // Last non-daemon connector just sealed: force one more batch so the
                    // termination check runs even with no new events arriving (§4.1,
                    // "schedule_for_execution... used when a connector is sealed").
                    self.schedule_for_execution();
                }
            }
            tracing::debug!(frame = self.uid, connector = uid, "connector sealed");
        }
        was_open
    }

    /// Requests termination: seals every connector and forces the next termination check to
    /// succeed even if events are still pending (§5 "shutdown() forces termination").
    pub(crate) fn shutdown(self: &Arc<Self>) {
        self.forced.store(true, Ordering::Release);
        let uids = self.connectors.lock().ids();
        for uid in uids {
            self.seal_connector(uid);
        }
        // Sealing the last non-daemon connector above may already have driven this frame
        // synchronously to `Terminated` (piggyback-style schedulers run the termination check
        // inline). Re-entering `execute_batch` on an already-terminated frame would emit
        // `Scheduled`/`Preempted` after `Terminated`, breaking the documented lifecycle order.
        if !self.has_terminated() {
            self.schedule_for_execution();
        }
    }

    // ---- enqueue / scheduling protocol (§4.1 "enqueue_event", "schedule_for_execution") ----

    /// Called by a connector's `Channel::send` exactly on the 0→1 edge of its queue. Registers
    /// the connector as pending and, if this frame was not already scheduled, claims the right to
    /// schedule it — all under the monitor, so a worker that later observes `executing == true`
    /// is guaranteed to see the enqueued event once it dequeues (§4.1 "key ordering property").
    pub(crate) fn notify_pending(self: &Arc<Self>, connector: Arc<dyn ConnectorOps>) {
        {
            let mut state = self.monitor.lock();
            state.pending.push(connector);
        }
        if !self.executing.swap(true, Ordering::AcqRel) {
            self.scheduler.schedule(self.clone());
        }
    }

    /// Same scheduling claim as `notify_pending`, without enqueuing anything — used when a
    /// connector is sealed or a timer ticks. Idempotent while `executing` is already true.
    pub fn schedule_for_execution(self: &Arc<Self>) {
        if !self.executing.swap(true, Ordering::AcqRel) {
            self.scheduler.schedule(self.clone());
        }
    }

    /// Claims the scheduling right and dispatches through `scheduler` instead of this frame's
    /// own scheduler selection. Used exactly once, by `ReactorSystem::spawn`, to force the
    /// Fresh→Running transition onto a worker no matter what the `Proto` selected — spawning
    /// must never run the reactor constructor on the caller's thread (§4.3).
    pub(crate) fn dispatch_initial_batch(self: &Arc<Self>, scheduler: &Arc<dyn Scheduler>) {
        if !self.executing.swap(true, Ordering::AcqRel) {
            scheduler.schedule(self.clone());
        }
    }

    fn emit_system(&self, event: SystemEvent) {
        match &event {
            SystemEvent::Died(reason) => {
                tracing::warn!(frame = self.uid, name = %self.name, reason = %reason, "reactor died");
            }
            _ => {
                tracing::debug!(frame = self.uid, name = %self.name, event = ?event, "system event");
            }
        }
        if let Some(connector) = self.system_connector.lock().as_ref() {
            connector.publish_direct(&event);
        }
    }

    fn deregister_from_system(&self) {
        if let Some(system) = self.system.upgrade() {
            system.release_frame(self.uid);
        }
    }

    /// Forces the lifecycle to `Terminated` if it is not already there. `has_reactor` controls
    /// whether `Terminated` is emitted through the (possibly nonexistent) system stream — a
    /// constructor failure never had a reactor to emit through (§7 kind 1).
    fn force_terminate(&self, has_reactor: bool) {
        let became_terminated = {
            let mut state = self.monitor.lock();
            if state.lifecycle == Lifecycle::Terminated {
                false
            } else {
                state.lifecycle = Lifecycle::Terminated;
                true
            }
        };
        if became_terminated {
            if has_reactor {
                self.emit_system(SystemEvent::Terminated);
            }
            self.deregister_from_system();
        }
    }

    // ---- execute_batch (§4.1) ----

    /// Runs one batch. Preconditions: `executing == true`, and the calling thread must not
    /// already have a reactor bound (nested execution is a fatal programming error, §4.4).
    pub fn execute_batch(self: &Arc<Self>) {
        let guard = match context::bind(self.clone()) {
            Ok(guard) => guard,
            Err(err) => panic!("{err}"),
        };

        let became_running = {
            let mut state = self.monitor.lock();
            if state.lifecycle == Lifecycle::Fresh {
                state.lifecycle = Lifecycle::Running;
                true
            } else {
                false
            }
        };

        if became_running {
            let ctor = self
                .ctor
                .lock()
                .take()
                .expect("a fresh frame always has a constructor installed before its first batch");
            match ctor() {
                Ok(reactor) => {
                    *self.iso.lock() = Some(reactor);
                    self.emit_system(SystemEvent::Started);
                }
                Err(payload) => {
                    let err = Error::ConstructorPanic {
                        frame_uid: self.uid,
                        frame_name: self.name.clone(),
                        source: payload,
                    };
                    self.scheduler.handler(&err);
                    self.force_terminate(false);
                    return;
                }
            }
        }

        self.emit_system(SystemEvent::Scheduled);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.drain_batch()));
        if let Err(panic_payload) = outcome {
            let payload = PanicPayload::from_panic(panic_payload);
            let message = payload.message();
            let err = Error::HandlerPanic {
                frame_uid: self.uid,
                frame_name: self.name.clone(),
                source: payload,
            };
            self.scheduler.handler(&err);
            if !self.has_terminated() {
                self.emit_system(SystemEvent::Died(message));
            }
            self.force_terminate(true);
            return;
        }

        self.emit_system(SystemEvent::Preempted);

        let terminated_now = {
            let mut state = self.monitor.lock();
            let should_terminate = self.forced.load(Ordering::Acquire)
                || (state.pending.is_empty() && self.non_daemon_count.load(Ordering::Acquire) == 0);
            if state.lifecycle == Lifecycle::Running && should_terminate {
                state.lifecycle = Lifecycle::Terminated;
                true
            } else {
                false
            }
        };
        if terminated_now {
            self.emit_system(SystemEvent::Terminated);
            self.deregister_from_system();
        }

        let must_schedule = {
            let state = self.monitor.lock();
            if state.pending.is_empty() {
                self.executing.store(false, Ordering::Release);
                false
            } else {
                true
            }
        };

        // Drop the binding before handing off the continuation: a scheduler (piggyback, in
        // particular) is entitled to run the next batch inline, and inline execution rebinds the
        // thread-local itself — it must not see this batch as still in progress (§4.4).
        drop(guard);
        if must_schedule {
            self.scheduler.schedule(self.clone());
        }
    }

    /// Drains pending connectors up to the batch budget (§4.1 step 4). Runs without holding the
    /// monitor except for the brief pop/re-append of a connector.
    fn drain_batch(&self) {
        self.scheduler_state.lock().on_batch_start();

        loop {
            let connector = {
                let mut state = self.monitor.lock();
                state.pending.pop_front()
            };
            let connector = match connector {
                Some(c) => c,
                None => break,
            };

            loop {
                let remaining = connector.drain_one();

                let mut scheduler_state = self.scheduler_state.lock();
                scheduler_state.on_batch_event();
                let can_continue = scheduler_state.can_consume();
                drop(scheduler_state);

                if !can_continue {
                    if remaining > 0 {
                        let mut state = self.monitor.lock();
                        state.pending.push(connector);
                    }
                    self.scheduler_state.lock().on_batch_stop();
                    return;
                }
                if remaining == 0 {
                    break;
                }
            }
        }

        self.scheduler_state.lock().on_batch_stop();
    }
}
