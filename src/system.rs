//! The reactor system: the process-wide registry that spawns, names, and terminates reactors
//! (§4.3).

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::connector::Channel;
use crate::context::SystemEvent;
use crate::error::{Error, PanicPayload};
use crate::frame::{Frame, FrameHandle};
use crate::proto::Proto;
use crate::reactor::{Reactor, ReactorInit};
use crate::scheduler::{Bundle, Scheduler, SchedulerSelection};
use crate::unique_store::UniqueStore;

pub(crate) struct SystemInner {
    frames: Mutex<UniqueStore<FrameHandle>>,
    /// `main` channels keyed by the frame's resolved name, type-erased so frames of different
    /// event types share one registry. Looked up generically by `ReactorSystem::find`.
    main_channels: Mutex<HashMap<String, Box<dyn Any + Send>>>,
    schedulers: Bundle,
    shutting_down: AtomicBool,
}

impl SystemInner {
    pub(crate) fn release_frame(&self, uid: u64) {
        let removed = self.frames.lock().try_release_by_id(uid);
        if let Some(frame) = removed {
            self.main_channels.lock().remove(frame.name());
        }
    }
}

/// Owns the scheduler bundle and the frame registry; the handle user code holds to spawn and
/// manage reactors. Cheap to clone — internally an `Arc`.
#[derive(Clone)]
pub struct ReactorSystem {
    inner: Arc<SystemInner>,
}

impl ReactorSystem {
    pub fn new() -> Self {
        ReactorSystem {
            inner: Arc::new(SystemInner {
                frames: Mutex::new(UniqueStore::new()),
                main_channels: Mutex::new(HashMap::new()),
                schedulers: Bundle::with_builtins(),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    fn resolve_scheduler(&self, selection: &SchedulerSelection) -> Arc<dyn Scheduler> {
        match selection {
            SchedulerSelection::Direct(scheduler) => scheduler.clone(),
            SchedulerSelection::Named(name) => self
                .inner
                .schedulers
                .get(name)
                .unwrap_or_else(|| {
                    self.inner
                        .schedulers
                        .get("default")
                        .expect("the \"default\" scheduler is always registered")
                }),
        }
    }

    /// Allocates a frame, opens its `main` and `system` connectors, registers it, and schedules
    /// the Fresh→Running transition onto a worker — never onto the calling thread (§4.3).
    pub fn spawn<R: Reactor>(&self, proto: Proto<R::Event>) -> Channel<R::Event> {
        let scheduler = self.resolve_scheduler(&proto.scheduler);

        let (uid, resolved_name) = {
            let mut frames = self.inner.frames.lock();
            let uid = frames.reserve_id();
            let requested = proto.name.clone().unwrap_or_else(|| format!("reactor-{uid}"));
            let resolved_name = frames.resolve_name(&requested, uid);
            (uid, resolved_name)
        };

        let frame: FrameHandle = Frame::new(
            uid,
            resolved_name.clone(),
            scheduler,
            Arc::downgrade(&self.inner),
            proto.batch_budget,
        );

        let (main_connector, main_channel) = frame
            .open_connector::<R::Event>("main", false, proto.main_queue_factory)
            .expect("a freshly created frame has not terminated");
        let (system_connector, _system_channel) = frame
            .open_connector::<SystemEvent>("system", true, None)
            .expect("a freshly created frame has not terminated");
        frame.install_system_connector(system_connector.inner.clone());
        if let Some(subscriber) = proto.system_subscriber {
            system_connector.subscribe(subscriber);
        }

        frame.install_ctor(Box::new(move || {
            let init = ReactorInit {
                main: main_connector,
                system: system_connector,
            };
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| R::new(init)))
                .map(|reactor| Box::new(reactor) as Box<dyn Any + Send>)
                .map_err(PanicPayload::from_panic)
        }));

        self.inner.main_channels.lock().insert(
            resolved_name.clone(),
            Box::new(main_channel.clone()) as Box<dyn Any + Send>,
        );
        self.inner
            .frames
            .lock()
            .insert(uid, resolved_name, frame.clone());

        // The Fresh→Running transition — which runs the reactor constructor — must never happen
        // on the thread that called `spawn` (§4.3), regardless of which scheduler the `Proto`
        // selected for the frame's own steady-state batches (e.g. "piggyback"). Force it onto
        // the system's default pool instead of going through `frame.schedule_for_execution()`.
        let startup_scheduler = self
            .inner
            .schedulers
            .get("default")
            .expect("the \"default\" scheduler is always registered");
        frame.dispatch_initial_batch(&startup_scheduler);

        main_channel
    }

    /// Looks up a frame's `main` channel by its resolved name. Returns `None` both when no frame
    /// has that name and when one does but its event type does not match `T`.
    pub fn find<T: Send + 'static>(&self, name: &str) -> Option<Channel<T>> {
        let channels = self.inner.main_channels.lock();
        channels.get(name)?.downcast_ref::<Channel<T>>().map(|c| c.clone())
    }

    /// Requests termination of every frame. Idempotent; after it returns, every frame currently
    /// registered has been sealed and forced toward `Terminated` (frames may take one more batch
    /// to actually reach it, per §4.1).
    pub fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let frames: Vec<FrameHandle> = self.inner.frames.lock().values().cloned().collect();
        for frame in frames {
            frame.shutdown();
        }
    }

    pub fn register_scheduler(&self, name: impl Into<String>, scheduler: Arc<dyn Scheduler>) {
        self.inner.schedulers.register(name, scheduler);
    }

    pub fn scheduler(&self, name: &str) -> Option<Arc<dyn Scheduler>> {
        self.inner.schedulers.get(name)
    }
}

impl Default for ReactorSystem {
    fn default() -> Self {
        Self::new()
    }
}
