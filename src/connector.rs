//! Connector: queue + channel + reactor-local emitter, bound to a frame (§3 "Connector").

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::frame::Frame;
use crate::queue::{EventQueue, UnboundedQueue};
use crate::stream::EventStream;

/// Constructs a connector's queue backend. Passed through `Proto` (§6); defaults to
/// [`UnboundedQueue`] when absent.
pub type QueueFactory<T> = Box<dyn Fn() -> Box<dyn EventQueue<T> + Send> + Send + Sync>;

/// Type-erased operations a frame needs on a connector without knowing its event type. Every
/// `ConnectorInner<T>` implements this so a frame can hold a heterogeneous
/// `pending_queues`/`connectors` registry across connectors of different `T`.
pub(crate) trait ConnectorOps: Send + Sync {
    fn uid(&self) -> u64;
    fn name(&self) -> &str;
    fn is_daemon(&self) -> bool;
    fn is_open(&self) -> bool;
    /// Marks the connector closed. Returns whether it was open (idempotent: `false` on a repeat
    /// call, matching `seal_connector`'s documented idempotence).
    fn close(&self) -> bool;
    fn queue_len(&self) -> usize;
    /// Dequeues one event and publishes it on the connector's stream. Returns the queue length
    /// after removal. Only ever called from the owning reactor's thread during a batch.
    fn drain_one(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
}

pub(crate) struct ConnectorInner<T> {
    uid: u64,
    name: String,
    is_daemon: bool,
    is_open: AtomicBool,
    pub(crate) frame: Weak<Frame>,
    queue: Mutex<Box<dyn EventQueue<T> + Send>>,
    stream: Mutex<EventStream<T>>,
}

impl<T: Send + 'static> ConnectorInner<T> {
    pub(crate) fn new(
        uid: u64,
        name: String,
        is_daemon: bool,
        frame: Weak<Frame>,
        queue_factory: Option<&QueueFactory<T>>,
    ) -> Self {
        let queue: Box<dyn EventQueue<T> + Send> = match queue_factory {
            Some(factory) => factory(),
            None => Box::new(UnboundedQueue::new()),
        };
        ConnectorInner {
            uid,
            name,
            is_daemon,
            is_open: AtomicBool::new(true),
            frame,
            queue: Mutex::new(queue),
            stream: Mutex::new(EventStream::new()),
        }
    }

    /// Pushes a value onto the queue, returning the size after insertion (the 0→1 edge the
    /// sending channel checks for). Lock-free with respect to the frame monitor: this never
    /// takes the frame's monitor itself.
    pub(crate) fn enqueue(&self, value: T) -> usize {
        self.queue.lock().enqueue(value)
    }

    pub(crate) fn publish_direct(&self, value: &T) {
        self.stream.lock().publish(value);
    }

    pub(crate) fn subscribe<F>(&self, handler: F)
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.stream.lock().subscribe(handler);
    }
}

impl<T: Send + 'static> ConnectorOps for ConnectorInner<T> {
    fn uid(&self) -> u64 {
        self.uid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_daemon(&self) -> bool {
        self.is_daemon
    }

    fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Acquire)
    }

    fn close(&self) -> bool {
        self.is_open.swap(false, Ordering::AcqRel)
    }

    fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    fn drain_one(&self) -> usize {
        let (value, remaining) = self.queue.lock().dequeue();
        self.stream.lock().publish(&value);
        remaining
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The reactor-facing half of a connector: used from inside a `Reactor::new` (or later, via the
/// bound frame) to subscribe handlers and to read back its own identity.
pub struct Connector<T> {
    pub(crate) inner: Arc<ConnectorInner<T>>,
}

impl<T: Send + 'static> Connector<T> {
    pub(crate) fn new(inner: Arc<ConnectorInner<T>>) -> Self {
        Connector { inner }
    }

    pub fn uid(&self) -> u64 {
        self.inner.uid
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_daemon(&self) -> bool {
        self.inner.is_daemon
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Registers a handler that runs, on the reactor's own thread, for every event this
    /// connector dequeues from this point on.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.inner.subscribe(handler);
    }

    /// A send handle addressing this connector. Channels are cheap to clone and outlive the
    /// connector's `Reactor::new` call.
    pub fn channel(&self) -> Channel<T> {
        Channel {
            connector: self.inner.clone(),
        }
    }
}

/// A send-only handle addressing exactly one connector (§3 "Channel"). Remains a valid value
/// after the target reactor terminates; `send` simply becomes a no-op.
pub struct Channel<T> {
    pub(crate) connector: Arc<ConnectorInner<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel {
            connector: self.connector.clone(),
        }
    }
}

impl<T: Send + 'static> Channel<T> {
    /// Non-blocking send. A no-op, not an error, if the target frame has terminated or this
    /// connector has been sealed (§7 kind 5, `SendAfterTerminate`).
    pub fn send(&self, value: T) {
        let frame = match self.connector.frame.upgrade() {
            Some(frame) => frame,
            None => return,
        };
        if frame.has_terminated() || !self.connector.is_open() {
            return;
        }
        let size = self.connector.enqueue(value);
        if size == 1 {
            frame.notify_pending(self.connector.clone());
        }
    }
}
