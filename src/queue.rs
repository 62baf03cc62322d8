//! Interchangeable FIFO backends for a connector's pending events.
//!
//! `enqueue` returns the size *after* insertion so callers can detect the 0→1 edge; `dequeue`
//! returns the dequeued value together with the size *after* removal, so the frame's drain loop
//! knows whether to stay on a connector or move to the next one.

use std::collections::VecDeque;

use tracing::warn;

/// A FIFO of `T`. Implementations need not be thread-safe themselves — the frame only ever
/// mutates a connector's queue for the 0→1 edge under its monitor, and only the reactor's own
/// thread dequeues — but the trait object is shared across threads, so `Send` is required.
pub trait EventQueue<T>: Send {
    /// Pushes `value`, returning the queue length after insertion.
    fn enqueue(&mut self, value: T) -> usize;

    /// Pops the oldest value. Panics if the queue is empty — callers only dequeue when they
    /// know, from a prior `enqueue` or queue length check, that a value is present.
    fn dequeue(&mut self) -> (T, usize);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default queue: grows without bound, backed by a `VecDeque`.
pub struct UnboundedQueue<T> {
    inner: VecDeque<T>,
}

impl<T> UnboundedQueue<T> {
    pub fn new() -> Self {
        UnboundedQueue {
            inner: VecDeque::new(),
        }
    }
}

impl<T> Default for UnboundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> EventQueue<T> for UnboundedQueue<T> {
    fn enqueue(&mut self, value: T) -> usize {
        self.inner.push_back(value);
        self.inner.len()
    }

    fn dequeue(&mut self) -> (T, usize) {
        let value = self
            .inner
            .pop_front()
            .expect("dequeue called on an empty UnboundedQueue");
        (value, self.inner.len())
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Bounded ring buffer that drops the oldest entry on overflow rather than blocking the sender.
/// The drop is never silent: it is logged at `warn` with the connector-agnostic queue capacity,
/// since a connector wired to this queue is explicitly opting into lossy behaviour.
pub struct RingQueue<T> {
    capacity: usize,
    inner: VecDeque<T>,
}

impl<T> RingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingQueue capacity must be at least 1");
        RingQueue {
            capacity,
            inner: VecDeque::with_capacity(capacity),
        }
    }
}

impl<T: Send> EventQueue<T> for RingQueue<T> {
    fn enqueue(&mut self, value: T) -> usize {
        if self.inner.len() == self.capacity {
            self.inner.pop_front();
            warn!(capacity = self.capacity, "RingQueue full, dropping oldest event");
        }
        self.inner.push_back(value);
        self.inner.len()
    }

    fn dequeue(&mut self) -> (T, usize) {
        let value = self
            .inner
            .pop_front()
            .expect("dequeue called on an empty RingQueue");
        (value, self.inner.len())
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Single-slot queue: a new value overwrites whatever is pending. Useful for latest-value-wins
/// connectors such as a periodic sampling feed, where only the most recent reading matters.
pub struct SingleSlotQueue<T> {
    slot: Option<T>,
}

impl<T> SingleSlotQueue<T> {
    pub fn new() -> Self {
        SingleSlotQueue { slot: None }
    }
}

impl<T> Default for SingleSlotQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> EventQueue<T> for SingleSlotQueue<T> {
    fn enqueue(&mut self, value: T) -> usize {
        self.slot = Some(value);
        1
    }

    fn dequeue(&mut self) -> (T, usize) {
        let value = self
            .slot
            .take()
            .expect("dequeue called on an empty SingleSlotQueue");
        (value, 0)
    }

    fn len(&self) -> usize {
        if self.slot.is_some() {
            1
        } else {
            0
        }
    }
}
