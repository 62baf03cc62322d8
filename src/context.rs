//! Thread-local "current reactor" and the lifecycle events carried on every reactor's system
//! stream (§4.4, §6).

use std::cell::RefCell;
use std::sync::Arc;

use crate::error::Error;
use crate::frame::Frame;

/// Lifecycle events emitted, in order, on a reactor's `system` connector:
/// `Started -> (Scheduled -> Preempted)* -> Died? -> Terminated`.
#[derive(Debug)]
pub enum SystemEvent {
    Started,
    Scheduled,
    Preempted,
    /// Carries a best-effort message extracted from the panic payload (see
    /// [`PanicPayload::message`]); the payload itself travels on [`Error::HandlerPanic`] instead,
    /// since `Box<dyn Any>` is not `Clone` and this event may be observed by multiple
    /// subscribers.
    Died(String),
    Terminated,
}

thread_local! {
    static CURRENT_FRAME: RefCell<Option<Arc<Frame>>> = RefCell::new(None);
}

/// RAII guard unbinding the thread-local "current reactor" slot on drop, including on unwind —
/// `execute_batch` relies on this to restore a clean slate even when a handler panics.
pub(crate) struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_FRAME.with(|cell| {
            *cell.borrow_mut() = None;
        });
    }
}

/// Binds `frame` as the current thread's reactor. Fails if this thread already has one bound —
/// `execute_batch` must never be re-entered (§4.4, §7 kind 3).
pub(crate) fn bind(frame: Arc<Frame>) -> Result<ContextGuard, Error> {
    CURRENT_FRAME.with(|cell| {
        let mut current = cell.borrow_mut();
        if current.is_some() {
            return Err(Error::NestedReactor {
                frame_uid: frame.uid(),
            });
        }
        *current = Some(frame);
        Ok(ContextGuard { _private: () })
    })
}

/// The frame bound to the calling thread, if any. Lets reactor-internal code discover its own
/// frame, e.g. to open further connectors or seal one.
pub fn current_frame() -> Option<Arc<Frame>> {
    CURRENT_FRAME.with(|cell| cell.borrow().clone())
}
