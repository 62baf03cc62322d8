//! Error kinds (§7). Every non-total path in the runtime is a bug; these are the total ones.

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// A captured panic payload, carried by [`Error::ConstructorPanic`] and [`Error::HandlerPanic`]
/// so the scheduler's top-level handler (and `tracing`) can report something actionable instead
/// of an opaque `Box<dyn Any>`.
pub struct PanicPayload(Box<dyn Any + Send + 'static>);

impl PanicPayload {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        PanicPayload(payload)
    }

    pub(crate) fn from_error(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        PanicPayload(Box::new(err.to_string()))
    }

    /// Best-effort human-readable message. Rust panic payloads are conventionally `&str` or
    /// `String`; anything else reports as opaque rather than guessing.
    pub fn message(&self) -> String {
        if let Some(s) = self.0.downcast_ref::<&'static str>() {
            s.to_string()
        } else if let Some(s) = self.0.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        }
    }
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicPayload").field(&self.message()).finish()
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for PanicPayload {}

/// Runtime error kinds. `SendAfterTerminate` (§7 kind 5) is deliberately absent: it is a silent
/// drop by design, never surfaced to the sender, so it has no variant here.
#[derive(Debug, Error)]
pub enum Error {
    /// A reactor's constructor panicked (or returned `Err`) before the reactor existed. The
    /// frame is forced to `Terminated` without ever emitting `Started`, `Died`, or `Terminated`
    /// through the (nonexistent) reactor, and the system's frame store removes the entry.
    #[error("constructor panicked for frame {frame_uid} ({frame_name:?})")]
    ConstructorPanic {
        frame_uid: u64,
        frame_name: String,
        #[source]
        source: PanicPayload,
    },

    /// A user handler panicked while processing a batch. Reported to the scheduler's handler,
    /// followed by `Died` then `Terminated` on the reactor's system stream.
    #[error("handler panicked in frame {frame_uid} ({frame_name:?})")]
    HandlerPanic {
        frame_uid: u64,
        frame_name: String,
        #[source]
        source: PanicPayload,
    },

    /// `execute_batch` was entered on a thread that already has a bound reactor. This is a fatal
    /// programming error (§4.4, §7 kind 3): the runtime aborts rather than returning this to a
    /// caller that could plausibly continue, but the variant is kept so the condition is a named,
    /// documented part of the API rather than a bare `panic!` with no type behind it.
    #[error("execute_batch re-entered on a thread already bound to frame {frame_uid}")]
    NestedReactor { frame_uid: u64 },

    /// Reserved for a future, stricter `UniqueStore` policy. The store this crate ships
    /// (`unique_store::UniqueStore::resolve_name`) always disambiguates colliding names instead
    /// of rejecting them (the documented resolution of the §9 open question), so this variant is
    /// never produced by `open_connector` today.
    #[error("connector name {name:?} is already in use on frame {frame_uid}")]
    DuplicateName { frame_uid: u64, name: String },

    /// `open_connector` was called on a frame that has already reached `Terminated`.
    #[error("frame {frame_uid} ({frame_name:?}) has already terminated")]
    FrameTerminated { frame_uid: u64, frame_name: String },
}
