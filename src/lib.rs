//! # reactor-core
//!
//! An execution substrate for isolated, single-threaded, event-driven reactors. A reactor is an
//! actor-like unit that reacts to typed events arriving on one or more [`connector`]s, processing
//! at most one event at a time; the runtime guarantees that no two handlers of the same reactor
//! ever run concurrently, no matter how many threads are sending to it.
//!
//! ## Crate structure
//!
//! The [`frame`] is the runtime's bookkeeping object for one reactor: its connectors, lifecycle
//! state, and scheduling flag. A [`scheduler`] decides when a frame's batch runs and for how
//! long; [`system`] is the process-wide registry that spawns frames and owns the scheduler
//! bundle. [`reactor`] and [`proto`] are the two pieces user code touches directly: implement
//! [`reactor::Reactor`] for your type, describe how to construct and schedule it with a
//! [`proto::Proto`], and hand that to [`system::ReactorSystem::spawn`].
//!
//! To get a tour of the source, start at [`frame::Frame::execute_batch`], the heart of the
//! runtime, then follow its calls out to [`connector`] and [`scheduler`].

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_qualifications
)]
#![forbid(unsafe_code)]

pub mod connector;
pub mod context;
pub mod error;
pub mod frame;
pub mod proto;
pub mod queue;
pub mod reactor;
pub mod scheduler;
pub mod stream;
pub mod system;
mod unique_store;

pub use connector::{Channel, Connector};
pub use context::{current_frame, SystemEvent};
pub use error::Error;
pub use frame::Frame;
pub use proto::Proto;
pub use reactor::{Reactor, ReactorInit};
pub use system::ReactorSystem;
