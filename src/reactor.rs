//! The reactor object contract (§6 "Reactor object").
//!
//! A reactor is constructed exactly once, inside the frame's first batch, with its `main` and
//! `system` connectors already open. From then on nothing calls back into the reactor object
//! directly — all dispatch happens through handlers subscribed (usually from inside `new`) on a
//! connector's event stream, which the frame drives by calling `ConnectorOps::drain_one`. Opening
//! further connectors or sealing one is available from anywhere running on the reactor's own
//! thread via [`crate::context::current_frame`], which is bound for the whole of `new` as well as
//! every subsequent handler invocation.

use crate::connector::Connector;
use crate::context::SystemEvent;

/// Everything a reactor's constructor is handed: its default connector and the connector
/// carrying lifecycle events. Consumed by value — a reactor that wants to keep sending to itself
/// typically stores `init.main.channel()` in a field.
pub struct ReactorInit<T> {
    pub main: Connector<T>,
    pub system: Connector<SystemEvent>,
}

/// Implemented by user types that want to run as a reactor. `Event` is the type carried by the
/// `main` connector; a reactor that needs more sources opens additional connectors of other
/// event types from inside `new` (or later, from a handler) via the current frame.
pub trait Reactor: Send + 'static {
    type Event: Send + 'static;

    /// Builds the reactor. Panicking here is a constructor failure (§7 kind 1): the frame is
    /// forced to `Terminated` without ever emitting `Started`.
    fn new(init: ReactorInit<Self::Event>) -> Self
    where
        Self: Sized;
}
