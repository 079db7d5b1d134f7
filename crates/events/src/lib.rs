//! `perimeter-events` — in-process event bus and handler services.
//!
//! This crate carries the messaging half of the command kernel:
//!
//! - [`BusEvent`] / [`EventKind`]: the closed set of messages exchanged
//!   between the dispatcher, handler services, and the status projector.
//! - [`EventBus`]: a synchronous publish/subscribe channel. One long-lived
//!   instance per process; subscribers receive events in registration order
//!   and a failing subscriber never blocks the rest.
//! - [`CommandService`] / [`ServiceRegistry`]: the handler contract and the
//!   dispatch table that binds services to the bus, runs their work off the
//!   dispatch thread, and guarantees exactly one terminal event per accepted
//!   command.

pub mod bus;
pub mod event;
pub mod service;

pub use bus::{EventBus, Subscription};
pub use event::{BusEvent, CommandRequest, EventKind};
pub use service::{CommandService, ServiceRegistry};
