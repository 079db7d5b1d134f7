//! `perimeter-queue` — command ledger, dispatcher, projector, polling.
//!
//! The write path: [`CommandDispatcher::submit`] records a new command as
//! `PENDING` in the [`CommandLedger`] and publishes `COMMAND_RECEIVED`;
//! handler services pick it up from the bus and publish a terminal event;
//! the [`StatusProjector`] is the single writer that folds terminal events
//! back into the ledger.
//!
//! The read path: [`CommandLedger::commands_for_project`] returns snapshots
//! in submission order, and [`CommandWatch`] wraps the fixed-interval
//! polling loop clients use to wait for a terminal state, with cancellation
//! as a first-class handle.

pub mod dispatcher;
pub mod ledger;
pub mod projector;
pub mod watch;

pub use dispatcher::{CommandDispatcher, OpenScopes, ScopeDirectory, SubmitError};
pub use ledger::{CommandLedger, CommandRecord, CommandStatus, LedgerError, LedgerUpdate};
pub use projector::StatusProjector;
pub use watch::{CommandWatch, WatchConfig, WatchOutcome};
