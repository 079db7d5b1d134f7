//! Event model for the command kernel.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use perimeter_core::{CommandId, ProjectId};

/// The closed set of event kinds this kernel exchanges.
///
/// Subscriptions are keyed by kind; extending the set is a deliberate,
/// convention-level change shared by every participant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    CommandReceived,
    JobCompleted,
    JobFailed,
}

impl EventKind {
    /// Stable wire/log name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CommandReceived => "COMMAND_RECEIVED",
            EventKind::JobCompleted => "JOB_COMPLETED",
            EventKind::JobFailed => "JOB_FAILED",
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload of a `COMMAND_RECEIVED` event: everything a handler service
/// needs to decide whether the command is for it and to execute the work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub id: CommandId,
    pub name: String,
    pub payload: JsonValue,
    pub project_id: ProjectId,
}

/// An immutable message on the bus.
///
/// Events are values: they are cloned per delivery and never mutated after
/// publication. The `id` correlates every event back to one ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusEvent {
    /// A command was accepted by the dispatcher and awaits a handler.
    CommandReceived(CommandRequest),
    /// A handler finished the command and produced an output artifact.
    JobCompleted { id: CommandId, output: String },
    /// A handler gave up on the command with a human-readable reason.
    JobFailed { id: CommandId, error: String },
}

impl BusEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BusEvent::CommandReceived(_) => EventKind::CommandReceived,
            BusEvent::JobCompleted { .. } => EventKind::JobCompleted,
            BusEvent::JobFailed { .. } => EventKind::JobFailed,
        }
    }

    /// The command this event concerns.
    pub fn command_id(&self) -> CommandId {
        match self {
            BusEvent::CommandReceived(request) => request.id,
            BusEvent::JobCompleted { id, .. } => *id,
            BusEvent::JobFailed { id, .. } => *id,
        }
    }
}
