//! Status projector: folds terminal events back into the ledger.
//!
//! Exactly one projector is attached per process. Handler services never
//! mutate the ledger; they publish events, and this component is the sole
//! writer of `status`/`output`/`error`. That single-writer rule is what
//! keeps concurrent handler completions from racing each other.

use std::sync::Arc;

use perimeter_events::{BusEvent, EventBus, EventKind, Subscription};

use crate::ledger::{CommandLedger, LedgerUpdate};

/// Subscribes to `JOB_COMPLETED`/`JOB_FAILED` and applies terminal
/// transitions. Repeated terminal events for the same command and events
/// for unknown ids are logged and dropped (first terminal write wins).
///
/// Dropping the projector detaches it from the bus.
#[derive(Debug)]
pub struct StatusProjector {
    _completed: Subscription,
    _failed: Subscription,
}

impl StatusProjector {
    pub fn attach(ledger: Arc<CommandLedger>, bus: &EventBus) -> Self {
        let completed = {
            let ledger = ledger.clone();
            bus.subscribe(EventKind::JobCompleted, move |event| {
                if let BusEvent::JobCompleted { id, output } = event {
                    let update = ledger.complete(*id, output.clone());
                    log_update("JOB_COMPLETED", *id, update);
                }
            })
        };
        let failed = bus.subscribe(EventKind::JobFailed, move |event| {
            if let BusEvent::JobFailed { id, error } = event {
                let update = ledger.fail(*id, error.clone());
                log_update("JOB_FAILED", *id, update);
            }
        });

        Self {
            _completed: completed,
            _failed: failed,
        }
    }
}

fn log_update(kind: &str, id: perimeter_core::CommandId, update: LedgerUpdate) {
    match update {
        LedgerUpdate::Applied => {
            tracing::debug!(kind, command = %id, "terminal state recorded");
        }
        LedgerUpdate::Ignored => {
            tracing::debug!(kind, command = %id, "command already settled; ignoring repeated terminal event");
        }
        LedgerUpdate::Unknown => {
            tracing::warn!(kind, command = %id, "terminal event for unknown command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CommandRecord, CommandStatus};
    use perimeter_core::{CommandId, ProjectId};
    use serde_json::json;

    fn settled_kernel() -> (Arc<CommandLedger>, EventBus, StatusProjector) {
        let ledger = Arc::new(CommandLedger::new());
        let bus = EventBus::new();
        let projector = StatusProjector::attach(ledger.clone(), &bus);
        (ledger, bus, projector)
    }

    fn submit(ledger: &CommandLedger) -> CommandId {
        let record = CommandRecord::new("report_generate", json!({}), ProjectId::new());
        let id = record.id;
        ledger.append(record).unwrap();
        id
    }

    #[test]
    fn completed_event_settles_the_entry() {
        let (ledger, bus, _projector) = settled_kernel();
        let id = submit(&ledger);

        bus.publish(BusEvent::JobCompleted {
            id,
            output: "# Report".to_string(),
        });

        let snapshot = ledger.get(id).unwrap();
        assert_eq!(snapshot.status, CommandStatus::Completed);
        assert_eq!(snapshot.output.as_deref(), Some("# Report"));
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn failed_event_settles_the_entry() {
        let (ledger, bus, _projector) = settled_kernel();
        let id = submit(&ledger);

        bus.publish(BusEvent::JobFailed {
            id,
            error: "project not found".to_string(),
        });

        let snapshot = ledger.get(id).unwrap();
        assert_eq!(snapshot.status, CommandStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("project not found"));
        assert!(snapshot.output.is_none());
    }

    #[test]
    fn second_terminal_event_is_ignored() {
        let (ledger, bus, _projector) = settled_kernel();
        let id = submit(&ledger);

        bus.publish(BusEvent::JobFailed {
            id,
            error: "first".to_string(),
        });
        bus.publish(BusEvent::JobCompleted {
            id,
            output: "late success".to_string(),
        });

        let snapshot = ledger.get(id).unwrap();
        assert_eq!(snapshot.status, CommandStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("first"));
        assert!(snapshot.output.is_none());
    }

    #[test]
    fn unknown_ids_do_not_create_entries() {
        let (ledger, bus, _projector) = settled_kernel();

        bus.publish(BusEvent::JobCompleted {
            id: CommandId::new(),
            output: "orphan".to_string(),
        });

        assert!(ledger.is_empty());
    }

    #[test]
    fn detached_projector_stops_writing() {
        let (ledger, bus, projector) = settled_kernel();
        let id = submit(&ledger);
        drop(projector);

        bus.publish(BusEvent::JobCompleted {
            id,
            output: "nobody listening".to_string(),
        });

        assert_eq!(ledger.get(id).unwrap().status, CommandStatus::Pending);
    }
}
