//! Command submission boundary.
//!
//! The dispatcher is the only producer of ledger entries. It validates the
//! submission, records the command as `PENDING`, publishes
//! `COMMAND_RECEIVED`, and returns the snapshot without waiting for any
//! handler to run.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use perimeter_core::ProjectId;
use perimeter_events::{BusEvent, CommandRequest, EventBus};

use crate::ledger::{CommandLedger, CommandRecord, LedgerError};

/// Scope lookup owned by the persistence layer.
///
/// The dispatcher only asks whether a project exists; what a project *is*
/// stays with the collaborator.
pub trait ScopeDirectory: Send + Sync {
    fn contains(&self, project_id: ProjectId) -> bool;
}

/// Accepts every scope. For tests and single-project deployments where
/// scope validation happens upstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenScopes;

impl ScopeDirectory for OpenScopes {
    fn contains(&self, _project_id: ProjectId) -> bool {
        true
    }
}

/// Submission-time rejection. The command is never created.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The target project is not a known scope.
    #[error("unknown project scope: {0}")]
    InvalidContext(ProjectId),

    /// The payload does not have the shape commands carry.
    ///
    /// Only the generic shape is checked here; name-specific validation is
    /// owned by the handler's contract.
    #[error("invalid payload for command '{name}': {reason}")]
    InvalidPayload { name: String, reason: String },

    #[error("ledger rejected command: {0}")]
    Ledger(#[from] LedgerError),
}

/// Accepts new command requests and feeds them into the kernel.
pub struct CommandDispatcher {
    ledger: Arc<CommandLedger>,
    bus: EventBus,
    scopes: Arc<dyn ScopeDirectory>,
}

impl core::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    pub fn new(ledger: Arc<CommandLedger>, bus: EventBus, scopes: Arc<dyn ScopeDirectory>) -> Self {
        Self { ledger, bus, scopes }
    }

    /// Submit a named command against a project scope.
    ///
    /// On success the returned snapshot is already `PENDING` in the ledger
    /// and `COMMAND_RECEIVED` has been published; the caller observes the
    /// outcome by polling, never by blocking here.
    pub fn submit(
        &self,
        name: impl Into<String>,
        payload: JsonValue,
        project_id: ProjectId,
    ) -> Result<CommandRecord, SubmitError> {
        let name = name.into();

        if !self.scopes.contains(project_id) {
            return Err(SubmitError::InvalidContext(project_id));
        }
        if !payload.is_object() {
            return Err(SubmitError::InvalidPayload {
                name,
                reason: "expected a JSON object".to_string(),
            });
        }

        let record = CommandRecord::new(name, payload, project_id);
        self.ledger.append(record.clone())?;

        tracing::info!(
            command = %record.id,
            name = %record.name,
            project = %project_id,
            "command accepted"
        );

        self.bus.publish(BusEvent::CommandReceived(CommandRequest {
            id: record.id,
            name: record.name.clone(),
            payload: record.payload.clone(),
            project_id,
        }));

        Ok(record)
    }
}
