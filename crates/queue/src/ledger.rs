//! The command ledger: authoritative record of every submitted command.
//!
//! Entries are appended at submission and never deleted; retention is an
//! external concern. Reads hand out cloned snapshots, so a reader sees
//! either the pre-transition or the fully post-transition entry, never a
//! torn one.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use perimeter_core::{CommandId, ProjectId};

/// Command lifecycle state.
///
/// `Pending` is set at submission; `Running` is an optional explicit mark; a
/// terminal state (`Completed` xor `Failed`) is reached at most once and
/// never left.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandStatus::Completed | CommandStatus::Failed)
    }
}

/// One ledger entry.
///
/// Exactly one of `output`/`error` is set once the command settles,
/// consistent with `status`; both are `None` before that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: CommandId,
    pub name: String,
    pub project_id: ProjectId,
    pub payload: JsonValue,
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommandRecord {
    /// Create a fresh `PENDING` entry with a new identity.
    pub fn new(name: impl Into<String>, payload: JsonValue, project_id: ProjectId) -> Self {
        let now = Utc::now();
        Self {
            id: CommandId::new(),
            name: name.into(),
            project_id,
            payload,
            status: CommandStatus::Pending,
            output: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of a requested state transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LedgerUpdate {
    /// The transition was applied.
    Applied,
    /// The entry's current state does not admit this transition; in
    /// particular, terminal entries ignore every later write (first
    /// terminal write wins).
    Ignored,
    /// No entry with this id exists.
    Unknown,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("command id already present in ledger: {0}")]
    DuplicateId(CommandId),
}

#[derive(Debug, Default)]
struct LedgerInner {
    /// Submission order.
    records: Vec<CommandRecord>,
    index: HashMap<CommandId, usize>,
}

/// In-memory command ledger.
///
/// Supports concurrent appends and readers; terminal updates are expected
/// from a single logical writer (the status projector).
#[derive(Debug, Default)]
pub struct CommandLedger {
    inner: RwLock<LedgerInner>,
}

impl CommandLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new entry. Ids must be unique for the process lifetime.
    pub fn append(&self, record: CommandRecord) -> Result<(), LedgerError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.index.contains_key(&record.id) {
            return Err(LedgerError::DuplicateId(record.id));
        }
        let position = inner.records.len();
        inner.index.insert(record.id, position);
        inner.records.push(record);
        Ok(())
    }

    /// Snapshot of one entry.
    pub fn get(&self, id: CommandId) -> Option<CommandRecord> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .index
            .get(&id)
            .map(|position| inner.records[*position].clone())
    }

    /// Snapshots of every entry for a project, in submission order.
    ///
    /// Read-only and non-blocking; waiting for completion is the caller's
    /// responsibility via polling.
    pub fn commands_for_project(&self, project_id: ProjectId) -> Vec<CommandRecord> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .records
            .iter()
            .filter(|record| record.project_id == project_id)
            .cloned()
            .collect()
    }

    /// Total number of entries across all projects.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Explicitly mark a command as running.
    ///
    /// Only the `Pending -> Running` transition applies; the pipeline may
    /// also move a command straight from `Pending` to a terminal state.
    pub fn mark_running(&self, id: CommandId) -> LedgerUpdate {
        self.transition(id, |record| {
            if record.status != CommandStatus::Pending {
                return false;
            }
            record.status = CommandStatus::Running;
            true
        })
    }

    /// Record a successful terminal outcome.
    pub fn complete(&self, id: CommandId, output: String) -> LedgerUpdate {
        self.transition(id, |record| {
            record.status = CommandStatus::Completed;
            record.output = Some(output);
            true
        })
    }

    /// Record a failed terminal outcome.
    pub fn fail(&self, id: CommandId, error: String) -> LedgerUpdate {
        self.transition(id, |record| {
            record.status = CommandStatus::Failed;
            record.error = Some(error);
            true
        })
    }

    fn transition(
        &self,
        id: CommandId,
        apply: impl FnOnce(&mut CommandRecord) -> bool,
    ) -> LedgerUpdate {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Some(position) = inner.index.get(&id).copied() else {
            return LedgerUpdate::Unknown;
        };
        let record = &mut inner.records[position];
        if record.status.is_terminal() {
            return LedgerUpdate::Ignored;
        }
        if !apply(record) {
            return LedgerUpdate::Ignored;
        }
        record.updated_at = Utc::now();
        LedgerUpdate::Applied
    }
}
