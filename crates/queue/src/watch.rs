//! Cancellable polling client for command status.
//!
//! The kernel itself never pushes completion to callers; clients poll the
//! ledger at a fixed interval until their command settles. This module
//! packages that loop as a background task whose handle is the first-class
//! cancellation capability: `cancel()` stops the loop, dropping the handle
//! abandons observation, and the optional poll budget is the caller-side
//! ceiling after which a stuck command is treated as abandoned.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use perimeter_core::CommandId;

use crate::ledger::{CommandLedger, CommandRecord, CommandStatus};

/// Polling schedule.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Fixed interval between ledger reads.
    pub interval: Duration,
    /// Give up after this many polls; `None` polls until cancelled.
    pub max_polls: Option<u32>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_polls: None,
        }
    }
}

impl WatchConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }
}

/// How a watch ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
    /// The command reached a terminal state; here is its snapshot.
    Settled(CommandRecord),
    /// The poll budget ran out first. The command may still settle later;
    /// the kernel defines no deadline of its own.
    GaveUp { last_seen: Option<CommandStatus> },
}

/// Handle to a running watch.
///
/// The watcher thread stops as soon as the handle is cancelled or dropped;
/// the watched command keeps running regardless.
#[derive(Debug)]
pub struct CommandWatch {
    cancel: mpsc::Sender<()>,
    outcome: mpsc::Receiver<WatchOutcome>,
    join: Option<thread::JoinHandle<()>>,
}

impl CommandWatch {
    /// Start polling the ledger for `id`.
    pub fn spawn(ledger: Arc<CommandLedger>, id: CommandId, config: WatchConfig) -> Self {
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let (outcome_tx, outcome_rx) = mpsc::channel();

        let join = thread::spawn(move || {
            watch_loop(ledger, id, config, cancel_rx, outcome_tx);
        });

        Self {
            cancel: cancel_tx,
            outcome: outcome_rx,
            join: Some(join),
        }
    }

    /// Block until the watch ends.
    ///
    /// Returns `None` if the loop exited without producing an outcome.
    pub fn wait(mut self) -> Option<WatchOutcome> {
        let outcome = self.outcome.recv().ok();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
        outcome
    }

    /// Check for an outcome without blocking.
    pub fn try_outcome(&self) -> Option<WatchOutcome> {
        match self.outcome.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Stop polling. The command itself is unaffected.
    pub fn cancel(mut self) {
        let _ = self.cancel.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for CommandWatch {
    fn drop(&mut self) {
        // Dropping the cancel sender disconnects the loop's channel, which
        // the loop treats as cancellation. The thread is left to finish on
        // its own.
        let _ = self.join.take();
    }
}

fn watch_loop(
    ledger: Arc<CommandLedger>,
    id: CommandId,
    config: WatchConfig,
    cancel: mpsc::Receiver<()>,
    outcome: mpsc::Sender<WatchOutcome>,
) {
    tracing::debug!(command = %id, interval_ms = config.interval.as_millis() as u64, "watch started");
    let mut polls = 0u32;

    loop {
        let snapshot = ledger.get(id);

        if let Some(record) = &snapshot {
            if record.status.is_terminal() {
                tracing::debug!(command = %id, status = ?record.status, "watch settled");
                let _ = outcome.send(WatchOutcome::Settled(record.clone()));
                return;
            }
        }

        polls += 1;
        if let Some(max) = config.max_polls {
            if polls >= max {
                tracing::debug!(command = %id, polls, "watch gave up");
                let _ = outcome.send(WatchOutcome::GaveUp {
                    last_seen: snapshot.map(|record| record.status),
                });
                return;
            }
        }

        // The interval sleep doubles as the cancellation wait.
        match cancel.recv_timeout(config.interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!(command = %id, "watch cancelled");
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}
