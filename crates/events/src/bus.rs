//! Synchronous in-process publish/subscribe bus.
//!
//! One bus instance lives for the whole process. Publishing delivers the
//! event to every handler currently subscribed to that kind, on the
//! publishing thread, in subscription-registration order. There is no
//! persistence and no redelivery; the ledger, not the bus, is the source of
//! truth for command state.
//!
//! Failure containment: a subscriber that panics is caught and logged, and
//! delivery continues with the remaining subscribers. The publisher never
//! observes subscriber failures.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::event::{BusEvent, EventKind};

type HandlerFn = dyn Fn(&BusEvent) + Send + Sync;

#[derive(Default)]
struct BusInner {
    /// Per-kind subscriber lists; vector order is registration order.
    subscribers: Mutex<HashMap<EventKind, Vec<(u64, Arc<HandlerFn>)>>>,
    next_token: AtomicU64,
}

/// In-process event bus.
///
/// Cheap to clone; all clones share the same subscriber table. Create one at
/// process start and hand clones to the dispatcher, the projector, and the
/// service registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind.
    ///
    /// The returned [`Subscription`] is the capability to unsubscribe:
    /// calling [`Subscription::unsubscribe`] (or dropping the guard) detaches
    /// the handler. Components that subscribe during initialization should
    /// hold their guards for their own lifetime and release them at teardown.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let handler: Arc<HandlerFn> = Arc::new(handler);

        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.entry(kind).or_default().push((token, handler));

        Subscription {
            bus: Arc::downgrade(&self.inner),
            kind,
            token,
        }
    }

    /// Deliver an event to every current subscriber of its kind.
    ///
    /// Zero subscribers is a silent no-op. The subscriber list is snapshotted
    /// before dispatch, so handlers may publish or subscribe re-entrantly.
    pub fn publish(&self, event: BusEvent) {
        let kind = event.kind();

        let handlers: Vec<Arc<HandlerFn>> = {
            let subscribers = self
                .inner
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            subscribers
                .get(&kind)
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        tracing::debug!(kind = %kind, subscribers = handlers.len(), "dispatching event");

        for handler in handlers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                tracing::error!(
                    kind = %kind,
                    command = %event.command_id(),
                    panic = %panic_message(panic.as_ref()),
                    "subscriber panicked during dispatch; continuing with remaining subscribers"
                );
            }
        }
    }

    /// Number of handlers currently subscribed to `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.get(&kind).map_or(0, Vec::len)
    }
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Capability to unsubscribe one handler from the bus.
///
/// Dropping the guard detaches the handler; `unsubscribe` makes the intent
/// explicit at teardown sites. Detaching is idempotent and safe after the
/// bus itself is gone.
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<BusInner>,
    kind: EventKind,
    token: u64,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Detach the handler from the bus.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            let mut subscribers = inner
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(list) = subscribers.get_mut(&self.kind) {
                list.retain(|(token, _)| *token != self.token);
            }
        }
    }
}
