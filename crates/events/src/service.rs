//! Handler service contract and the registry binding services to the bus.
//!
//! A service does not subscribe to the bus itself. The [`ServiceRegistry`]
//! owns one `COMMAND_RECEIVED` subscription per registered service, filters
//! by `handles(name)`, and runs accepted commands on a worker thread so the
//! dispatch loop returns promptly. The registry, not the service, publishes
//! the terminal event; that is what makes "exactly one terminal event per
//! accepted command" hold even when a handler panics.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::bus::{EventBus, Subscription, panic_message};
use crate::event::{BusEvent, CommandRequest, EventKind};

/// A unit of domain work reachable through the command kernel.
///
/// Implementations declare which command names they accept and turn an
/// accepted request into an output artifact. Anything that goes wrong while
/// executing (a collaborator fault, malformed data, a missing template) is
/// returned as an error; the registry converts it into the command's
/// `JOB_FAILED` outcome. Services never touch the ledger.
pub trait CommandService: Send + Sync {
    /// Short service name, used in logs and thread names.
    fn name(&self) -> &str;

    /// Whether this service accepts commands with the given name.
    fn handles(&self, command: &str) -> bool;

    /// Execute an accepted command, producing the output artifact.
    fn execute(&self, request: &CommandRequest) -> anyhow::Result<String>;
}

/// Holds the set of active handler services and their bus subscriptions.
///
/// Services register once at startup. Dropping the registry unsubscribes
/// every service; in-flight worker threads still publish their terminal
/// event (the command runs to completion regardless of observation).
pub struct ServiceRegistry {
    bus: EventBus,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ServiceRegistry {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe a service to `COMMAND_RECEIVED`.
    ///
    /// Commands whose name the service does not handle are ignored without
    /// publishing anything. Matching commands are executed on a spawned
    /// worker thread which publishes exactly one terminal event carrying the
    /// command's id.
    pub fn register(&self, service: Arc<dyn CommandService>) {
        tracing::info!(service = service.name(), "registering handler service");

        let bus = self.bus.clone();
        let subscription = self.bus.subscribe(EventKind::CommandReceived, move |event| {
            let BusEvent::CommandReceived(request) = event else {
                return;
            };
            if !service.handles(&request.name) {
                return;
            }

            let service = Arc::clone(&service);
            let bus = bus.clone();
            let request = request.clone();
            let builder = thread::Builder::new().name(format!("svc-{}", service.name()));
            let spawned = builder.spawn(move || run_service(service, bus, request));
            if let Err(err) = spawned {
                tracing::error!(error = %err, "failed to spawn service worker thread");
            }
        });

        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription);
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.len())
            .finish()
    }
}

/// Run one accepted command to its terminal event.
fn run_service(service: Arc<dyn CommandService>, bus: EventBus, request: CommandRequest) {
    let id = request.id;
    tracing::info!(
        service = service.name(),
        command = %id,
        name = %request.name,
        project = %request.project_id,
        "executing command"
    );

    let outcome = catch_unwind(AssertUnwindSafe(|| service.execute(&request)));

    let event = match outcome {
        Ok(Ok(output)) => {
            tracing::info!(service = service.name(), command = %id, "command completed");
            BusEvent::JobCompleted { id, output }
        }
        Ok(Err(err)) => {
            let error = format!("{err:#}");
            tracing::warn!(
                service = service.name(),
                command = %id,
                error = %error,
                "command failed"
            );
            BusEvent::JobFailed { id, error }
        }
        Err(panic) => {
            let error = format!("handler crashed: {}", panic_message(panic.as_ref()));
            tracing::error!(service = service.name(), command = %id, error = %error, "command handler panicked");
            BusEvent::JobFailed { id, error }
        }
    };

    bus.publish(event);
}
