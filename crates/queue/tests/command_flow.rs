//! Black-box tests of the assembled command pipeline: dispatcher, bus,
//! handler services, projector, and the polling client working together.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use perimeter_core::ProjectId;
use perimeter_events::{
    BusEvent, CommandRequest, CommandService, EventBus, EventKind, ServiceRegistry,
};
use perimeter_queue::{
    CommandDispatcher, CommandLedger, CommandStatus, CommandWatch, OpenScopes, ScopeDirectory,
    StatusProjector, WatchConfig, WatchOutcome,
};
use perimeter_report::model::{Domain, IpAsset, Port};
use perimeter_report::{InMemoryProjectStore, NO_DATA, ProjectSnapshot, ReportService};

/// Scope validation backed by the same store the report handler reads.
struct StoreScopes(Arc<InMemoryProjectStore>);

impl ScopeDirectory for StoreScopes {
    fn contains(&self, project_id: ProjectId) -> bool {
        self.0.contains(project_id)
    }
}

struct Kernel {
    bus: EventBus,
    ledger: Arc<CommandLedger>,
    dispatcher: CommandDispatcher,
    registry: ServiceRegistry,
    _projector: StatusProjector,
    store: Arc<InMemoryProjectStore>,
}

fn kernel_with_scopes(validate_scopes: bool) -> Kernel {
    perimeter_observability::init();

    let bus = EventBus::new();
    let ledger = Arc::new(CommandLedger::new());
    let store = InMemoryProjectStore::arc();

    let scopes: Arc<dyn ScopeDirectory> = if validate_scopes {
        Arc::new(StoreScopes(store.clone()))
    } else {
        Arc::new(OpenScopes)
    };

    let dispatcher = CommandDispatcher::new(ledger.clone(), bus.clone(), scopes);
    let projector = StatusProjector::attach(ledger.clone(), &bus);
    let registry = ServiceRegistry::new(bus.clone());
    registry.register(Arc::new(ReportService::new(store.clone())));

    Kernel {
        bus,
        ledger,
        dispatcher,
        registry,
        _projector: projector,
        store,
    }
}

fn kernel() -> Kernel {
    kernel_with_scopes(true)
}

fn seed_project(store: &InMemoryProjectStore, name: &str) -> ProjectId {
    let id = ProjectId::new();
    let mut snapshot = ProjectSnapshot::new(id, name);
    snapshot.domains = vec![
        Domain {
            address: "acme.example".to_string(),
            alias: Some("main".to_string()),
        },
        Domain {
            address: "shop.acme.example".to_string(),
            alias: None,
        },
    ];
    snapshot.ips = vec![IpAsset {
        address: "192.0.2.10".to_string(),
        ports: vec![Port {
            number: 443,
            protocol: Some("tcp".to_string()),
            service: Some("https".to_string()),
            version: None,
        }],
    }];
    store.insert(snapshot);
    id
}

fn settle(ledger: Arc<CommandLedger>, id: perimeter_core::CommandId) -> perimeter_queue::CommandRecord {
    let watch = CommandWatch::spawn(
        ledger,
        id,
        WatchConfig::default()
            .with_interval(Duration::from_millis(5))
            .with_max_polls(1000),
    );
    match watch.wait() {
        Some(WatchOutcome::Settled(record)) => record,
        other => panic!("command did not settle: {other:?}"),
    }
}

#[test]
fn report_command_completes_with_tables_and_no_data_markers() {
    let kernel = kernel();
    let project = seed_project(&kernel.store, "Acme Corp");

    let record = kernel
        .dispatcher
        .submit("report_generate", json!({}), project)
        .unwrap();

    let settled = settle(kernel.ledger.clone(), record.id);
    assert_eq!(settled.status, CommandStatus::Completed);
    assert!(settled.error.is_none());

    let output = settled.output.expect("completed command carries output");
    assert!(output.contains("# Surface Report: Acme Corp"));
    assert!(output.contains("| acme.example | main |"));
    assert!(output.contains("| shop.acme.example | - |"));
    // No incidents were seeded, so those sections render the marker.
    assert!(output.contains(NO_DATA));
}

#[test]
fn unknown_project_at_handler_time_fails_with_not_found() {
    // Scope validation is disabled so the unknown project reaches the
    // handler and fails there, through the event path.
    let kernel = kernel_with_scopes(false);

    let stranger = ProjectId::new();
    let record = kernel
        .dispatcher
        .submit("report_generate", json!({}), stranger)
        .unwrap();

    let settled = settle(kernel.ledger.clone(), record.id);
    assert_eq!(settled.status, CommandStatus::Failed);
    assert!(settled.output.is_none());
    assert!(settled.error.unwrap().contains("not found"));
}

#[test]
fn snapshot_is_pending_before_any_handler_runs() {
    // A service gated on a channel: the command cannot settle until the
    // test releases it.
    struct GatedService {
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl CommandService for GatedService {
        fn name(&self) -> &str {
            "gated"
        }

        fn handles(&self, command: &str) -> bool {
            command == "gated_work"
        }

        fn execute(&self, _request: &CommandRequest) -> anyhow::Result<String> {
            self.gate.lock().unwrap().recv()?;
            Ok("released".to_string())
        }
    }

    let kernel = kernel();
    let project = seed_project(&kernel.store, "Acme Corp");

    let (release, gate) = mpsc::channel();
    kernel.registry.register(Arc::new(GatedService {
        gate: Mutex::new(gate),
    }));

    let record = kernel
        .dispatcher
        .submit("gated_work", json!({}), project)
        .unwrap();

    // Submission returned while the handler is still blocked.
    let listed = kernel.ledger.commands_for_project(project);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, record.id);
    assert_eq!(listed[0].status, CommandStatus::Pending);
    assert!(listed[0].output.is_none());
    assert!(listed[0].error.is_none());

    release.send(()).unwrap();
    let settled = settle(kernel.ledger.clone(), record.id);
    assert_eq!(settled.status, CommandStatus::Completed);
    assert_eq!(settled.output.as_deref(), Some("released"));
}

#[test]
fn back_to_back_commands_settle_independently() {
    let kernel = kernel();
    let project = seed_project(&kernel.store, "Acme Corp");

    let first = kernel
        .dispatcher
        .submit("report_generate", json!({}), project)
        .unwrap();
    let second = kernel
        .dispatcher
        .submit("report_generate", json!({}), project)
        .unwrap();
    assert_ne!(first.id, second.id);

    let first_settled = settle(kernel.ledger.clone(), first.id);
    let second_settled = settle(kernel.ledger.clone(), second.id);
    assert!(first_settled.status.is_terminal());
    assert!(second_settled.status.is_terminal());

    let listed = kernel.ledger.commands_for_project(project);
    let ids: Vec<_> = listed.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[test]
fn each_submission_appears_exactly_once_in_the_listing() {
    let kernel = kernel();
    let project = seed_project(&kernel.store, "Acme Corp");

    let mut submitted = Vec::new();
    for _ in 0..5 {
        let record = kernel
            .dispatcher
            .submit("report_generate", json!({}), project)
            .unwrap();
        submitted.push(record.id);
    }

    for id in &submitted {
        settle(kernel.ledger.clone(), *id);
    }

    let listed = kernel.ledger.commands_for_project(project);
    for id in &submitted {
        assert_eq!(listed.iter().filter(|r| r.id == *id).count(), 1);
    }
}

#[test]
fn repeated_terminal_events_do_not_override_the_first() {
    let kernel = kernel();
    let project = seed_project(&kernel.store, "Acme Corp");

    let record = kernel
        .dispatcher
        .submit("report_generate", json!({}), project)
        .unwrap();
    let settled = settle(kernel.ledger.clone(), record.id);
    assert_eq!(settled.status, CommandStatus::Completed);

    // A retried handler publishing again must not change the entry.
    kernel.bus.publish(BusEvent::JobFailed {
        id: record.id,
        error: "late duplicate".to_string(),
    });

    let after = kernel.ledger.get(record.id).unwrap();
    assert_eq!(after.status, CommandStatus::Completed);
    assert_eq!(after.output, settled.output);
    assert!(after.error.is_none());
}

#[test]
fn handlers_observe_exactly_the_submitted_payload() {
    struct CapturingService {
        seen: Arc<Mutex<Vec<CommandRequest>>>,
    }

    impl CommandService for CapturingService {
        fn name(&self) -> &str {
            "capture"
        }

        fn handles(&self, command: &str) -> bool {
            command == "capture_payload"
        }

        fn execute(&self, request: &CommandRequest) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok("captured".to_string())
        }
    }

    let kernel = kernel();
    let project = seed_project(&kernel.store, "Acme Corp");

    let seen = Arc::new(Mutex::new(Vec::new()));
    kernel
        .registry
        .register(Arc::new(CapturingService { seen: seen.clone() }));

    let payload = json!({"sections": ["domains", "leaks"], "depth": 3});
    let record = kernel
        .dispatcher
        .submit("capture_payload", payload.clone(), project)
        .unwrap();
    settle(kernel.ledger.clone(), record.id);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, record.id);
    assert_eq!(seen[0].payload, payload);
    assert_eq!(seen[0].project_id, project);
}

#[test]
fn panicking_foreign_subscriber_does_not_stop_the_pipeline() {
    perimeter_observability::init();

    let bus = EventBus::new();
    let ledger = Arc::new(CommandLedger::new());
    let store = InMemoryProjectStore::arc();
    let project = seed_project(&store, "Acme Corp");

    // Subscribed ahead of the handler service: its panic must not prevent
    // delivery to the subscribers registered after it.
    let _chaos = bus.subscribe(EventKind::CommandReceived, |_| {
        panic!("misbehaving observer");
    });

    let dispatcher = CommandDispatcher::new(
        ledger.clone(),
        bus.clone(),
        Arc::new(StoreScopes(store.clone())),
    );
    let _projector = StatusProjector::attach(ledger.clone(), &bus);
    let registry = ServiceRegistry::new(bus.clone());
    registry.register(Arc::new(ReportService::new(store.clone())));

    let record = dispatcher
        .submit("report_generate", json!({}), project)
        .unwrap();

    let settled = settle(ledger.clone(), record.id);
    assert_eq!(settled.status, CommandStatus::Completed);
}

#[test]
fn abandoning_a_watch_does_not_stop_the_command() {
    let kernel = kernel();
    let project = seed_project(&kernel.store, "Acme Corp");

    let record = kernel
        .dispatcher
        .submit("report_generate", json!({}), project)
        .unwrap();

    let watch = CommandWatch::spawn(
        kernel.ledger.clone(),
        record.id,
        WatchConfig::default().with_interval(Duration::from_millis(5)),
    );
    watch.cancel();

    // The handler keeps running; a later poll still observes the outcome.
    let settled = settle(kernel.ledger.clone(), record.id);
    assert_eq!(settled.status, CommandStatus::Completed);
}
