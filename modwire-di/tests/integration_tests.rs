//! Integration tests for the provider container

use modwire_di::prelude::*;
use modwire_di::LinkOrigin;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Test services
struct Logger {
    name: String,
}

impl Logger {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

struct Database {
    connection_string: String,
    logger: Arc<Logger>,
}

struct UserService {
    database: Arc<Database>,
    call_count: AtomicUsize,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        format!("User {} via {}", id, self.database.logger.name)
    }
}

fn url_token() -> ProviderToken {
    ProviderToken::named("DATABASE_URL")
}

fn app_container() -> Arc<Container> {
    ContainerBuilder::new("AppModule")
        .register(ProviderDefinition::class(|_| Ok(Logger::new("app"))))
        .register_value(url_token(), "postgres://localhost/test".to_string())
        .register(
            ProviderDefinition::class(|deps| {
                Ok(Database {
                    connection_string: deps.get::<String>(&url_token())?.to_string(),
                    logger: deps.get_type::<Logger>()?,
                })
            })
            .inject(url_token())
            .inject(ProviderToken::of::<Logger>()),
        )
        .register(
            ProviderDefinition::class(|deps| {
                Ok(UserService {
                    database: deps.get_type::<Database>()?,
                    call_count: AtomicUsize::new(0),
                })
            })
            .inject(ProviderToken::of::<Database>()),
        )
        .build()
        .unwrap()
}

#[test]
fn test_dependency_injection() {
    init_tracing();
    let container = app_container();

    let users = container.get_type::<UserService>().unwrap();
    assert_eq!(users.get_user(123), "User 123 via app");
    assert_eq!(users.call_count.load(Ordering::Relaxed), 1);
    assert_eq!(
        users.database.connection_string,
        "postgres://localhost/test"
    );
    assert_eq!(container.instantiated(), 4);
}

#[test]
fn test_singleton_constructed_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();

    let container = ContainerBuilder::new("Singletons")
        .register(ProviderDefinition::class(move |_| {
            let count = counter_clone.fetch_add(1, Ordering::Relaxed);
            Ok(Logger::new(&format!("logger-{}", count)))
        }))
        .build()
        .unwrap();

    let first = container.get_type::<Logger>().unwrap();
    let second = container.get_type::<Logger>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name, "logger-0");
    assert_eq!(counter.load(Ordering::Relaxed), 1);
}

#[test]
fn test_transient_registration() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();

    let container = ContainerBuilder::new("Transients")
        .register(
            ProviderDefinition::class(move |_| {
                let count = counter_clone.fetch_add(1, Ordering::Relaxed);
                Ok(Logger::new(&format!("logger-{}", count)))
            })
            .transient(),
        )
        .build()
        .unwrap();

    let first = container.get_type::<Logger>().unwrap();
    let second = container.get_type::<Logger>().unwrap();

    assert_eq!(first.name, "logger-0");
    assert_eq!(second.name, "logger-1");
    assert_eq!(container.instantiated(), 0);
}

#[test]
fn test_concurrent_resolution_constructs_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();

    let container = ContainerBuilder::new("Concurrent")
        .register(ProviderDefinition::class(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            Ok(Logger::new("shared"))
        }))
        .build()
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let container = container.clone();
            std::thread::spawn(move || container.get_type::<Logger>().unwrap())
        })
        .collect();

    let loggers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(loggers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn test_unresolved_token() {
    let container = ContainerBuilder::new("Empty").build().unwrap();

    let result = container.get_type::<Logger>();
    match result {
        Err(DiError::UnresolvedToken { token, container }) => {
            assert_eq!(token, ProviderToken::of::<Logger>());
            assert_eq!(container, "Empty");
        }
        _ => panic!("Expected UnresolvedToken error"),
    }
}

#[test]
fn test_missing_dependency_is_unresolved() {
    let container = ContainerBuilder::new("Broken")
        .register(
            ProviderDefinition::factory("service", |deps| {
                Ok(deps.get::<String>(&"missing".into())?.len())
            })
            .inject("missing"),
        )
        .build()
        .unwrap();

    let err = container.resolve(&"service".into()).err().unwrap();
    assert!(err.is_unresolved());
}

#[test]
fn test_circular_dependency_names_cycle() {
    let container = ContainerBuilder::new("Cyclic")
        .register(ProviderDefinition::factory("A", |_| Ok(1u8)).inject("B"))
        .register(ProviderDefinition::factory("B", |_| Ok(2u8)).inject("A"))
        .build()
        .unwrap();

    match container.resolve(&"A".into()) {
        Err(DiError::CircularDependency { path }) => {
            assert_eq!(path, vec!["\"A\"", "\"B\"", "\"A\""]);
        }
        other => panic!("Expected CircularDependency, got {:?}", other.err()),
    }

    // Nothing on the failed chain was cached
    assert_eq!(container.instantiated(), 0);
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let container = ContainerBuilder::new("SelfRef")
        .register(ProviderDefinition::factory("loop", |_| Ok(())).inject("loop"))
        .build()
        .unwrap();

    let err = container.resolve(&"loop".into()).err().unwrap();
    assert_eq!(
        err.to_string(),
        "Circular dependency detected: \"loop\" -> \"loop\""
    );
}

#[test]
fn test_cycle_across_linked_containers() {
    let upstream = ContainerBuilder::new("Upstream")
        .register(ProviderDefinition::factory("up", |_| Ok(1u8)).inject("down"))
        .build()
        .unwrap();
    let downstream = ContainerBuilder::new("Downstream")
        .register(ProviderDefinition::factory("down", |_| Ok(2u8)).inject("up"))
        .build()
        .unwrap();

    downstream.link("up".into(), &upstream, LinkOrigin::Import);
    upstream.link("down".into(), &downstream, LinkOrigin::Global);

    let err = downstream.resolve(&"down".into()).err().unwrap();
    assert!(matches!(err, DiError::CircularDependency { .. }));
}

#[test]
fn test_concurrent_cycle_reports_instead_of_blocking() {
    init_tracing();
    let slow = || {
        std::thread::sleep(Duration::from_millis(100));
        Ok::<_, anyhow::Error>(0u8)
    };

    let container = ContainerBuilder::new("Racing")
        .register(ProviderDefinition::factory("slowA", move |_| slow()))
        .register(ProviderDefinition::factory("slowB", move |_| slow()))
        .register(
            ProviderDefinition::factory("A", |_| Ok(1u8))
                .inject("slowA")
                .inject("B"),
        )
        .register(
            ProviderDefinition::factory("B", |_| Ok(2u8))
                .inject("slowB")
                .inject("A"),
        )
        .build()
        .unwrap();

    let (tx, rx) = mpsc::channel();
    for name in ["A", "B"] {
        let container = container.clone();
        let tx = tx.clone();
        std::thread::spawn(move || {
            let _ = tx.send(container.resolve(&name.into()));
        });
    }
    drop(tx);

    for _ in 0..2 {
        let result = rx
            .recv_timeout(Duration::from_secs(3))
            .expect("resolution blocked on a concurrent cycle");
        assert!(matches!(result, Err(DiError::CircularDependency { .. })));
    }
    assert_eq!(container.instantiated(), 2);
}

#[test]
fn test_dispose_during_construction_runs_teardown() {
    let gate = Arc::new(Barrier::new(2));
    let log = Arc::new(Mutex::new(Vec::new()));

    let constructor_gate = gate.clone();
    let teardown_log = log.clone();
    let container = ContainerBuilder::new("Closing")
        .register(
            ProviderDefinition::factory("pool", move |_| {
                constructor_gate.wait();
                constructor_gate.wait();
                Ok(Logger::new("pool"))
            })
            .on_destroy(move |logger: &Logger| {
                teardown_log.lock().push(logger.name.clone());
                Ok(())
            }),
        )
        .build()
        .unwrap();

    let resolving = container.clone();
    let handle = std::thread::spawn(move || resolving.resolve(&"pool".into()));

    // Constructor has started; dispose before it finishes
    gate.wait();
    let report = container.dispose().unwrap();
    assert!(report.released.is_empty());
    gate.wait();

    let result = handle.join().unwrap();
    assert!(matches!(result, Err(DiError::Disposed { .. })));
    assert_eq!(*log.lock(), vec!["pool"]);
}

#[test]
fn test_duplicate_provider_rejected() {
    let result = ContainerBuilder::new("Dupes")
        .register_value("port", 80u16)
        .register_value("port", 443u16)
        .build();

    assert!(matches!(result, Err(DiError::DuplicateProvider { .. })));
}

#[test]
fn test_existing_alias_shares_instance() {
    let container = ContainerBuilder::new("Aliases")
        .register(ProviderDefinition::class(|_| Ok(Logger::new("aliased"))))
        .register(ProviderDefinition::existing("LOGGER", ProviderToken::of::<Logger>()))
        .build()
        .unwrap();

    let by_alias = container.get::<Logger>(&"LOGGER".into()).unwrap();
    let by_type = container.get_type::<Logger>().unwrap();
    assert!(Arc::ptr_eq(&by_alias, &by_type));
}

#[test]
fn test_optional_dependency_absent() {
    let container = ContainerBuilder::new("Optional")
        .register(
            ProviderDefinition::factory("greeting", |deps| {
                let name = deps.optional::<String>(&"name".into())?;
                Ok(format!(
                    "hello {}",
                    name.as_deref().map(String::as_str).unwrap_or("world")
                ))
            })
            .inject_optional("name"),
        )
        .build()
        .unwrap();

    let greeting = container.get::<String>(&"greeting".into()).unwrap();
    assert_eq!(greeting.as_str(), "hello world");
}

#[test]
fn test_type_mismatch() {
    let container = ContainerBuilder::new("Typed")
        .register_value("port", 8080u16)
        .build()
        .unwrap();

    let err = container.get::<String>(&"port".into()).unwrap_err();
    assert!(matches!(err, DiError::TypeMismatch { .. }));
}

#[derive(Debug)]
struct Pool {
    healthy: bool,
}

impl Lifecycle for Pool {
    fn on_module_init(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.healthy, "pool failed health check");
        Ok(())
    }
}

#[test]
fn test_init_hook_failure_fails_resolution() {
    let container = ContainerBuilder::new("Hooks")
        .register(ProviderDefinition::class(|_| Ok(Pool { healthy: false })).with_lifecycle::<Pool>())
        .build()
        .unwrap();

    let err = container.get_type::<Pool>().unwrap_err();
    match err {
        DiError::ProviderConstruction { source, .. } => {
            assert_eq!(source.to_string(), "pool failed health check");
        }
        other => panic!("Expected ProviderConstruction, got {:?}", other),
    }
}

fn recording_provider(
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
) -> ProviderDefinition {
    ProviderDefinition::value(name, name).on_destroy(move |_: &&'static str| {
        log.lock().push(name);
        if fail {
            anyhow::bail!("{} refused to close", name);
        }
        Ok(())
    })
}

#[test]
fn test_dispose_reverse_order_collects_failures() {
    init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));

    let container = ContainerBuilder::new("Teardown")
        .register(recording_provider("first", log.clone(), false))
        .register(recording_provider("second", log.clone(), true))
        .register(recording_provider("third", log.clone(), false))
        .build()
        .unwrap();

    for name in ["first", "second", "third"] {
        container.resolve(&name.into()).unwrap();
    }

    let err = container.dispose().unwrap_err();

    assert_eq!(*log.lock(), vec!["third", "second", "first"]);
    assert_eq!(
        err.released,
        vec![ProviderToken::named("third"), ProviderToken::named("first")]
    );
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].token, ProviderToken::named("second"));
    assert_eq!(err.container, "Teardown");
}

#[test]
fn test_dispose_only_touches_instantiated() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let container = ContainerBuilder::new("Lazy")
        .register(recording_provider("used", log.clone(), false))
        .register(recording_provider("unused", log.clone(), false))
        .build()
        .unwrap();

    container.resolve(&"used".into()).unwrap();
    let report = container.dispose().unwrap();

    assert_eq!(report.released, vec![ProviderToken::named("used")]);
    assert_eq!(*log.lock(), vec!["used"]);

    // Second dispose is a no-op and resolution is rejected
    assert!(container.dispose().unwrap().released.is_empty());
    assert!(matches!(
        container.resolve(&"used".into()),
        Err(DiError::Disposed { .. })
    ));
}
