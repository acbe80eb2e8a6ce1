use recordkeep_core::config::DatabaseSettings;
use recordkeep_core::{
    AuditLog, AuditLogRepository, Item, ItemLogic, ItemRepository, RecordUnitOfWork, Repository,
    ServiceRegistry, Session, SqliteAuditLogRepository, SqliteItemRepository,
    SqliteSessionProvider, UnitOfWork, UnitOfWorkFactory, WiringError, CANCELLED_MESSAGE,
};
use std::rc::Rc;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

#[test]
fn same_capability_resolves_to_same_instance_within_scope() {
    let factory = memory_factory();
    let uow = factory.begin().unwrap();

    let first = uow.items();
    let second = uow.items();
    let generic = uow.repository::<SqliteItemRepository>();
    assert!(Rc::ptr_eq(&first, &second));
    assert!(Rc::ptr_eq(&first, &generic));
}

#[test]
fn unused_repositories_are_never_built() {
    let factory = memory_factory();
    let uow = factory.begin().unwrap();

    let logic = ItemLogic::new(&uow);
    assert!(logic.create_item(1, "one").is_success());
    assert!(uow.resolver().is_resolved::<SqliteItemRepository>());
    assert!(!uow.resolver().is_resolved::<SqliteAuditLogRepository>());
}

#[test]
fn distinct_scopes_never_share_instances_or_sessions() {
    let factory = memory_factory();
    let uow_a = factory.begin().unwrap();
    let uow_b = factory.begin().unwrap();

    let items_a = uow_a.items();
    let items_b = uow_b.items();
    assert!(!Rc::ptr_eq(&items_a, &items_b));
    assert!(!Rc::ptr_eq(items_a.session(), items_b.session()));
    assert_ne!(uow_a.session().scope_id(), uow_b.session().scope_id());
    assert!(Rc::ptr_eq(items_a.session(), uow_a.session()));
}

#[test]
fn missing_repository_provider_fails_at_construction() {
    let mut registry = ServiceRegistry::new();
    registry
        .register(|session: &Rc<Session>| SqliteItemRepository::new(Rc::clone(session)))
        .unwrap();

    let result = UnitOfWorkFactory::new(
        Arc::new(SqliteSessionProvider::new(DatabaseSettings::default())),
        registry,
    );
    match result {
        Err(WiringError::Unregistered { service }) => {
            assert!(service.contains("SqliteAuditLogRepository"));
        }
        Err(other) => panic!("unexpected wiring error: {other}"),
        Ok(_) => panic!("factory must reject incomplete wiring"),
    }
}

#[test]
fn dropping_scope_discards_writes_from_every_repository() {
    let dir = tempfile::tempdir().unwrap();
    let factory = file_factory(&dir);

    {
        let uow = factory.begin().unwrap();
        uow.items()
            .insert(&Item::create(1, "one").unwrap())
            .unwrap();
        uow.audit_logs()
            .insert(&AuditLog::create("/items", 201, "POST", None).unwrap())
            .unwrap();
        // Dropped without save_changes.
    }

    let check = factory.begin().unwrap();
    assert_eq!(check.items().count().unwrap(), 0);
    assert_eq!(check.audit_logs().count().unwrap(), 0);
}

#[test]
fn sequential_operations_in_one_scope_see_each_other() {
    let factory = memory_factory();
    let uow = factory.begin().unwrap();
    let items = uow.items();

    let stored = items.insert(&Item::create(3, "three").unwrap()).unwrap();
    assert_eq!(items.find_by_code(3).unwrap(), Some(stored));
    uow.save_changes().unwrap();
    assert_eq!(items.count().unwrap(), 1);
}

#[test]
fn scopes_do_not_observe_uncommitted_writes() {
    let dir = tempfile::tempdir().unwrap();
    let factory = file_factory(&dir);
    let uow_a = factory.begin().unwrap();
    let uow_b = factory.begin().unwrap();

    uow_a
        .items()
        .insert(&Item::create(10, "pending").unwrap())
        .unwrap();
    assert_eq!(uow_a.items().count().unwrap(), 1);
    assert_eq!(uow_b.items().count().unwrap(), 0);

    uow_a.save_changes().unwrap();
    assert_eq!(uow_b.items().count().unwrap(), 1);
}

#[test]
fn concurrent_scopes_on_separate_threads_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let factory = file_factory(&dir);
    let (written_tx, written_rx) = mpsc::channel::<()>();
    let (checked_tx, checked_rx) = mpsc::channel::<u64>();
    drop(factory.begin().unwrap());

    let factory = &factory;
    thread::scope(|scope| {
        scope.spawn(move || {
            let uow = factory.begin().unwrap();
            uow.items()
                .insert(&Item::create(1, "in flight").unwrap())
                .unwrap();
            written_tx.send(()).unwrap();
            let observed = checked_rx.recv().unwrap();
            assert_eq!(observed, 0);
            uow.save_changes().unwrap();
        });

        scope.spawn(move || {
            let uow = factory.begin().unwrap();
            written_rx.recv().unwrap();
            checked_tx.send(uow.items().count().unwrap()).unwrap();
        });
    });

    let uow = factory.begin().unwrap();
    assert_eq!(uow.items().count().unwrap(), 1);
}

#[test]
fn cancellation_rolls_back_pending_writes() {
    let dir = tempfile::tempdir().unwrap();
    let factory = file_factory(&dir);
    let uow = factory.begin().unwrap();
    uow.items()
        .insert(&Item::create(1, "doomed").unwrap())
        .unwrap();

    let handle = uow.cancel_handle();
    thread::spawn(move || handle.cancel()).join().unwrap();

    assert!(uow.is_cancelled());
    assert!(uow.save_changes().is_err());
    let result = ItemLogic::new(&uow).create_item(2, "also doomed");
    assert_eq!(result.error_message(), Some(CANCELLED_MESSAGE));
    drop(uow);

    let check = factory.begin().unwrap();
    assert_eq!(check.items().count().unwrap(), 0);
}

#[test]
fn cancelled_bulk_insert_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let factory = file_factory(&dir);
    let uow = factory.begin().unwrap();
    uow.cancel_handle().cancel();

    let result = ItemLogic::new(&uow)
        .bulk_insert_values(&[(1, "a".to_string()), (2, "b".to_string())]);
    assert_eq!(result.error_message(), Some(CANCELLED_MESSAGE));
    drop(uow);

    assert_eq!(factory.begin().unwrap().items().count().unwrap(), 0);
}

#[test]
fn factory_is_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<UnitOfWorkFactory>();

    let dir = tempfile::tempdir().unwrap();
    let factory = file_factory(&dir);
    drop(factory.begin().unwrap());
    thread::scope(|scope| {
        for code in 1..=4 {
            let factory = &factory;
            scope.spawn(move || {
                let uow = factory.begin().unwrap();
                let result = ItemLogic::new(&uow).create_item(code, "parallel");
                assert!(result.is_success(), "{:?}", result.error_message());
            });
        }
    });

    assert_eq!(factory.begin().unwrap().items().count().unwrap(), 4);
}

fn memory_factory() -> UnitOfWorkFactory {
    UnitOfWorkFactory::from_settings(&DatabaseSettings::default()).unwrap()
}

fn file_factory(dir: &tempfile::TempDir) -> UnitOfWorkFactory {
    let settings = DatabaseSettings {
        path: Some(dir.path().join("records.db")),
        ..DatabaseSettings::default()
    };
    UnitOfWorkFactory::from_settings(&settings).unwrap()
}
