//! Unit of Work: one store session per logical operation scope.
//!
//! # Responsibility
//! - Own the scope's session and the lazy resolver bound to it.
//! - Expose repositories as scope-bound capabilities.
//! - Commit or roll back everything written through those repositories.
//!
//! # Invariants
//! - Every repository resolved through one Unit of Work shares its session.
//! - Units of Work are `!Send`; one scope never crosses threads.
//! - Dropping a Unit of Work rolls back pending writes, clears the resolver
//!   cache and closes the session.

use crate::config::DatabaseSettings;
use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::repo::audit_log_repo::{AuditLogRepository, SqliteAuditLogRepository};
use crate::repo::item_repo::{ItemRepository, SqliteItemRepository};
use crate::repo::RepoResult;
use log::{debug, info};
use rusqlite::Connection;
use std::any::Any;
use std::rc::Rc;
use std::sync::Arc;

pub mod resolver;
pub mod session;

pub use resolver::{LazyResolver, ServiceRegistry, WiringError};
pub use session::{CancelHandle, Session};

/// Transactional scope contract consumed by business logic.
pub trait UnitOfWork {
    fn resolver(&self) -> &LazyResolver;

    /// Commits every write made through this scope so far.
    fn save_changes(&self) -> RepoResult<()>;

    /// Discards every uncommitted write made through this scope.
    fn rollback(&self) -> RepoResult<()>;

    fn is_cancelled(&self) -> bool;

    fn cancel_handle(&self) -> CancelHandle;

    /// Resolves a scope-bound repository (or any registered service).
    fn repository<R: Any>(&self) -> Rc<R>
    where
        Self: Sized,
    {
        self.resolver().get::<R>()
    }
}

/// Interface-level repository properties of the record store.
pub trait RecordUnitOfWork: UnitOfWork {
    type Items: ItemRepository + 'static;
    type AuditLogs: AuditLogRepository + 'static;

    fn items(&self) -> Rc<Self::Items>;
    fn audit_logs(&self) -> Rc<Self::AuditLogs>;
}

/// SQLite-backed Unit of Work.
pub struct SqliteUnitOfWork {
    session: Rc<Session>,
    resolver: LazyResolver,
}

impl SqliteUnitOfWork {
    /// Wraps a connection that is already migrated.
    pub fn new(conn: Connection, registry: Arc<ServiceRegistry>) -> Self {
        let session = Rc::new(Session::new(conn));
        debug!(
            "event=uow_open module=uow status=ok scope={}",
            session.scope_id()
        );
        Self {
            resolver: LazyResolver::new(Rc::clone(&session), registry),
            session,
        }
    }

    /// Registry populated with every repository this Unit of Work exposes.
    pub fn default_registry() -> Result<ServiceRegistry, WiringError> {
        let mut registry = ServiceRegistry::new();
        registry.register(|session: &Rc<Session>| SqliteItemRepository::new(Rc::clone(session)))?;
        registry.register(|session: &Rc<Session>| {
            SqliteAuditLogRepository::new(Rc::clone(session))
        })?;
        Ok(registry)
    }

    /// Fails when a repository property would have no provider.
    pub fn verify_wiring(registry: &ServiceRegistry) -> Result<(), WiringError> {
        registry.require::<SqliteItemRepository>()?;
        registry.require::<SqliteAuditLogRepository>()?;
        Ok(())
    }

    /// Internally typed view of the session for specialized access.
    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }
}

impl UnitOfWork for SqliteUnitOfWork {
    fn resolver(&self) -> &LazyResolver {
        &self.resolver
    }

    fn save_changes(&self) -> RepoResult<()> {
        self.session.commit()
    }

    fn rollback(&self) -> RepoResult<()> {
        self.session.rollback()
    }

    fn is_cancelled(&self) -> bool {
        self.session.is_cancelled()
    }

    fn cancel_handle(&self) -> CancelHandle {
        self.session.cancel_handle()
    }
}

impl RecordUnitOfWork for SqliteUnitOfWork {
    type Items = SqliteItemRepository;
    type AuditLogs = SqliteAuditLogRepository;

    fn items(&self) -> Rc<SqliteItemRepository> {
        self.resolver.get::<SqliteItemRepository>()
    }

    fn audit_logs(&self) -> Rc<SqliteAuditLogRepository> {
        self.resolver.get::<SqliteAuditLogRepository>()
    }
}

impl Drop for SqliteUnitOfWork {
    fn drop(&mut self) {
        self.resolver.clear();
        self.session.close();
        debug!(
            "event=uow_close module=uow status=ok scope={}",
            self.session.scope_id()
        );
    }
}

/// Supplies one fresh, migrated connection per Unit of Work.
pub trait SessionProvider: Send + Sync {
    fn open_session(&self) -> DbResult<Connection>;
}

/// Opens sessions from `[database]` settings.
///
/// Without a configured path every session gets its own private in-memory
/// database, so only file-backed stores share data across scopes.
#[derive(Debug, Clone)]
pub struct SqliteSessionProvider {
    settings: DatabaseSettings,
}

impl SqliteSessionProvider {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }
}

impl SessionProvider for SqliteSessionProvider {
    fn open_session(&self) -> DbResult<Connection> {
        match self.settings.path.as_ref() {
            Some(path) => open_db(path, &self.settings),
            None => open_db_in_memory(&self.settings),
        }
    }
}

/// Creates one Unit of Work per request scope.
///
/// Shareable across threads; each `begin` hands out an independent scope.
pub struct UnitOfWorkFactory {
    provider: Arc<dyn SessionProvider>,
    registry: Arc<ServiceRegistry>,
}

impl UnitOfWorkFactory {
    /// Validates wiring up front so a missing provider fails at startup.
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        registry: ServiceRegistry,
    ) -> Result<Self, WiringError> {
        SqliteUnitOfWork::verify_wiring(&registry)?;
        info!(
            "event=uow_factory_init module=uow status=ok services={} names={}",
            registry.len(),
            registry.service_names().join(",")
        );
        Ok(Self {
            provider,
            registry: Arc::new(registry),
        })
    }

    /// Factory over SQLite sessions with the default repository set.
    pub fn from_settings(settings: &DatabaseSettings) -> Result<Self, WiringError> {
        Self::new(
            Arc::new(SqliteSessionProvider::new(settings.clone())),
            SqliteUnitOfWork::default_registry()?,
        )
    }

    /// Opens a new scope with its own session.
    pub fn begin(&self) -> DbResult<SqliteUnitOfWork> {
        let conn = self.provider.open_session()?;
        Ok(SqliteUnitOfWork::new(conn, Arc::clone(&self.registry)))
    }
}

#[cfg(test)]
mod tests {
    use super::{RecordUnitOfWork, SqliteUnitOfWork, UnitOfWork, UnitOfWorkFactory};
    use crate::config::DatabaseSettings;
    use crate::model::item::Item;
    use crate::repo::item_repo::SqliteItemRepository;
    use crate::repo::Repository;
    use std::rc::Rc;

    fn factory() -> UnitOfWorkFactory {
        UnitOfWorkFactory::from_settings(&DatabaseSettings::default()).unwrap()
    }

    #[test]
    fn repositories_are_lazy_and_share_the_session() {
        let uow = factory().begin().unwrap();
        assert!(uow.resolver().is_empty());

        let items = uow.items();
        let audit_logs = uow.audit_logs();
        assert_eq!(uow.resolver().len(), 2);
        assert!(Rc::ptr_eq(items.session(), uow.session()));
        assert!(Rc::ptr_eq(audit_logs.session(), uow.session()));
        assert!(Rc::ptr_eq(&items, &uow.repository::<SqliteItemRepository>()));
    }

    #[test]
    fn drop_rolls_back_and_closes_the_session() {
        let uow = factory().begin().unwrap();
        let items = uow.items();
        items.insert(&Item::create(1, "one").unwrap()).unwrap();
        let session = Rc::clone(uow.session());
        assert!(session.in_transaction());

        drop(uow);
        assert!(session.is_closed());
        assert!(!session.in_transaction());
        assert!(items.list(&Default::default()).is_err());
    }

    #[test]
    fn default_registry_passes_wiring_check() {
        let registry = SqliteUnitOfWork::default_registry().unwrap();
        SqliteUnitOfWork::verify_wiring(&registry).unwrap();
        assert_eq!(registry.len(), 2);

        let names = registry.service_names();
        assert!(names[0].ends_with("SqliteAuditLogRepository"));
        assert!(names[1].ends_with("SqliteItemRepository"));
    }
}
