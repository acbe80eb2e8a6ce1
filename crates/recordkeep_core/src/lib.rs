//! Core data-access and orchestration for recordkeep.
//!
//! Entities share one CRUD lifecycle (`service::crud::CrudLogic`), one
//! transactional boundary (`uow::UnitOfWork`) and one result envelope
//! (`result::DataResult` / `result::ActionResult`).

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod result;
pub mod service;
pub mod uow;

pub use config::{AuditFailurePolicy, ConfigError, Settings};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::audit_log::AuditLog;
pub use model::item::Item;
pub use model::{Entity, EntityId, ValidationError};
pub use repo::audit_log_repo::{AuditLogRepository, SqliteAuditLogRepository};
pub use repo::item_repo::{ItemRepository, SqliteItemRepository};
pub use repo::{ListQuery, RepoError, RepoResult, Repository};
pub use result::{ActionResult, DataResult};
pub use service::audit_log_logic::{AuditLogLogic, RequestContext, RequestContextAccessor};
pub use service::crud::CrudLogic;
pub use service::item_logic::ItemLogic;
pub use service::mapping::{AuditLogDto, FromMapper, ItemDto, Mapper};
pub use service::{BusinessError, CANCELLED_MESSAGE, GENERIC_FAILURE_MESSAGE};
pub use uow::{
    CancelHandle, LazyResolver, RecordUnitOfWork, ServiceRegistry, Session, SessionProvider,
    SqliteSessionProvider, SqliteUnitOfWork, UnitOfWork, UnitOfWorkFactory, WiringError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
