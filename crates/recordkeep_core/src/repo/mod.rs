//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the entity-agnostic persistence contract (`Repository<E>`).
//! - Isolate SQLite query details from business orchestration.
//!
//! # Invariants
//! - Every repository is bound to exactly one `Session` for its lifetime.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

use crate::db::DbError;
use crate::model::{Entity, EntityId, ValidationError};
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod audit_log_repo;
pub mod item_repo;

const LIST_DEFAULT_LIMIT: u32 = 50;
const LIST_LIMIT_MAX: u32 = 500;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: EntityId },
    /// Uniqueness violation on a business key.
    Conflict(String),
    /// The owning scope was cancelled; the transaction has been abandoned.
    Cancelled,
    /// The owning Unit of Work has been disposed.
    SessionClosed,
    /// The entity type does not support the requested mutation.
    Immutable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "{message}"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::SessionClosed => write!(f, "session is closed"),
            Self::Immutable(entity) => write!(f, "{entity} records are immutable"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if value.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) {
            return Self::Cancelled;
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Pagination options shared by every `list` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Defaults to 50 and clamps to 500.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ListQuery {
    pub fn first(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }

    /// Effective row limit after defaulting and clamping.
    pub fn applied_limit(&self) -> u32 {
        match self.limit {
            Some(0) | None => LIST_DEFAULT_LIMIT,
            Some(value) if value > LIST_LIMIT_MAX => LIST_LIMIT_MAX,
            Some(value) => value,
        }
    }
}

/// Entity-agnostic persistence contract.
pub trait Repository<E: Entity> {
    /// Inserts a new entity and returns it with store-assigned fields set.
    fn insert(&self, entity: &E) -> RepoResult<E>;

    /// Inserts every entity in order, stopping at the first failure.
    ///
    /// Atomicity comes from the enclosing session transaction.
    fn insert_many(&self, entities: &[E]) -> RepoResult<Vec<E>> {
        entities.iter().map(|entity| self.insert(entity)).collect()
    }

    fn get(&self, id: EntityId) -> RepoResult<Option<E>>;

    fn list(&self, query: &ListQuery) -> RepoResult<Vec<E>>;

    /// Persists mutable fields of an already inserted entity.
    fn update(&self, entity: &E) -> RepoResult<E>;

    fn delete(&self, id: EntityId) -> RepoResult<()>;
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub(crate) fn parse_entity_id(value: &str, column: &str) -> RepoResult<EntityId> {
    uuid::Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn persisted_id<E: Entity>(entity: &E) -> RepoResult<EntityId> {
    entity.id().ok_or_else(|| {
        RepoError::InvalidData(format!("{} has not been persisted yet", E::NAME))
    })
}

#[cfg(test)]
mod tests {
    use super::{ListQuery, RepoError};
    use rusqlite::Connection;

    #[test]
    fn applied_limit_defaults_and_clamps() {
        assert_eq!(ListQuery::default().applied_limit(), 50);
        assert_eq!(ListQuery::first(0).applied_limit(), 50);
        assert_eq!(ListQuery::first(7).applied_limit(), 7);
        assert_eq!(ListQuery::first(10_000).applied_limit(), 500);
    }

    #[test]
    fn unique_violation_is_detected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k INTEGER UNIQUE); INSERT INTO t VALUES (1);")
            .unwrap();
        let err = conn.execute("INSERT INTO t VALUES (1);", []).unwrap_err();
        assert!(super::is_unique_violation(&err));
        assert!(matches!(RepoError::from(err), RepoError::Db(_)));
    }
}
