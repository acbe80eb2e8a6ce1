//! Audit log repository contract and SQLite implementation.
//!
//! # Invariants
//! - Audit rows are append-only: `update` and `delete` always fail with
//!   `RepoError::Immutable`; retention is handled outside this crate.
//! - Listing is newest first.

use super::{parse_entity_id, ListQuery, RepoError, RepoResult, Repository};
use crate::model::audit_log::AuditLog;
use crate::model::EntityId;
use crate::uow::session::Session;
use rusqlite::{params, Row};
use std::rc::Rc;
use uuid::Uuid;

const AUDIT_SELECT_SQL: &str = "SELECT
    uuid,
    request_uri,
    status_code,
    method,
    ip_address,
    created_at
FROM audit_logs";

/// Audit log persistence operations beyond the generic contract.
pub trait AuditLogRepository: Repository<AuditLog> {
    fn count(&self) -> RepoResult<u64>;
}

/// SQLite-backed audit log repository bound to one session.
pub struct SqliteAuditLogRepository {
    session: Rc<Session>,
}

impl SqliteAuditLogRepository {
    pub fn new(session: Rc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }
}

impl Repository<AuditLog> for SqliteAuditLogRepository {
    fn insert(&self, entity: &AuditLog) -> RepoResult<AuditLog> {
        let id = Uuid::new_v4();
        let created_at: i64 = self.session.writer()?.query_row(
            "INSERT INTO audit_logs (uuid, request_uri, status_code, method, ip_address)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING created_at;",
            params![
                id.to_string(),
                entity.request_uri(),
                entity.status_code(),
                entity.method(),
                entity.ip_address(),
            ],
            |row| row.get(0),
        )?;

        Ok(AuditLog::from_storage(
            id,
            entity.request_uri().to_string(),
            entity.status_code(),
            entity.method().to_string(),
            entity.ip_address().map(str::to_string),
            created_at,
        ))
    }

    fn get(&self, id: EntityId) -> RepoResult<Option<AuditLog>> {
        let conn = self.session.reader()?;
        let mut stmt = conn.prepare(&format!("{AUDIT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_audit_row(row)?)),
            None => Ok(None),
        }
    }

    fn list(&self, query: &ListQuery) -> RepoResult<Vec<AuditLog>> {
        let conn = self.session.reader()?;
        let mut stmt = conn.prepare(&format!(
            "{AUDIT_SELECT_SQL} ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![
            i64::from(query.applied_limit()),
            i64::from(query.offset)
        ])?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_audit_row(row)?);
        }
        Ok(entries)
    }

    fn update(&self, _entity: &AuditLog) -> RepoResult<AuditLog> {
        Err(RepoError::Immutable("audit log"))
    }

    fn delete(&self, _id: EntityId) -> RepoResult<()> {
        Err(RepoError::Immutable("audit log"))
    }
}

impl AuditLogRepository for SqliteAuditLogRepository {
    fn count(&self) -> RepoResult<u64> {
        let count: i64 = self.session.reader()?.query_row(
            "SELECT COUNT(*) FROM audit_logs;",
            [],
            |row| row.get(0),
        )?;
        u64::try_from(count).map_err(|_| RepoError::InvalidData(format!("negative count {count}")))
    }
}

fn parse_audit_row(row: &Row<'_>) -> RepoResult<AuditLog> {
    let uuid_text: String = row.get("uuid")?;
    Ok(AuditLog::from_storage(
        parse_entity_id(&uuid_text, "audit_logs.uuid")?,
        row.get("request_uri")?,
        row.get("status_code")?,
        row.get("method")?,
        row.get("ip_address")?,
        row.get("created_at")?,
    ))
}
