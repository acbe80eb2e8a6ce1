//! Item repository contract and SQLite implementation.
//!
//! # Invariants
//! - Writes go through the session writer so they join the scope transaction.
//! - Duplicate `code` values surface as `RepoError::Conflict`.
//! - Read paths reject invalid persisted rows instead of masking them.

use super::{
    is_unique_violation, parse_entity_id, persisted_id, ListQuery, RepoError, RepoResult,
    Repository,
};
use crate::model::item::Item;
use crate::model::EntityId;
use crate::uow::session::Session;
use rusqlite::{params, OptionalExtension, Row};
use std::rc::Rc;
use uuid::Uuid;

const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    code,
    value,
    created_at,
    updated_at
FROM items";

/// Item persistence operations beyond the generic contract.
pub trait ItemRepository: Repository<Item> {
    fn find_by_code(&self, code: i64) -> RepoResult<Option<Item>>;
    fn count(&self) -> RepoResult<u64>;
}

/// SQLite-backed item repository bound to one session.
pub struct SqliteItemRepository {
    session: Rc<Session>,
}

impl SqliteItemRepository {
    pub fn new(session: Rc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }
}

impl Repository<Item> for SqliteItemRepository {
    fn insert(&self, entity: &Item) -> RepoResult<Item> {
        let conn = self.session.writer()?;
        let id = Uuid::new_v4();
        let stamps = conn.query_row(
            "INSERT INTO items (uuid, code, value)
             VALUES (?1, ?2, ?3)
             RETURNING created_at, updated_at;",
            params![id.to_string(), entity.code(), entity.value()],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        );

        match stamps {
            Ok((created_at, updated_at)) => Ok(Item::from_storage(
                id,
                entity.code(),
                entity.value().to_string(),
                created_at,
                updated_at,
            )?),
            Err(err) if is_unique_violation(&err) => Err(duplicate_code(entity.code())),
            Err(err) => Err(err.into()),
        }
    }

    fn get(&self, id: EntityId) -> RepoResult<Option<Item>> {
        let conn = self.session.reader()?;
        let mut stmt = conn.prepare(&format!("{ITEM_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_item_row(row)?)),
            None => Ok(None),
        }
    }

    fn list(&self, query: &ListQuery) -> RepoResult<Vec<Item>> {
        let conn = self.session.reader()?;
        let mut stmt = conn.prepare(&format!(
            "{ITEM_SELECT_SQL} ORDER BY code ASC LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![
            i64::from(query.applied_limit()),
            i64::from(query.offset)
        ])?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn update(&self, entity: &Item) -> RepoResult<Item> {
        let id = persisted_id(entity)?;
        let conn = self.session.writer()?;
        let updated = conn
            .query_row(
                "UPDATE items
                 SET
                    code = ?2,
                    value = ?3,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1
                 RETURNING uuid, code, value, created_at, updated_at;",
                params![id.to_string(), entity.code(), entity.value()],
                |row| {
                    Ok((
                        row.get::<_, String>("uuid")?,
                        row.get::<_, i64>("code")?,
                        row.get::<_, String>("value")?,
                        row.get::<_, i64>("created_at")?,
                        row.get::<_, i64>("updated_at")?,
                    ))
                },
            )
            .optional();

        match updated {
            Ok(Some((uuid, code, value, created_at, updated_at))) => Ok(Item::from_storage(
                parse_entity_id(&uuid, "items.uuid")?,
                code,
                value,
                created_at,
                updated_at,
            )?),
            Ok(None) => Err(RepoError::NotFound {
                entity: "item",
                id,
            }),
            Err(err) if is_unique_violation(&err) => Err(duplicate_code(entity.code())),
            Err(err) => Err(err.into()),
        }
    }

    fn delete(&self, id: EntityId) -> RepoResult<()> {
        let changed = self
            .session
            .writer()?
            .execute("DELETE FROM items WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "item",
                id,
            });
        }
        Ok(())
    }
}

impl ItemRepository for SqliteItemRepository {
    fn find_by_code(&self, code: i64) -> RepoResult<Option<Item>> {
        let conn = self.session.reader()?;
        let mut stmt = conn.prepare(&format!("{ITEM_SELECT_SQL} WHERE code = ?1;"))?;
        let mut rows = stmt.query([code])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_item_row(row)?)),
            None => Ok(None),
        }
    }

    fn count(&self) -> RepoResult<u64> {
        let count: i64 =
            self.session
                .reader()?
                .query_row("SELECT COUNT(*) FROM items;", [], |row| row.get(0))?;
        u64::try_from(count).map_err(|_| RepoError::InvalidData(format!("negative count {count}")))
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_entity_id(&uuid_text, "items.uuid")?;
    let item = Item::from_storage(
        id,
        row.get("code")?,
        row.get("value")?,
        row.get("created_at")?,
        row.get("updated_at")?,
    )
    .map_err(|err| RepoError::InvalidData(format!("items row {uuid_text}: {err}")))?;
    Ok(item)
}

fn duplicate_code(code: i64) -> RepoError {
    RepoError::Conflict(format!("An item with code {code} already exists."))
}
