//! Object-mapping collaborator between entities and DTOs.
//!
//! Business logic only calls `Mapper::map` with typed pairs; field-level
//! translation lives in the DTO `From` impls.

use crate::model::audit_log::AuditLog;
use crate::model::item::Item;
use crate::model::{Entity, EntityId};
use serde::{Deserialize, Serialize};

/// Maps a source shape into a destination shape.
pub trait Mapper<S, D> {
    fn map(&self, source: &S) -> D;
}

/// Mapper backed by `From<&S>` implementations.
#[derive(Debug, Clone, Copy, Default)]
pub struct FromMapper;

impl<S, D> Mapper<S, D> for FromMapper
where
    D: for<'a> From<&'a S>,
{
    fn map(&self, source: &S) -> D {
        D::from(source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDto {
    pub id: Option<EntityId>,
    pub code: i64,
    pub value: String,
}

impl From<&Item> for ItemDto {
    fn from(value: &Item) -> Self {
        Self {
            id: value.id(),
            code: value.code(),
            value: value.value().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogDto {
    pub id: Option<EntityId>,
    pub request_uri: String,
    pub status_code: i32,
    pub method: String,
    pub ip_address: Option<String>,
    pub created_at: Option<i64>,
}

impl From<&AuditLog> for AuditLogDto {
    fn from(value: &AuditLog) -> Self {
        Self {
            id: value.id(),
            request_uri: value.request_uri().to_string(),
            status_code: value.status_code(),
            method: value.method().to_string(),
            ip_address: value.ip_address().map(str::to_string),
            created_at: value.created_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FromMapper, ItemDto, Mapper};
    use crate::model::item::Item;

    #[test]
    fn from_mapper_uses_dto_conversion() {
        let item = Item::create(3, "three").unwrap();
        let dto: ItemDto = FromMapper.map(&item);
        assert_eq!(dto.code, 3);
        assert_eq!(dto.value, "three");
        assert!(dto.id.is_none());
    }
}
