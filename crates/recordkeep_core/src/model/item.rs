//! Item domain model.
//!
//! # Invariants
//! - `code` is the business key: strictly positive and unique in storage.
//! - `value` is non-blank and at most `ITEM_VALUE_MAX_CHARS` characters.

use super::{Entity, EntityId, ValidationError};
use serde::{Deserialize, Serialize};

pub const ITEM_VALUE_MAX_CHARS: usize = 256;

/// Keyed value record supporting single and bulk insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: Option<EntityId>,
    code: i64,
    value: String,
    created_at: Option<i64>,
    updated_at: Option<i64>,
}

impl Item {
    /// Builds a new, not yet persisted item.
    ///
    /// # Errors
    /// - `code` is zero or negative.
    /// - `value` is blank or longer than `ITEM_VALUE_MAX_CHARS`.
    pub fn create(code: i64, value: impl Into<String>) -> Result<Self, ValidationError> {
        validate_code(code)?;
        let value = normalize_value(value.into())?;
        Ok(Self {
            id: None,
            code,
            value,
            created_at: None,
            updated_at: None,
        })
    }

    /// Rehydrates a stored row. Used by repositories only.
    pub(crate) fn from_storage(
        id: EntityId,
        code: i64,
        value: String,
        created_at: i64,
        updated_at: i64,
    ) -> Result<Self, ValidationError> {
        validate_code(code)?;
        let value = normalize_value(value)?;
        Ok(Self {
            id: Some(id),
            code,
            value,
            created_at: Some(created_at),
            updated_at: Some(updated_at),
        })
    }

    /// Replaces the item's value, keeping its business key.
    pub fn rename_value(&mut self, value: impl Into<String>) -> Result<(), ValidationError> {
        self.value = normalize_value(value.into())?;
        Ok(())
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Epoch milliseconds; set once persisted.
    pub fn created_at(&self) -> Option<i64> {
        self.created_at
    }

    /// Epoch milliseconds; set once persisted.
    pub fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }
}

impl Entity for Item {
    const NAME: &'static str = "item";

    fn id(&self) -> Option<EntityId> {
        self.id
    }
}

fn validate_code(code: i64) -> Result<(), ValidationError> {
    if code <= 0 {
        return Err(ValidationError::new(
            "code",
            format!("item code must be a positive integer, got {code}"),
        ));
    }
    Ok(())
}

fn normalize_value(value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("value", "item value must not be blank"));
    }
    if trimmed.chars().count() > ITEM_VALUE_MAX_CHARS {
        return Err(ValidationError::new(
            "value",
            format!("item value must be at most {ITEM_VALUE_MAX_CHARS} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{Item, ITEM_VALUE_MAX_CHARS};
    use crate::model::Entity;

    #[test]
    fn create_trims_value_and_leaves_store_fields_empty() {
        let item = Item::create(7, "  seven ").expect("item should be valid");
        assert_eq!(item.code(), 7);
        assert_eq!(item.value(), "seven");
        assert!(item.id().is_none());
        assert!(item.created_at().is_none());
    }

    #[test]
    fn create_rejects_non_positive_code() {
        let err = Item::create(0, "zero").expect_err("zero code must fail");
        assert_eq!(err.field, "code");
        assert!(Item::create(-3, "negative").is_err());
    }

    #[test]
    fn create_rejects_blank_or_oversized_value() {
        assert_eq!(
            Item::create(1, "   ").expect_err("blank must fail").field,
            "value"
        );
        let long = "x".repeat(ITEM_VALUE_MAX_CHARS + 1);
        assert!(Item::create(1, long).is_err());
    }

    #[test]
    fn rename_value_keeps_previous_value_on_error() {
        let mut item = Item::create(1, "a").expect("item should be valid");
        assert!(item.rename_value(" ").is_err());
        assert_eq!(item.value(), "a");
        item.rename_value("b").expect("rename should succeed");
        assert_eq!(item.value(), "b");
    }
}
