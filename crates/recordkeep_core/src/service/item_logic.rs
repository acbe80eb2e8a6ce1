//! Item business logic.
//!
//! # Invariants
//! - Bulk inserts are all-or-nothing: one failing row leaves no row behind.
//! - Batch validation runs before any store access.

use super::crud::CrudLogic;
use super::BusinessError;
use crate::model::item::Item;
use crate::model::EntityId;
use crate::repo::item_repo::ItemRepository;
use crate::repo::{ListQuery, Repository};
use crate::result::{ActionResult, DataResult};
use crate::uow::RecordUnitOfWork;
use std::collections::HashSet;

pub const EMPTY_BATCH_MESSAGE: &str = "At least one item is required for bulk insert.";

/// Item operations: the shared CRUD set plus bulk insertion.
pub struct ItemLogic<'u, U: RecordUnitOfWork> {
    crud: CrudLogic<'u, Item, U, U::Items>,
}

impl<'u, U: RecordUnitOfWork> ItemLogic<'u, U> {
    pub fn new(uow: &'u U) -> Self {
        Self {
            crud: CrudLogic::new(uow),
        }
    }

    /// The shared CRUD operations bound to the item repository.
    pub fn crud(&self) -> &CrudLogic<'u, Item, U, U::Items> {
        &self.crud
    }

    pub fn create_item(&self, code: i64, value: &str) -> DataResult<Item> {
        self.crud
            .create_single_entity_and_save(|_| Ok(Item::create(code, value)?))
    }

    pub fn get_item(&self, id: EntityId) -> DataResult<Item> {
        self.crud.get_by_id(id)
    }

    pub fn list_items(&self, query: &ListQuery) -> DataResult<Vec<Item>> {
        self.crud.get_all(query)
    }

    pub fn rename_item(&self, id: EntityId, value: &str) -> DataResult<Item> {
        self.crud.update_entity_and_save(id, |item| {
            item.rename_value(value)?;
            Ok(())
        })
    }

    pub fn delete_item(&self, id: EntityId) -> ActionResult {
        self.crud.delete_entity_and_save(id)
    }

    /// Looks an item up by its business key.
    pub fn find_by_code(&self, code: i64) -> DataResult<Item> {
        self.crud.execute_read("find_by_code", |repo| {
            repo.find_by_code(code)?.ok_or_else(|| {
                BusinessError::InvalidInput(format!("No item with code {code} exists."))
            })
        })
    }

    /// Inserts every `(code, value)` pair in one transaction.
    ///
    /// Reports the first failure; on failure nothing is persisted.
    pub fn bulk_insert_values(&self, values: &[(i64, String)]) -> ActionResult {
        let items = match build_batch(values) {
            Ok(items) => items,
            Err(err) => {
                return ActionResult::fail(self.crud.failure_message("bulk_insert", &err));
            }
        };

        let uow = self.crud.unit_of_work();
        self.crud
            .execute_write("bulk_insert", |repo| {
                for item in &items {
                    if uow.is_cancelled() {
                        return Err(BusinessError::Cancelled);
                    }
                    repo.insert(item)?;
                }
                Ok(items.len())
            })
            .into_action()
    }
}

fn build_batch(values: &[(i64, String)]) -> Result<Vec<Item>, BusinessError> {
    if values.is_empty() {
        return Err(BusinessError::InvalidInput(EMPTY_BATCH_MESSAGE.to_string()));
    }

    let mut seen = HashSet::with_capacity(values.len());
    let mut items = Vec::with_capacity(values.len());
    for (index, (code, value)) in values.iter().enumerate() {
        let item = Item::create(*code, value.as_str()).map_err(|err| {
            BusinessError::InvalidInput(format!("items[{index}]: {}", err.message))
        })?;
        if !seen.insert(*code) {
            return Err(BusinessError::Conflict(format!(
                "items[{index}]: code {code} appears more than once in the batch."
            )));
        }
        items.push(item);
    }
    Ok(items)
}
