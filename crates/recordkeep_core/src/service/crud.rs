//! Generic CRUD skeleton shared by every entity.
//!
//! # Responsibility
//! - Resolve the bound repository lazily through the Unit of Work.
//! - Run each operation, then commit on success or roll back on failure.
//! - Convert every outcome into a result envelope.
//!
//! # Invariants
//! - A write is committed only when the whole operation succeeded and the
//!   scope was not cancelled.
//! - Non consumer-friendly failures are logged with full detail and reported
//!   as `GENERIC_FAILURE_MESSAGE`.

use super::mapping::Mapper;
use super::{BusinessError, GENERIC_FAILURE_MESSAGE};
use crate::model::{Entity, EntityId};
use crate::repo::{ListQuery, Repository};
use crate::result::{ActionResult, DataResult};
use crate::uow::UnitOfWork;
use log::{error, info, warn};
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::Instant;

/// CRUD operations over entity `E`, persisted through repository `R`
/// resolved from Unit of Work `U`.
pub struct CrudLogic<'u, E, U, R> {
    uow: &'u U,
    _types: PhantomData<fn() -> (E, R)>,
}

impl<'u, E, U, R> CrudLogic<'u, E, U, R>
where
    E: Entity,
    U: UnitOfWork,
    R: Repository<E> + 'static,
{
    pub fn new(uow: &'u U) -> Self {
        Self {
            uow,
            _types: PhantomData,
        }
    }

    pub fn unit_of_work(&self) -> &'u U {
        self.uow
    }

    /// The scope-bound repository; built on first use.
    pub fn repository(&self) -> Rc<R> {
        self.uow.resolver().get::<R>()
    }

    /// Builds an entity, inserts it and commits.
    ///
    /// Returns the persisted entity with store-assigned fields populated.
    pub fn create_single_entity_and_save<F>(&self, build: F) -> DataResult<E>
    where
        F: FnOnce(&U) -> Result<E, BusinessError>,
    {
        self.execute_write("create", |repo| {
            let entity = build(self.uow)?;
            Ok(repo.insert(&entity)?)
        })
    }

    /// Loads one entity; a missing row is reported as not found.
    pub fn get_by_id(&self, id: EntityId) -> DataResult<E> {
        self.execute_read("get_by_id", |repo| {
            repo.get(id)?
                .ok_or(BusinessError::NotFound { entity: E::NAME, id })
        })
    }

    pub fn get_by_id_mapped<D, M>(&self, id: EntityId, mapper: &M) -> DataResult<D>
    where
        M: Mapper<E, D>,
    {
        self.get_by_id(id).map(|entity| mapper.map(&entity))
    }

    pub fn get_all(&self, query: &ListQuery) -> DataResult<Vec<E>> {
        self.execute_read("get_all", |repo| Ok(repo.list(query)?))
    }

    pub fn get_all_mapped<D, M>(&self, query: &ListQuery, mapper: &M) -> DataResult<Vec<D>>
    where
        M: Mapper<E, D>,
    {
        self.get_all(query)
            .map(|entities| entities.iter().map(|entity| mapper.map(entity)).collect())
    }

    /// Loads an entity, applies `mutate`, persists it and commits.
    pub fn update_entity_and_save<F>(&self, id: EntityId, mutate: F) -> DataResult<E>
    where
        F: FnOnce(&mut E) -> Result<(), BusinessError>,
    {
        self.execute_write("update", |repo| {
            let mut entity = repo
                .get(id)?
                .ok_or(BusinessError::NotFound { entity: E::NAME, id })?;
            mutate(&mut entity)?;
            Ok(repo.update(&entity)?)
        })
    }

    pub fn delete_entity_and_save(&self, id: EntityId) -> ActionResult {
        self.execute_write("delete", |repo| Ok(repo.delete(id)?))
            .into_action()
    }

    /// Runs `work` against the repository inside the scope transaction.
    ///
    /// Commits when `work` succeeds; otherwise rolls back and returns a
    /// failing envelope.
    pub fn execute_write<T, F>(&self, operation: &'static str, work: F) -> DataResult<T>
    where
        F: FnOnce(&R) -> Result<T, BusinessError>,
    {
        let started_at = Instant::now();
        let repo = self.repository();
        let outcome = work(&*repo).and_then(|value| {
            if self.uow.is_cancelled() {
                return Err(BusinessError::Cancelled);
            }
            self.uow.save_changes()?;
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                info!(
                    "event=entity_{operation} module=service status=ok entity={} duration_ms={}",
                    E::NAME,
                    started_at.elapsed().as_millis()
                );
                DataResult::ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.uow.rollback() {
                    error!(
                        "event=entity_{operation} module=service status=error entity={} error_code=rollback_failed error={}",
                        E::NAME,
                        rollback_err
                    );
                }
                DataResult::fail(self.failure_message(operation, &err))
            }
        }
    }

    /// Runs read-only `work`; nothing is committed.
    pub fn execute_read<T, F>(&self, operation: &'static str, work: F) -> DataResult<T>
    where
        F: FnOnce(&R) -> Result<T, BusinessError>,
    {
        let repo = self.repository();
        match work(&*repo) {
            Ok(value) => DataResult::ok(value),
            Err(err) => DataResult::fail(self.failure_message(operation, &err)),
        }
    }

    /// Sanitizes an error for the caller, logging what gets hidden.
    pub(crate) fn failure_message(&self, operation: &str, err: &BusinessError) -> String {
        match err.consumer_message() {
            Some(message) => {
                warn!(
                    "event=entity_{operation} module=service status=rejected entity={} reason={}",
                    E::NAME,
                    err
                );
                message
            }
            None => {
                error!(
                    "event=entity_{operation} module=service status=error entity={} error={}",
                    E::NAME,
                    err
                );
                GENERIC_FAILURE_MESSAGE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CrudLogic;
    use crate::config::DatabaseSettings;
    use crate::model::item::Item;
    use crate::model::{Entity, ValidationError};
    use crate::repo::item_repo::{ItemRepository, SqliteItemRepository};
    use crate::repo::{ListQuery, RepoError, Repository};
    use crate::service::mapping::{FromMapper, ItemDto};
    use crate::service::{BusinessError, GENERIC_FAILURE_MESSAGE};
    use crate::uow::{SqliteUnitOfWork, UnitOfWorkFactory};

    type ItemCrud<'u> = CrudLogic<'u, Item, SqliteUnitOfWork, SqliteItemRepository>;

    fn uow() -> SqliteUnitOfWork {
        UnitOfWorkFactory::from_settings(&DatabaseSettings::default())
            .unwrap()
            .begin()
            .unwrap()
    }

    #[test]
    fn create_commits_and_returns_persisted_entity() {
        let uow = uow();
        let crud = ItemCrud::new(&uow);

        let created = crud.create_single_entity_and_save(|_| Ok(Item::create(1, "one")?));
        assert!(created.is_success());
        let item = created.into_data().unwrap();
        assert!(item.id().is_some());
        assert!(!uow.session().in_transaction());

        let loaded = crud.get_by_id(item.id().unwrap());
        assert_eq!(loaded.data(), Some(&item));
    }

    #[test]
    fn builder_failure_is_reported_without_writes() {
        let uow = uow();
        let crud = ItemCrud::new(&uow);

        let created = crud.create_single_entity_and_save(|_| Ok(Item::create(0, "zero")?));
        assert!(!created.is_success());
        assert!(created
            .error_message()
            .unwrap()
            .contains("positive integer"));
        assert_eq!(crud.repository().count().unwrap(), 0);
    }

    #[test]
    fn failure_after_write_rolls_back() {
        let uow = uow();
        let crud = ItemCrud::new(&uow);

        let result = crud.execute_write("create", |repo| {
            repo.insert(&Item::create(1, "one")?)?;
            Err::<(), _>(BusinessError::InvalidInput("stop".to_string()))
        });
        assert_eq!(result.error_message(), Some("stop"));
        assert_eq!(crud.repository().count().unwrap(), 0);
    }

    #[test]
    fn internal_errors_are_replaced_by_generic_message() {
        let uow = uow();
        let crud = ItemCrud::new(&uow);

        let result = crud.execute_write("create", |_| {
            Err::<(), _>(BusinessError::Repo(RepoError::InvalidData(
                "row 7 is corrupt".to_string(),
            )))
        });
        assert_eq!(result.error_message(), Some(GENERIC_FAILURE_MESSAGE));
    }

    #[test]
    fn get_update_delete_cycle() {
        let uow = uow();
        let crud = ItemCrud::new(&uow);
        let id = crud
            .create_single_entity_and_save(|_| Ok(Item::create(2, "two")?))
            .into_data()
            .unwrap()
            .id()
            .unwrap();

        let updated = crud.update_entity_and_save(id, |item| {
            item.rename_value("deux")?;
            Ok(())
        });
        assert_eq!(updated.data().map(Item::value), Some("deux"));

        let rejected = crud.update_entity_and_save(id, |item| {
            item.rename_value(" ")
                .map_err(|err: ValidationError| BusinessError::from(err))
        });
        assert!(!rejected.is_success());
        assert_eq!(crud.get_by_id(id).data().map(Item::value), Some("deux"));

        let dto: Option<ItemDto> = crud.get_by_id_mapped(id, &FromMapper).into_data();
        assert_eq!(dto.map(|dto| dto.value), Some("deux".to_string()));

        assert!(crud.delete_entity_and_save(id).is_success());
        let missing = crud.get_by_id(id);
        assert!(missing.error_message().unwrap().contains("was not found"));
        assert!(!crud.delete_entity_and_save(id).is_success());
    }

    #[test]
    fn get_all_mapped_translates_every_entity() {
        let uow = uow();
        let crud = ItemCrud::new(&uow);
        for code in [1, 2] {
            crud.create_single_entity_and_save(|_| Ok(Item::create(code, "v")?));
        }
        let dtos: Vec<ItemDto> = crud
            .get_all_mapped(&ListQuery::default(), &FromMapper)
            .into_data()
            .unwrap();
        assert_eq!(dtos.len(), 2);
        assert_eq!(dtos[1].code, 2);
    }
}
