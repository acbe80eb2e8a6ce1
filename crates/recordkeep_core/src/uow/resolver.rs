//! Scope-local lazy service resolution.
//!
//! # Responsibility
//! - Hold process-wide factories for session-bound services (`ServiceRegistry`).
//! - Construct a service on first request within one scope and cache it
//!   (`LazyResolver`).
//!
//! # Invariants
//! - At most one instance per service type per scope.
//! - Cached instances never leave the scope that built them; the cache dies
//!   with its Unit of Work.
//! - Cache lookups are in-memory only and never touch the store.

use super::session::Session;
use log::debug;
use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::sync::Arc;

/// Wiring defects detected while registering or resolving services.
///
/// These indicate a deployment bug, not a per-request condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WiringError {
    Unregistered { service: &'static str },
    DuplicateRegistration { service: &'static str },
    TypeMismatch { service: &'static str },
}

impl Display for WiringError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unregistered { service } => {
                write!(f, "no provider registered for service `{service}`")
            }
            Self::DuplicateRegistration { service } => {
                write!(f, "service `{service}` is already registered")
            }
            Self::TypeMismatch { service } => {
                write!(f, "provider for `{service}` produced a different type")
            }
        }
    }
}

impl Error for WiringError {}

type ServiceFactory = dyn Fn(&Rc<Session>) -> Rc<dyn Any> + Send + Sync;

struct Registration {
    name: &'static str,
    factory: Box<ServiceFactory>,
}

/// Process-wide provider of session-bound services.
///
/// Built once at startup and shared by every Unit of Work factory.
#[derive(Default)]
pub struct ServiceRegistry {
    registrations: HashMap<TypeId, Registration>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory used to build `T` for a session.
    pub fn register<T, F>(&mut self, factory: F) -> Result<(), WiringError>
    where
        T: Any,
        F: Fn(&Rc<Session>) -> T + Send + Sync + 'static,
    {
        let key = TypeId::of::<T>();
        if self.registrations.contains_key(&key) {
            return Err(WiringError::DuplicateRegistration {
                service: type_name::<T>(),
            });
        }
        self.registrations.insert(
            key,
            Registration {
                name: type_name::<T>(),
                factory: Box::new(move |session| Rc::new(factory(session)) as Rc<dyn Any>),
            },
        );
        Ok(())
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    /// Fails when `T` has no registered provider.
    pub fn require<T: Any>(&self) -> Result<(), WiringError> {
        if self.contains::<T>() {
            Ok(())
        } else {
            Err(WiringError::Unregistered {
                service: type_name::<T>(),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Sorted names of registered services.
    pub fn service_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .registrations
            .values()
            .map(|registration| registration.name)
            .collect();
        names.sort_unstable();
        names
    }

    fn construct(&self, key: TypeId, session: &Rc<Session>) -> Option<Rc<dyn Any>> {
        self.registrations
            .get(&key)
            .map(|registration| (registration.factory)(session))
    }
}

/// Per-scope cache of constructed services.
pub struct LazyResolver {
    session: Rc<Session>,
    registry: Arc<ServiceRegistry>,
    cache: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

impl LazyResolver {
    pub(crate) fn new(session: Rc<Session>, registry: Arc<ServiceRegistry>) -> Self {
        Self {
            session,
            registry,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the scope's instance of `T`, building it through the registry
    /// on first request.
    pub fn try_get<T: Any>(&self) -> Result<Rc<T>, WiringError> {
        let key = TypeId::of::<T>();
        if let Some(cached) = self.cached(key) {
            return downcast(cached);
        }

        let built = self
            .registry
            .construct(key, &self.session)
            .ok_or(WiringError::Unregistered {
                service: type_name::<T>(),
            })?;
        self.store(key, Rc::clone(&built));
        downcast(built)
    }

    /// Like `try_get`, but a missing provider is a wiring defect and panics.
    pub fn get<T: Any>(&self) -> Rc<T> {
        match self.try_get::<T>() {
            Ok(service) => service,
            Err(err) => panic!("service wiring defect: {err}"),
        }
    }

    /// Returns the scope's instance of `T`, building it with `factory` instead
    /// of the registry when absent.
    pub fn get_or_insert_with<T, F>(&self, factory: F) -> Rc<T>
    where
        T: Any,
        F: FnOnce(&Rc<Session>) -> T,
    {
        let key = TypeId::of::<T>();
        if let Some(cached) = self.cached(key) {
            if let Ok(service) = cached.downcast::<T>() {
                return service;
            }
        }

        let service = Rc::new(factory(&self.session));
        self.store(key, Rc::clone(&service) as Rc<dyn Any>);
        service
    }

    /// Whether `T` has already been built in this scope.
    pub fn is_resolved<T: Any>(&self) -> bool {
        self.cache.borrow().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    fn cached(&self, key: TypeId) -> Option<Rc<dyn Any>> {
        self.cache.borrow().get(&key).cloned()
    }

    fn store(&self, key: TypeId, service: Rc<dyn Any>) {
        debug!(
            "event=service_resolve module=uow status=built scope={}",
            self.session.scope_id()
        );
        self.cache.borrow_mut().insert(key, service);
    }
}

fn downcast<T: Any>(service: Rc<dyn Any>) -> Result<Rc<T>, WiringError> {
    service.downcast::<T>().map_err(|_| WiringError::TypeMismatch {
        service: type_name::<T>(),
    })
}

#[cfg(test)]
mod tests {
    use super::{LazyResolver, ServiceRegistry, WiringError};
    use crate::uow::session::Session;
    use rusqlite::Connection;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Probe {
        scope: uuid::Uuid,
    }

    struct Unregistered;

    fn session() -> Rc<Session> {
        Rc::new(Session::new(Connection::open_in_memory().unwrap()))
    }

    #[test]
    fn builds_once_per_scope() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let mut registry = ServiceRegistry::new();
        registry
            .register(move |session: &Rc<Session>| {
                counter.fetch_add(1, Ordering::SeqCst);
                Probe {
                    scope: session.scope_id(),
                }
            })
            .unwrap();

        let session = session();
        let resolver = LazyResolver::new(Rc::clone(&session), Arc::new(registry));
        assert!(!resolver.is_resolved::<Probe>());

        let first = resolver.get::<Probe>();
        let second = resolver.get::<Probe>();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.scope, session.scope_id());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn unregistered_service_is_a_wiring_error() {
        let resolver = LazyResolver::new(session(), Arc::new(ServiceRegistry::new()));
        let err = resolver
            .try_get::<Unregistered>()
            .err()
            .expect("unregistered service must fail");
        assert!(matches!(err, WiringError::Unregistered { .. }));
        assert!(resolver.is_empty());
    }

    #[test]
    #[should_panic(expected = "service wiring defect")]
    fn get_panics_on_wiring_defect() {
        let resolver = LazyResolver::new(session(), Arc::new(ServiceRegistry::new()));
        let _ = resolver.get::<Unregistered>();
    }

    #[test]
    fn caller_factory_runs_only_when_absent() {
        let resolver = LazyResolver::new(session(), Arc::new(ServiceRegistry::new()));
        let calls = Cell::new(0);

        let first = resolver.get_or_insert_with(|_| {
            calls.set(calls.get() + 1);
            String::from("built")
        });
        let second = resolver.get_or_insert_with(|_| {
            calls.set(calls.get() + 1);
            String::from("rebuilt")
        });

        assert_eq!(calls.get(), 1);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(resolver.get::<String>().as_str(), "built");
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ServiceRegistry::new();
        registry.register(|_: &Rc<Session>| 1_u8).unwrap();
        let err = registry.register(|_: &Rc<Session>| 2_u8).unwrap_err();
        assert!(matches!(err, WiringError::DuplicateRegistration { .. }));
        assert_eq!(registry.len(), 1);
        assert!(registry.require::<u8>().is_ok());
        assert!(registry.require::<u16>().is_err());
    }

    #[test]
    fn clear_drops_cached_instances() {
        let mut registry = ServiceRegistry::new();
        registry.register(|_: &Rc<Session>| 5_u32).unwrap();
        let resolver = LazyResolver::new(session(), Arc::new(registry));

        let before = resolver.get::<u32>();
        resolver.clear();
        assert!(resolver.is_empty());
        let after = resolver.get::<u32>();
        assert!(!Rc::ptr_eq(&before, &after));
    }
}
