//! 类型键控的服务注册表
//!
//! One coarse reentrant lock guards both maps. Registration happens at
//! startup and lookups are memoized, so serializing all traffic is cheap; the
//! lock is reentrant because a factory resolves its own dependencies while the
//! outer lookup still holds it.

use super::declarations::{Component, Declarations, Handle};
use super::resolver::{Arguments, FactoryMethod, Parameter};
use crate::config::ContainerConfig;
use crate::errors::ContainerError;
use crate::infrastructure::lifetime::{LifetimeManager, Progress};
use lazy_static::lazy_static;
use parking_lot::ReentrantMutex;
use std::any::{type_name, TypeId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Handles for the primary type and each alias, all sharing one product.
type Produced = Vec<(TypeId, &'static str, Handle)>;

type Produce =
    Box<dyn Fn(&ServiceRegistry, &mut Arguments) -> Result<Option<Produced>, ContainerError> + Send + Sync>;

/// Pending construction. Shared by the primary type and all of its aliases.
struct FactoryDefinition {
    type_name: &'static str,
    parameters: Vec<Parameter>,
    produce: Produce,
}

struct Slot {
    type_name: &'static str,
    handle: Handle,
}

/// An identifier still waiting for its factory.
struct Pending {
    type_name: &'static str,
    definition: Arc<FactoryDefinition>,
}

impl Slot {
    fn get<K: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<K>> {
        // A slot under TypeId::of::<K>() always holds an Arc<K>.
        self.handle.downcast_ref::<Arc<K>>().cloned()
    }
}

#[derive(Default)]
struct RegistryState {
    instances: HashMap<TypeId, Slot>,
    factories: HashMap<TypeId, Pending>,
}

impl RegistryState {
    /// Every key must be free in both tables and appear only once in `keys`.
    fn ensure_vacant(&self, keys: &[(TypeId, &'static str)]) -> Result<(), ContainerError> {
        let mut seen = HashSet::with_capacity(keys.len());
        match keys.iter().find(|(id, _)| {
            !seen.insert(*id) || self.instances.contains_key(id) || self.factories.contains_key(id)
        }) {
            Some((_, type_name)) => Err(ContainerError::DuplicateRegistration {
                type_name: *type_name,
            }),
            None => Ok(()),
        }
    }
}

/// 内部统计信息（原子计数器）
#[derive(Default)]
struct InnerStats {
    total_resolutions: AtomicUsize,
    factory_runs: AtomicUsize,
}

/// Type-keyed store of eager instances and lazy factories, paired with the
/// lifetime manager it notifies about lifecycle-capable components.
#[derive(Clone)]
pub struct ServiceRegistry {
    state: Arc<ReentrantMutex<RefCell<RegistryState>>>,
    lifetimes: Arc<LifetimeManager>,
    stats: Arc<InnerStats>,
}

lazy_static! {
    static ref GLOBAL: ServiceRegistry = ServiceRegistry::new();
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::with_lifetimes(LifetimeManager::new())
    }

    pub fn with_config(config: &ContainerConfig) -> Self {
        Self::with_lifetimes(LifetimeManager::with_config(&config.lifetime))
    }

    fn with_lifetimes(lifetimes: LifetimeManager) -> Self {
        Self {
            state: Arc::new(ReentrantMutex::new(RefCell::new(RegistryState::default()))),
            lifetimes: Arc::new(lifetimes),
            stats: Arc::new(InnerStats::default()),
        }
    }

    /// Process-wide registry.
    pub fn global() -> &'static ServiceRegistry {
        &GLOBAL
    }

    pub fn lifetimes(&self) -> &LifetimeManager {
        &self.lifetimes
    }

    /// Registers `instance` under its own type and every alias it declares.
    pub fn register_instance<T: Component>(&self, instance: T) -> Result<Arc<T>, ContainerError> {
        self.register_shared(Arc::new(instance))
    }

    /// Like [`register_instance`](Self::register_instance) for a value the
    /// caller already shares.
    pub fn register_shared<T: Component>(&self, instance: Arc<T>) -> Result<Arc<T>, ContainerError> {
        let declarations = Declarations::<T>::of();
        {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            state.ensure_vacant(&declarations.keys())?;
            for (type_id, type_name, handle) in declarations.handles(&instance) {
                state.instances.insert(type_id, Slot { type_name, handle });
            }
        }

        debug!(
            component = type_name::<T>(),
            aliases = ?declarations.alias_names(),
            "Registered instance"
        );
        self.lifetimes.register_container_type::<T>();
        Ok(instance)
    }

    /// Registers a factory run on the first lookup of `T` or of any alias of
    /// `T`. Its parameters are always taken from the registry.
    pub fn register_factory_method<T: Component>(&self, factory: FactoryMethod<T>) -> Result<(), ContainerError> {
        let (parameters, invoke) = factory.into_parts();
        self.register_deferred::<T>(
            parameters,
            Box::new(move |_: &ServiceRegistry, arguments: &mut Arguments| invoke(arguments)),
        )
    }

    pub(crate) fn register_deferred<T: Component>(
        &self,
        parameters: Vec<Parameter>,
        invoke: Box<dyn Fn(&ServiceRegistry, &mut Arguments) -> Result<Option<T>, ContainerError> + Send + Sync>,
    ) -> Result<(), ContainerError> {
        let declarations = Arc::new(Declarations::<T>::of());
        let keys = declarations.keys();

        let produce: Produce = {
            let declarations = Arc::clone(&declarations);
            Box::new(
                move |registry: &ServiceRegistry,
                      arguments: &mut Arguments|
                      -> Result<Option<Produced>, ContainerError> {
                    let product = invoke(registry, arguments)?;
                    Ok(product.map(|product| declarations.handles(&Arc::new(product))))
                },
            )
        };
        let definition = Arc::new(FactoryDefinition {
            type_name: type_name::<T>(),
            parameters,
            produce,
        });

        {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            state.ensure_vacant(&keys)?;
            for (type_id, type_name) in &keys {
                state.factories.insert(
                    *type_id,
                    Pending {
                        type_name: *type_name,
                        definition: Arc::clone(&definition),
                    },
                );
            }
        }

        debug!(
            component = type_name::<T>(),
            aliases = ?declarations.alias_names(),
            parameters = definition.parameters.len(),
            "Registered factory"
        );
        self.lifetimes.register_container_type::<T>();
        Ok(())
    }

    /// Looks up `K`, running its factory first if it is still pending.
    pub fn try_get<K>(&self) -> Result<Option<Arc<K>>, ContainerError>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        self.stats.total_resolutions.fetch_add(1, Ordering::Relaxed);
        let type_id = TypeId::of::<K>();

        let guard = self.state.lock();
        let pending = {
            let state = guard.borrow();
            if let Some(slot) = state.instances.get(&type_id) {
                return Ok(slot.get::<K>());
            }
            match state.factories.get(&type_id) {
                Some(pending) => Arc::clone(&pending.definition),
                None => return Ok(None),
            }
        };

        self.run_factory(pending)?;

        let state = guard.borrow();
        Ok(state.instances.get(&type_id).and_then(Slot::get::<K>))
    }

    pub fn get<K>(&self) -> Result<Arc<K>, ContainerError>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        self.try_get::<K>()?.ok_or(ContainerError::NotRegistered {
            type_name: type_name::<K>(),
        })
    }

    /// True when `K` is bound to an instance or a pending factory.
    pub fn contains<K: ?Sized + 'static>(&self) -> bool {
        let type_id = TypeId::of::<K>();
        let guard = self.state.lock();
        let state = guard.borrow();
        state.instances.contains_key(&type_id) || state.factories.contains_key(&type_id)
    }

    /// Runs `definition` and moves every identifier bound to it from the
    /// factory table to the instance table. Called with the lock held.
    fn run_factory(&self, definition: Arc<FactoryDefinition>) -> Result<(), ContainerError> {
        debug!(component = definition.type_name, "Running factory");

        // No RefCell borrow may be live here: dependencies re-enter the registry.
        let mut arguments = Arguments::new(definition.type_name);
        for parameter in &definition.parameters {
            arguments.push(parameter.resolve(self)?);
        }
        let produced = (definition.produce)(self, &mut arguments)?.ok_or(ContainerError::NullProduct {
            type_name: definition.type_name,
        })?;
        self.stats.factory_runs.fetch_add(1, Ordering::Relaxed);

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state
            .factories
            .retain(|_, pending| !Arc::ptr_eq(&pending.definition, &definition));
        for (type_id, type_name, handle) in produced {
            state.instances.insert(type_id, Slot { type_name, handle });
        }
        Ok(())
    }

    /// Names of every registered identifier, sorted.
    pub fn registered_types(&self) -> Vec<&'static str> {
        let guard = self.state.lock();
        let state = guard.borrow();
        let mut names: Vec<&'static str> = state
            .instances
            .values()
            .map(|slot| slot.type_name)
            .chain(state.factories.values().map(|pending| pending.type_name))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn get_stats(&self) -> RegistryStats {
        let guard = self.state.lock();
        let state = guard.borrow();
        RegistryStats {
            instances: state.instances.len(),
            pending_factories: state.factories.len(),
            total_resolutions: self.stats.total_resolutions.load(Ordering::Relaxed),
            factory_runs: self.stats.factory_runs.load(Ordering::Relaxed),
        }
    }

    // Lifecycle entry points, resolving participants through this registry.

    pub async fn run_client_startup(&self, progress: &Progress) -> Result<(), ContainerError> {
        self.lifetimes.run_client_startup(self, progress).await
    }

    pub async fn run_client_shutdown(&self, progress: &Progress) -> Result<(), ContainerError> {
        self.lifetimes.run_client_shutdown(self, progress).await
    }

    pub async fn run_logon(&self, progress: &Progress) -> Result<(), ContainerError> {
        self.lifetimes.run_logon(self, progress).await
    }

    pub async fn run_logoff(&self, progress: &Progress) -> Result<(), ContainerError> {
        self.lifetimes.run_logoff(self, progress).await
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 注册表统计信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    /// Identifiers bound to a constructed instance, aliases included.
    pub instances: usize,
    /// Identifiers still bound to a factory.
    pub pending_factories: usize,
    pub total_resolutions: usize,
    pub factory_runs: usize,
}
