//! 构造注入
//!
//! Rust has no runtime constructor reflection, so an injectable type lists its
//! constructors explicitly: the ordered parameter types plus a function that
//! builds the value from the resolved arguments.

use super::declarations::{Component, Handle};
use super::registry::ServiceRegistry;
use crate::errors::ContainerError;
use std::any::{type_name, TypeId};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// One declared parameter: the type it needs and how to pull it from a registry.
#[derive(Clone, Copy)]
pub struct Parameter {
    type_id: TypeId,
    type_name: &'static str,
    resolve: fn(&ServiceRegistry) -> Result<Handle, ContainerError>,
}

impl Parameter {
    pub fn of<P>() -> Self
    where
        P: ?Sized + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: type_name::<P>(),
            resolve: resolve_handle::<P>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn resolve(&self, registry: &ServiceRegistry) -> Result<Handle, ContainerError> {
        (self.resolve)(registry)
    }
}

fn resolve_handle<P>(registry: &ServiceRegistry) -> Result<Handle, ContainerError>
where
    P: ?Sized + Send + Sync + 'static,
{
    Ok(Box::new(registry.get::<P>()?))
}

/// Resolved arguments, handed to a constructor in declaration order.
pub struct Arguments {
    owner: &'static str,
    values: VecDeque<Handle>,
    position: usize,
}

impl Arguments {
    pub(crate) fn new(owner: &'static str) -> Self {
        Self {
            owner,
            values: VecDeque::new(),
            position: 0,
        }
    }

    pub(crate) fn push(&mut self, value: Handle) {
        self.values.push_back(value);
    }

    /// Takes the next argument. Must be called in the order the parameters
    /// were declared.
    pub fn next<P>(&mut self) -> Result<Arc<P>, ContainerError>
    where
        P: ?Sized + Send + Sync + 'static,
    {
        let owner = self.owner;
        let position = self.position;
        self.position += 1;
        let mismatch = || ContainerError::ArgumentMismatch {
            type_name: owner,
            position,
            expected: type_name::<P>(),
        };

        let value = self.values.pop_front().ok_or_else(mismatch)?;
        value
            .downcast::<Arc<P>>()
            .map(|value| *value)
            .map_err(|_| mismatch())
    }

    /// Takes the next argument and clones the value out of it.
    pub fn next_cloned<P>(&mut self) -> Result<P, ContainerError>
    where
        P: Clone + Send + Sync + 'static,
    {
        self.next::<P>().map(|value| (*value).clone())
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

type Invoke<R> = Box<dyn Fn(&mut Arguments) -> Result<R, ContainerError> + Send + Sync>;

/// Ordered parameter types plus the function consuming them.
///
/// [`Constructor`] produces the value itself; [`FactoryMethod`] may produce
/// nothing, which the registry reports as [`ContainerError::NullProduct`].
pub struct Signature<R> {
    parameters: Vec<Parameter>,
    invoke: Invoke<R>,
}

pub type Constructor<T> = Signature<T>;
pub type FactoryMethod<T> = Signature<Option<T>>;

impl<R> Signature<R> {
    pub fn new<F>(invoke: F) -> Self
    where
        F: Fn(&mut Arguments) -> Result<R, ContainerError> + Send + Sync + 'static,
    {
        Self {
            parameters: Vec::new(),
            invoke: Box::new(invoke),
        }
    }

    /// Declares the next parameter.
    pub fn param<P>(mut self) -> Self
    where
        P: ?Sized + Send + Sync + 'static,
    {
        self.parameters.push(Parameter::of::<P>());
        self
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub(crate) fn into_parts(self) -> (Vec<Parameter>, Invoke<R>) {
        (self.parameters, self.invoke)
    }
}

impl<T> Signature<Option<T>> {
    /// Factory method that always yields a value.
    pub fn producing<F>(invoke: F) -> Self
    where
        F: Fn(&mut Arguments) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        Self::new(move |arguments| invoke(arguments).map(Some))
    }
}

/// A component the registry can build by itself.
///
/// Exactly one constructor must be returned; zero or several make
/// [`ServiceRegistry::construct`] fail without invoking any of them.
pub trait Injectable: Component {
    fn constructors() -> Vec<Constructor<Self>>;
}

/// Explicit arguments preferred over registry lookups, matched on exact type.
#[derive(Default)]
pub struct Overrides {
    values: Vec<(TypeId, Handle)>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<P>(mut self, value: Arc<P>) -> Self
    where
        P: ?Sized + Send + Sync + 'static,
    {
        self.values.push((TypeId::of::<P>(), Box::new(value)));
        self
    }

    pub fn value<P>(self, value: P) -> Self
    where
        P: Send + Sync + 'static,
    {
        self.with(Arc::new(value))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Removes and returns the first unconsumed override of the given type.
    fn take(&mut self, type_id: TypeId) -> Option<Handle> {
        let index = self.values.iter().position(|(id, _)| *id == type_id)?;
        Some(self.values.remove(index).1)
    }
}

impl ServiceRegistry {
    /// Builds `T` through its single constructor, taking each parameter from
    /// `overrides` when one of that exact type is left, otherwise from the
    /// registry. The result is not registered.
    pub fn construct<T: Injectable>(&self, mut overrides: Overrides) -> Result<T, ContainerError> {
        let owner = type_name::<T>();
        let mut constructors = T::constructors();
        let constructor = match constructors.len() {
            0 => return Err(ContainerError::NoConstructor { type_name: owner }),
            1 => constructors.remove(0),
            count => {
                return Err(ContainerError::AmbiguousConstructor {
                    type_name: owner,
                    count,
                })
            }
        };

        let (parameters, invoke) = constructor.into_parts();
        let mut arguments = Arguments::new(owner);
        for parameter in &parameters {
            let value = match overrides.take(parameter.type_id) {
                Some(value) => value,
                None => parameter.resolve(self)?,
            };
            arguments.push(value);
        }

        debug!(component = owner, parameters = parameters.len(), "Constructing component");
        invoke(&mut arguments)
    }

    /// [`construct`](Self::construct) followed by [`register_instance`](Self::register_instance).
    pub fn construct_and_register<T: Injectable>(
        &self,
        overrides: Overrides,
    ) -> Result<Arc<T>, ContainerError> {
        let component = self.construct::<T>(overrides)?;
        self.register_instance(component)
    }

    /// Registers `T` so that it is constructed with injection on first lookup.
    pub fn register_lazy<T: Injectable>(&self) -> Result<(), ContainerError> {
        self.register_deferred::<T>(
            Vec::new(),
            Box::new(|registry: &ServiceRegistry, _: &mut Arguments| {
                registry.construct::<T>(Overrides::new()).map(Some)
            }),
        )
    }
}
