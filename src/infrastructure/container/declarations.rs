//! 组件静态声明
//!
//! A component type states, once and statically, which extra type identifiers
//! it is reachable under (usually trait objects such as `dyn Clock`) and which
//! lifetime capabilities it offers. The registry reads this side-table on
//! every registration instead of inspecting the type at runtime.

use crate::infrastructure::lifetime::{ClientLifetime, LogonLifetime};
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

/// Type-erased `Arc<K>`, stored under `TypeId::of::<K>()`.
pub(crate) type Handle = Box<dyn Any + Send + Sync>;

/// A value the registry can hold.
///
/// Implement [`Component::declare`] to expose the value under additional
/// interface types or to opt into the client/logon lifecycles:
///
/// ```ignore
/// impl Component for SqlStore {
///     fn declare(decl: &mut Declarations<Self>) {
///         decl.alias::<dyn Store>(|store| store).client_lifetime();
///     }
/// }
/// ```
pub trait Component: Any + Send + Sync + Sized {
    fn declare(_decl: &mut Declarations<Self>) {}
}

struct AliasBinding<T> {
    type_id: TypeId,
    type_name: &'static str,
    cast: Box<dyn Fn(&Arc<T>) -> Handle + Send + Sync>,
}

/// Static declarations of a single component type.
pub struct Declarations<T> {
    aliases: Vec<AliasBinding<T>>,
    client: Option<fn(Arc<T>) -> Arc<dyn ClientLifetime>>,
    logon: Option<fn(Arc<T>) -> Arc<dyn LogonLifetime>>,
}

impl<T: Component> Declarations<T> {
    /// Collects the declarations `T` makes about itself.
    pub fn of() -> Self {
        let mut declarations = Self {
            aliases: Vec::new(),
            client: None,
            logon: None,
        };
        T::declare(&mut declarations);
        declarations
    }

    /// Also register the component under `A`. Declaring the same alias twice
    /// is reported as a duplicate registration.
    pub fn alias<A>(&mut self, cast: fn(Arc<T>) -> Arc<A>) -> &mut Self
    where
        A: ?Sized + Send + Sync + 'static,
    {
        self.aliases.push(AliasBinding {
            type_id: TypeId::of::<A>(),
            type_name: type_name::<A>(),
            cast: Box::new(move |component| Box::new(cast(Arc::clone(component))) as Handle),
        });
        self
    }

    /// Take part in the client startup/shutdown sequence.
    pub fn client_lifetime(&mut self) -> &mut Self
    where
        T: ClientLifetime,
    {
        self.client = Some(as_client::<T>);
        self
    }

    /// Take part in the logon/logoff sequence.
    pub fn logon_lifetime(&mut self) -> &mut Self
    where
        T: LogonLifetime,
    {
        self.logon = Some(as_logon::<T>);
        self
    }

    pub fn client(&self) -> Option<fn(Arc<T>) -> Arc<dyn ClientLifetime>> {
        self.client
    }

    pub fn logon(&self) -> Option<fn(Arc<T>) -> Arc<dyn LogonLifetime>> {
        self.logon
    }

    /// Alias type names, in declaration order.
    pub fn alias_names(&self) -> Vec<&'static str> {
        self.aliases.iter().map(|alias| alias.type_name).collect()
    }

    /// Every identifier the component occupies, the concrete type first.
    pub(crate) fn keys(&self) -> Vec<(TypeId, &'static str)> {
        std::iter::once((TypeId::of::<T>(), type_name::<T>()))
            .chain(self.aliases.iter().map(|alias| (alias.type_id, alias.type_name)))
            .collect()
    }

    /// One handle per key, all pointing at the same component.
    pub(crate) fn handles(&self, component: &Arc<T>) -> Vec<(TypeId, &'static str, Handle)> {
        let primary: Handle = Box::new(Arc::clone(component));
        std::iter::once((TypeId::of::<T>(), type_name::<T>(), primary))
            .chain(
                self.aliases
                    .iter()
                    .map(|alias| (alias.type_id, alias.type_name, (alias.cast)(component))),
            )
            .collect()
    }
}

fn as_client<T: ClientLifetime + 'static>(component: Arc<T>) -> Arc<dyn ClientLifetime> {
    component
}

fn as_logon<T: LogonLifetime + 'static>(component: Arc<T>) -> Arc<dyn LogonLifetime> {
    component
}
