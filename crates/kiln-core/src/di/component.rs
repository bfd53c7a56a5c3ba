//! The component protocol.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::callable::Callable;
use super::parameter::Parameter;

/// A pluggable provider of values for the parameters it claims.
///
/// Components are registered once, in order, when the application is
/// built; the first component whose [`claims`](Component::claims) returns
/// `true` for a parameter provides it. The value comes from calling
/// [`resolve`](Component::resolve), whose own parameters are injected
/// recursively.
///
/// * `cacheable` components are computed at most once per request.
/// * `singleton` components are computed once at startup and shared by
///   every request.
///
/// # Example
///
/// ```rust
/// use kiln_core::{Callable, Component, Parameter};
///
/// struct Database {
///     url: String,
/// }
///
/// struct DatabaseComponent;
///
/// impl Component for DatabaseComponent {
///     fn singleton(&self) -> bool {
///         true
///     }
///
///     fn claims(&self, parameter: &Parameter) -> bool {
///         parameter.is::<Database>()
///     }
///
///     fn resolve(&self) -> Callable {
///         Callable::builder("DatabaseComponent::resolve")
///             .build(|_| Ok(Database { url: "sqlite://".into() }))
///             .into_factory()
///     }
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// Whether the value is reused for the rest of the request.
    fn cacheable(&self) -> bool {
        true
    }

    /// Whether the value is computed once at startup and shared.
    fn singleton(&self) -> bool {
        false
    }

    /// Whether this component provides `parameter`.
    fn claims(&self, parameter: &Parameter) -> bool;

    /// The injectable factory producing the value.
    fn resolve(&self) -> Callable;

    /// A name for logs.
    fn name(&self) -> &str {
        let full = type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// The identity of a registered component, used as its cache key.
///
/// Two distinct registrations of equal components are different
/// components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(usize);

impl ComponentId {
    /// The identity of `component`.
    #[must_use]
    pub fn of(component: &Arc<dyn Component>) -> Self {
        Self(Arc::as_ptr(component).cast::<()>() as usize)
    }
}

/// A component that claims every parameter of type `T` and builds it
/// with a callable.
///
/// # Example
///
/// ```rust
/// use kiln_core::{Callable, Provider};
///
/// struct Settings {
///     debug: bool,
/// }
///
/// let provider = Provider::<Settings>::new(
///     Callable::builder("settings").build(|_| Ok(Settings { debug: true })),
/// )
/// .singleton();
/// ```
pub struct Provider<T> {
    factory: Callable,
    cacheable: bool,
    singleton: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Provider<T> {
    /// A cacheable, per-request provider.
    pub fn new(factory: Callable<T>) -> Self {
        Self {
            factory: factory.into_factory(),
            cacheable: true,
            singleton: false,
            _marker: PhantomData,
        }
    }

    /// A provider whose factory already returns type-erased values.
    pub fn from_factory(factory: Callable) -> Self {
        Self {
            factory,
            cacheable: true,
            singleton: false,
            _marker: PhantomData,
        }
    }

    /// Computes the value once at startup.
    #[must_use]
    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    /// Recomputes the value on every use.
    #[must_use]
    pub fn uncached(mut self) -> Self {
        self.cacheable = false;
        self
    }
}

impl<T: Any + Send + Sync> Component for Provider<T> {
    fn cacheable(&self) -> bool {
        self.cacheable
    }

    fn singleton(&self) -> bool {
        self.singleton
    }

    fn claims(&self, parameter: &Parameter) -> bool {
        parameter.is::<T>()
    }

    fn resolve(&self) -> Callable {
        self.factory.clone()
    }

    fn name(&self) -> &str {
        self.factory.name()
    }
}

impl<T> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("type", &type_name::<T>())
            .field("cacheable", &self.cacheable)
            .field("singleton", &self.singleton)
            .finish_non_exhaustive()
    }
}
