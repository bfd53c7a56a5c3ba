//! The per-request resolver.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::callable::{Arguments, Callable};
use super::component::Component;
use super::instances::{InstanceKey, InstanceMap};
use super::parameter::Parameter;
use super::value::Value;
use crate::error::{KilnError, KilnResult};

/// How deep component factories may nest before resolution is abandoned.
/// Only a component that, directly or not, depends on itself gets here.
const MAX_DEPTH: usize = 64;

/// Fills in the parameters of callables for one request.
///
/// For each parameter that the caller did not supply, in order:
///
/// 1. a [`Parameter`] parameter receives the descriptor of the parameter
///    being resolved one level up;
/// 2. a `Resolver` parameter receives this resolver;
/// 3. an exact-type instance (request values seeded by the pipeline,
///    startup instances) is used as is;
/// 4. otherwise the first component that claims the parameter provides
///    it, from the cache if present, or by resolving and calling its
///    factory and caching the result when the component is cacheable;
/// 5. otherwise resolution fails with
///    [`KilnError::DependencyResolution`].
///
/// Cloning a resolver yields a handle to the same request state. The
/// singleton map is shared read-only; everything computed during the
/// request lands in the resolver's own instance map.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<Inner>,
}

struct Inner {
    components: RwLock<Vec<Arc<dyn Component>>>,
    singletons: Arc<InstanceMap>,
    instances: Mutex<InstanceMap>,
}

impl Resolver {
    /// Creates a standalone resolver with no singletons.
    pub fn new(components: Vec<Arc<dyn Component>>, instances: InstanceMap) -> Self {
        Self::with_singletons(components, Arc::new(InstanceMap::new()), instances)
    }

    pub(crate) fn with_singletons(
        components: Vec<Arc<dyn Component>>,
        singletons: Arc<InstanceMap>,
        instances: InstanceMap,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                components: RwLock::new(components),
                singletons,
                instances: Mutex::new(instances),
            }),
        }
    }

    /// Appends a component visible to this resolver only.
    ///
    /// Request-scoped components such as matched path parameters are
    /// added this way; they are checked after every registered component.
    pub fn add_component(&self, component: Arc<dyn Component>) {
        self.inner.components.write().push(component);
    }

    /// Stores an exact-type instance for the rest of this request.
    pub fn insert_instance(&self, key: InstanceKey, value: Value) {
        self.inner.instances.lock().insert_value(key, value);
    }

    /// Binds `callable` to this resolver. Arguments are resolved when the
    /// returned thunk is called.
    #[must_use]
    pub fn resolve<O: 'static>(&self, callable: &Callable<O>) -> Resolved<O> {
        Resolved {
            resolver: self.clone(),
            callable: callable.clone(),
            provided: Arguments::new(),
        }
    }

    /// Resolves and calls `callable` in one step.
    pub fn call<O: 'static>(&self, callable: &Callable<O>) -> KilnResult<O> {
        self.invoke(callable, None, Arguments::new(), 0)
    }

    /// Looks up a value by key, request instances first.
    #[must_use]
    pub fn instance(&self, key: &InstanceKey) -> Option<Value> {
        let local = self.inner.instances.lock().value(key).cloned();
        local.or_else(|| self.inner.singletons.value(key).cloned())
    }

    /// A snapshot of what this request has computed so far.
    #[must_use]
    pub fn instances(&self) -> InstanceMap {
        self.inner.instances.lock().clone()
    }

    fn invoke<O: 'static>(
        &self,
        callable: &Callable<O>,
        resolving: Option<&Parameter>,
        mut args: Arguments,
        depth: usize,
    ) -> KilnResult<O> {
        for parameter in callable.parameters() {
            if args.contains(parameter.name()) {
                continue;
            }
            if let Some(value) = self.resolve_parameter(parameter, callable.name(), resolving, depth)? {
                args.insert(parameter.name(), value);
            }
        }
        callable.call(&args)
    }

    fn resolve_parameter(
        &self,
        parameter: &Parameter,
        function: &str,
        resolving: Option<&Parameter>,
        depth: usize,
    ) -> KilnResult<Option<Value>> {
        if parameter.is::<Parameter>() {
            return Ok(Some(resolving.map_or_else(Value::none, |p| Value::new(p.clone()))));
        }

        if parameter.is::<Resolver>() {
            return Ok(Some(Value::new(self.clone())));
        }

        if let Some(value) = self.instance(&InstanceKey::Type(parameter.type_id())) {
            return Ok(Some(value));
        }

        let component = self
            .inner
            .components
            .read()
            .iter()
            .find(|component| component.claims(parameter))
            .cloned();

        let Some(component) = component else {
            if parameter.has_default() {
                return Ok(None);
            }
            return Err(KilnError::dependency(parameter.to_string(), function));
        };

        let key = InstanceKey::component(&component);
        if let Some(value) = self.instance(&key) {
            return Ok(Some(value));
        }

        if depth >= MAX_DEPTH {
            return Err(KilnError::dependency(
                parameter.to_string(),
                format!("{function} (component '{}' depends on itself)", component.name()),
            ));
        }

        let factory = component.resolve();
        let value = self.invoke(&factory, Some(parameter), Arguments::new(), depth + 1)?;
        if component.cacheable() {
            self.insert_instance(key, value.clone());
        }
        Ok(Some(value))
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("components", &self.inner.components.read().len())
            .field("instances", &*self.inner.instances.lock())
            .field("singletons", &self.inner.singletons)
            .finish()
    }
}

/// A callable bound to a resolver: the zero-argument thunk returned by
/// [`Resolver::resolve`].
pub struct Resolved<O> {
    resolver: Resolver,
    callable: Callable<O>,
    provided: Arguments,
}

impl<O> Clone for Resolved<O> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            callable: self.callable.clone(),
            provided: self.provided.clone(),
        }
    }
}

impl<O> fmt::Debug for Resolved<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("callable", &self.callable)
            .field("provided", &self.provided)
            .finish_non_exhaustive()
    }
}

impl<O: 'static> Resolved<O> {
    /// Supplies an argument up front; it is not resolved.
    #[must_use]
    pub fn provide(mut self, name: impl Into<String>, value: Value) -> Self {
        self.provided.insert(name, value);
        self
    }

    /// Resolves the remaining parameters and calls the function.
    pub fn call(&self) -> KilnResult<O> {
        self.resolver
            .invoke(&self.callable, None, self.provided.clone(), 0)
    }

    /// The bound callable's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.callable.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::component::Provider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(usize);

    #[derive(Clone)]
    struct Label(String);

    struct LabelComponent;

    impl Component for LabelComponent {
        fn cacheable(&self) -> bool {
            false
        }

        fn claims(&self, parameter: &Parameter) -> bool {
            parameter.is::<Label>()
        }

        fn resolve(&self) -> Callable {
            Callable::builder("LabelComponent::resolve")
                .param::<Parameter>("parameter")
                .build(|args| {
                    let parameter = args.shared::<Parameter>("parameter")?;
                    Ok(Label(parameter.name().replace('_', "-")))
                })
                .into_factory()
        }
    }

    fn counting_provider(calls: &Arc<AtomicUsize>) -> Arc<dyn Component> {
        let calls = Arc::clone(calls);
        Arc::new(Provider::<Counter>::new(Callable::builder("counter").build(
            move |_| Ok(Counter(calls.fetch_add(1, Ordering::SeqCst))),
        )))
    }

    #[test]
    fn test_exact_instance_wins_over_components() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut instances = InstanceMap::new();
        instances.insert(Counter(99));
        let resolver = Resolver::new(vec![counting_provider(&calls)], instances);

        let handler = Callable::builder("handler")
            .param::<Counter>("counter")
            .build(|args| Ok(args.shared::<Counter>("counter")?.0));

        assert_eq!(resolver.call(&handler).unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cacheable_component_computed_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = Resolver::new(vec![counting_provider(&calls)], InstanceMap::new());

        let handler = Callable::builder("handler")
            .param::<Counter>("a")
            .param::<Counter>("b")
            .build(|args| {
                let a = args.shared::<Counter>("a")?;
                let b = args.shared::<Counter>("b")?;
                Ok(Arc::ptr_eq(&a, &b))
            });

        assert!(resolver.call(&handler).unwrap());
        assert!(resolver.call(&handler).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_uncacheable_component_sees_parameter() {
        let resolver = Resolver::new(vec![Arc::new(LabelComponent)], InstanceMap::new());

        let handler = Callable::builder("handler")
            .param::<Label>("content_type")
            .param::<Label>("x_request_id")
            .build(|args| {
                Ok((
                    args.get::<Label>("content_type")?.0,
                    args.get::<Label>("x_request_id")?.0,
                ))
            });

        let (a, b) = resolver.call(&handler).unwrap();
        assert_eq!(a, "content-type");
        assert_eq!(b, "x-request-id");
        assert!(resolver.instances().is_empty());
    }

    #[test]
    fn test_parameter_outside_component_is_none() {
        let resolver = Resolver::new(Vec::new(), InstanceMap::new());
        let handler = Callable::builder("handler")
            .param::<Parameter>("parameter")
            .build(|args| Ok(args.optional_shared::<Parameter>("parameter")?.is_none()));
        assert!(resolver.call(&handler).unwrap());
    }

    #[test]
    fn test_resolver_injects_itself() {
        let resolver = Resolver::new(vec![Arc::new(LabelComponent)], InstanceMap::new());

        let inner = Callable::builder("inner")
            .param::<Label>("accept")
            .build(|args| Ok(args.get::<Label>("accept")?.0));
        let outer = Callable::builder("outer")
            .param::<Resolver>("resolver")
            .build(move |args| args.shared::<Resolver>("resolver")?.call(&inner));

        assert_eq!(resolver.call(&outer).unwrap(), "accept");
    }

    #[test]
    fn test_missing_dependency_names_parameter() {
        let resolver = Resolver::new(Vec::new(), InstanceMap::new());
        let handler = Callable::builder("list_accounts")
            .param::<Counter>("accounts")
            .build(|_| Ok(()));

        let err = resolver.call(&handler).unwrap_err();
        match err {
            KilnError::DependencyResolution { parameter, function } => {
                assert_eq!(parameter, "accounts: Counter");
                assert_eq!(function, "list_accounts");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_parameters_left_unset() {
        let resolver = Resolver::new(Vec::new(), InstanceMap::new());
        let handler = Callable::builder("page")
            .parameter(Parameter::new::<u32>("page").with_default())
            .build(|args| Ok(args.optional::<u32>("page")?.unwrap_or(1)));
        assert_eq!(resolver.call(&handler).unwrap(), 1);
    }

    #[test]
    fn test_provided_arguments_are_not_resolved() {
        let resolver = Resolver::new(Vec::new(), InstanceMap::new());
        let handler = Callable::builder("handler")
            .param::<Counter>("counter")
            .build(|args| Ok(args.shared::<Counter>("counter")?.0));

        let thunk = resolver
            .resolve(&handler)
            .provide("counter", Value::new(Counter(3)));
        assert_eq!(thunk.call().unwrap(), 3);
        assert_eq!(thunk.name(), "handler");
    }

    #[test]
    fn test_added_components_are_visible() {
        let resolver = Resolver::new(Vec::new(), InstanceMap::new());
        let handler = Callable::builder("handler")
            .param::<Label>("x_token")
            .build(|args| Ok(args.get::<Label>("x_token")?.0));

        assert!(resolver.call(&handler).is_err());
        resolver.add_component(Arc::new(LabelComponent));
        assert_eq!(resolver.call(&handler).unwrap(), "x-token");
    }

    #[test]
    fn test_self_dependent_component_fails() {
        struct Loop;

        impl Component for Loop {
            fn claims(&self, parameter: &Parameter) -> bool {
                parameter.is::<Counter>()
            }

            fn resolve(&self) -> Callable {
                Callable::builder("Loop::resolve")
                    .param::<Counter>("again")
                    .build(|_| Ok(Value::none()))
            }
        }

        let resolver = Resolver::new(vec![Arc::new(Loop)], InstanceMap::new());
        let handler = Callable::builder("handler")
            .param::<Counter>("counter")
            .build(|_| Ok(()));
        assert!(matches!(
            resolver.call(&handler),
            Err(KilnError::DependencyResolution { .. })
        ));
    }
}
