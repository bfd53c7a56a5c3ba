//! Startup singleton bootstrap and per-request resolver creation.

use std::fmt;
use std::sync::Arc;

use super::component::Component;
use super::instances::{InstanceKey, InstanceMap};
use super::resolver::Resolver;
use crate::error::KilnResult;

/// Owns the component registry and the singleton map.
///
/// Construction resolves every singleton component in registration order,
/// each with a throwaway resolver. Singletons that another singleton pulls
/// in along the way are kept too, so dependency order between singletons
/// never depends on registration order. Once built, the singleton map is
/// frozen and shared read-only with every request.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use kiln_core::{Callable, Component, DependencyInjector, InstanceMap, Provider};
///
/// struct Settings;
///
/// let settings: Arc<dyn Component> = Arc::new(
///     Provider::<Settings>::new(Callable::builder("settings").build(|_| Ok(Settings))).singleton(),
/// );
/// let injector = DependencyInjector::new(vec![settings]).unwrap();
///
/// let handler = Callable::builder("handler")
///     .param::<Settings>("settings")
///     .build(|args| args.shared::<Settings>("settings"));
///
/// let first = injector.get_resolver(InstanceMap::new()).call(&handler).unwrap();
/// let second = injector.get_resolver(InstanceMap::new()).call(&handler).unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
/// ```
pub struct DependencyInjector {
    components: Vec<Arc<dyn Component>>,
    singletons: Arc<InstanceMap>,
}

impl DependencyInjector {
    /// Builds the registry and bootstraps its singletons.
    ///
    /// # Errors
    ///
    /// Fails with the first error raised while resolving a singleton.
    pub fn new(components: Vec<Arc<dyn Component>>) -> KilnResult<Self> {
        Self::with_instances(components, InstanceMap::new())
    }

    /// Like [`new`](Self::new), with exact-type instances that every
    /// resolver (singleton bootstrap included) can inject.
    pub fn with_instances(
        components: Vec<Arc<dyn Component>>,
        instances: InstanceMap,
    ) -> KilnResult<Self> {
        let mut singletons = instances;

        for component in components.iter().filter(|c| c.singleton()) {
            let key = InstanceKey::component(component);
            if singletons.contains_key(&key) {
                continue;
            }

            let resolver = Resolver::with_singletons(
                components.clone(),
                Arc::new(singletons.clone()),
                InstanceMap::new(),
            );
            let value = resolver.call(&component.resolve())?;
            singletons.insert_value(key, value);

            let computed = resolver.instances();
            for other in components.iter().filter(|c| c.singleton()) {
                let other_key = InstanceKey::component(other);
                if singletons.contains_key(&other_key) {
                    continue;
                }
                if let Some(value) = computed.value(&other_key) {
                    singletons.insert_value(other_key, value.clone());
                }
            }

            tracing::debug!(component = component.name(), "singleton component resolved");
        }

        Ok(Self {
            components,
            singletons: Arc::new(singletons),
        })
    }

    /// A fresh resolver for one request, seeded with `instances`.
    #[must_use]
    pub fn get_resolver(&self, instances: InstanceMap) -> Resolver {
        Resolver::with_singletons(
            self.components.clone(),
            Arc::clone(&self.singletons),
            instances,
        )
    }

    /// The registered components, in order.
    #[must_use]
    pub fn components(&self) -> &[Arc<dyn Component>] {
        &self.components
    }

    /// The frozen singleton map.
    #[must_use]
    pub fn singletons(&self) -> &InstanceMap {
        &self.singletons
    }
}

impl fmt::Debug for DependencyInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyInjector")
            .field(
                "components",
                &self.components.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("singletons", &self.singletons)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::callable::Callable;
    use crate::di::component::Provider;
    use crate::error::KilnError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Settings;

    fn settings(calls: &Arc<AtomicUsize>) -> Arc<dyn Component> {
        let calls = Arc::clone(calls);
        Arc::new(
            Provider::<Settings>::new(Callable::builder("settings").build(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Settings)
            }))
            .singleton(),
        )
    }

    #[test]
    fn test_singletons_resolved_eagerly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let injector = DependencyInjector::new(vec![settings(&calls)]).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(injector.singletons().len(), 1);

        let handler = Callable::builder("handler")
            .param::<Settings>("settings")
            .build(|_| Ok(()));
        for _ in 0..3 {
            injector.get_resolver(InstanceMap::new()).call(&handler).unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_singleton_failure_fails_construction() {
        let broken: Arc<dyn Component> = Arc::new(
            Provider::<Settings>::new(
                Callable::builder("settings").build(|_| Err(KilnError::internal("no config"))),
            )
            .singleton(),
        );
        let err = DependencyInjector::new(vec![broken]).unwrap_err();
        assert_eq!(err.to_string(), "no config");
    }

    #[test]
    fn test_startup_instances_visible_to_singletons() {
        struct AppName(&'static str);
        struct Banner(String);

        let banner: Arc<dyn Component> = Arc::new(
            Provider::<Banner>::new(
                Callable::builder("banner")
                    .param::<AppName>("app_name")
                    .build(|args| Ok(Banner(format!("welcome to {}", args.shared::<AppName>("app_name")?.0)))),
            )
            .singleton(),
        );
        let mut instances = InstanceMap::new();
        instances.insert(AppName("kiln"));

        let injector = DependencyInjector::with_instances(vec![banner], instances).unwrap();
        let handler = Callable::builder("handler")
            .param::<Banner>("banner")
            .build(|args| Ok(args.shared::<Banner>("banner")?.0.clone()));
        let text = injector.get_resolver(InstanceMap::new()).call(&handler).unwrap();
        assert_eq!(text, "welcome to kiln");
    }
}
