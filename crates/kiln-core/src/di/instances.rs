//! Instance maps: values already computed for a resolver.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::component::{Component, ComponentId};
use super::value::Value;

/// What an instance is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceKey {
    /// An exact-type instance, such as the current request.
    Type(TypeId),
    /// The cached result of a component.
    Component(ComponentId),
}

impl InstanceKey {
    /// The key for exact-type instances of `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self::Type(TypeId::of::<T>())
    }

    /// The key for `component`'s cached result.
    #[must_use]
    pub fn component(component: &Arc<dyn Component>) -> Self {
        Self::Component(ComponentId::of(component))
    }
}

/// A map from types or component identities to computed values.
///
/// # Example
///
/// ```rust
/// use kiln_core::InstanceMap;
/// use std::sync::Arc;
///
/// struct AppName(&'static str);
///
/// let mut instances = InstanceMap::new();
/// instances.insert(AppName("kiln"));
///
/// let name: Arc<AppName> = instances.get::<AppName>().unwrap();
/// assert_eq!(name.0, "kiln");
/// assert!(instances.contains::<AppName>());
/// ```
#[derive(Clone, Default)]
pub struct InstanceMap {
    values: HashMap<InstanceKey, Value>,
}

impl InstanceMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` as the exact-type instance of `T`.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.insert(InstanceKey::of::<T>(), Value::new(value));
    }

    /// Stores an already shared `T`.
    pub fn insert_shared<T: Any + Send + Sync>(&mut self, value: Arc<T>) {
        self.values.insert(InstanceKey::of::<T>(), Value::shared(value));
    }

    /// Stores a value under an arbitrary key.
    pub fn insert_value(&mut self, key: InstanceKey, value: Value) {
        self.values.insert(key, value);
    }

    /// The exact-type instance of `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.values.get(&InstanceKey::of::<T>())?.downcast::<T>()
    }

    /// The value stored under `key`.
    #[must_use]
    pub fn value(&self, key: &InstanceKey) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether an exact-type instance of `T` is stored.
    #[must_use]
    pub fn contains<T: Any>(&self) -> bool {
        self.values.contains_key(&InstanceKey::of::<T>())
    }

    /// Whether anything is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &InstanceKey) -> bool {
        self.values.contains_key(key)
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for InstanceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceMap")
            .field("instance_count", &self.values.len())
            .finish()
    }
}
