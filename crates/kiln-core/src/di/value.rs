//! Type-erased resolved values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A resolved value, or the absence of one for an optional parameter.
///
/// Values are reference counted, so caching a value in an instance map
/// and handing it to several handlers shares one instance.
#[derive(Clone, Default)]
pub struct Value(Option<Arc<dyn Any + Send + Sync>>);

impl Value {
    /// Wraps an owned value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::shared(Arc::new(value))
    }

    /// Wraps an already shared value without cloning it.
    pub fn shared<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        let value: Arc<dyn Any + Send + Sync> = value;
        Self(Some(value))
    }

    /// The absent value, injected for optional parameters.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    /// Whether this is the absent value.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Whether this holds a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.0.as_ref().is_some_and(|value| (**value).is::<T>())
    }

    /// Returns the shared `T`, if this holds one.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.clone()?.downcast::<T>().ok()
    }

    /// Whether two values are the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("Value(..)"),
            None => f.write_str("Value(None)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast() {
        let value = Value::new(42_i64);
        assert!(value.is::<i64>());
        assert!(!value.is::<i32>());
        assert_eq!(value.downcast::<i64>().as_deref(), Some(&42));
        assert!(value.downcast::<String>().is_none());
    }

    #[test]
    fn test_none() {
        let value = Value::none();
        assert!(value.is_none());
        assert!(!value.is::<i64>());
        assert!(value.downcast::<i64>().is_none());
    }

    #[test]
    fn test_ptr_eq() {
        let shared = Arc::new(String::from("x"));
        let a = Value::shared(Arc::clone(&shared));
        let b = Value::shared(shared);
        assert!(a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&Value::new(String::from("x"))));
    }
}
