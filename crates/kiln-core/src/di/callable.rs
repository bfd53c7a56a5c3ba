//! Injectable callables and their arguments.

use std::any::{type_name, Any};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::parameter::Parameter;
use super::value::Value;
use crate::error::{KilnError, KilnResult};
use crate::response::Reply;

/// Values for a callable's parameters, keyed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: IndexMap<String, Value>,
}

impl Arguments {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    /// Whether a value was supplied for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The raw value for `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// A shared `T` for a required parameter.
    pub fn shared<T: Any + Send + Sync>(&self, name: &str) -> KilnResult<Arc<T>> {
        self.optional_shared(name)?.ok_or_else(|| {
            KilnError::internal(format!("argument '{name}' is missing"))
        })
    }

    /// A cloned `T` for a required parameter.
    pub fn get<T: Any + Send + Sync + Clone>(&self, name: &str) -> KilnResult<T> {
        self.shared::<T>(name).map(|value| T::clone(&value))
    }

    /// A shared `T` for an optional parameter. Absent and unset are `None`.
    pub fn optional_shared<T: Any + Send + Sync>(&self, name: &str) -> KilnResult<Option<Arc<T>>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(value) if value.is_none() => Ok(None),
            Some(value) => value.downcast::<T>().map(Some).ok_or_else(|| {
                KilnError::internal(format!(
                    "argument '{name}' is not a {}",
                    type_name::<T>()
                ))
            }),
        }
    }

    /// A cloned `T` for an optional parameter.
    pub fn optional<T: Any + Send + Sync + Clone>(&self, name: &str) -> KilnResult<Option<T>> {
        Ok(self.optional_shared::<T>(name)?.map(|value| T::clone(&value)))
    }

    /// Number of supplied values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

type CallFn<O> = dyn Fn(&Arguments) -> KilnResult<O> + Send + Sync;

/// A function together with the parameters it declares.
///
/// Handlers, middleware wrappers, component factories, parsers and
/// fallback handlers are all callables: the resolver fills in their
/// arguments before calling them. Cloning is cheap.
///
/// # Example
///
/// ```rust
/// use kiln_core::{Arguments, Callable, Value};
///
/// let greet: Callable<String> = Callable::builder("greet")
///     .param::<String>("name")
///     .build(|args| Ok(format!("hello {}", args.get::<String>("name")?)));
///
/// let args = Arguments::new().with("name", Value::new(String::from("jim")));
/// assert_eq!(greet.call(&args).unwrap(), "hello jim");
/// assert_eq!(greet.parameters()[0].name(), "name");
/// ```
pub struct Callable<O = Value> {
    name: Cow<'static, str>,
    parameters: Arc<[Parameter]>,
    func: Arc<CallFn<O>>,
}

impl<O> Clone for Callable<O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            parameters: Arc::clone(&self.parameters),
            func: Arc::clone(&self.func),
        }
    }
}

impl Callable {
    /// Starts describing a callable named `name`.
    pub fn builder(name: impl Into<Cow<'static, str>>) -> CallableBuilder {
        CallableBuilder {
            name: name.into(),
            parameters: Vec::new(),
        }
    }
}

impl<O: 'static> Callable<O> {
    /// Creates a callable from its parameters and body.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, parameters: Vec<Parameter>, func: F) -> Self
    where
        F: Fn(&Arguments) -> KilnResult<O> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: parameters.into(),
            func: Arc::new(func),
        }
    }

    /// The callable's name, used in error messages and as a route's default name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parameters, in order.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Calls the function with already resolved arguments.
    pub fn call(&self, args: &Arguments) -> KilnResult<O> {
        (self.func)(args)
    }

    /// Transforms the output, keeping name and parameters.
    #[must_use]
    pub fn map<P, F>(self, f: F) -> Callable<P>
    where
        P: 'static,
        F: Fn(O) -> P + Send + Sync + 'static,
    {
        let func = self.func;
        Callable {
            name: self.name,
            parameters: self.parameters,
            func: Arc::new(move |args: &Arguments| func(args).map(&f)),
        }
    }

    /// Turns a callable into a route handler.
    #[must_use]
    pub fn into_handler(self) -> Callable<Reply>
    where
        O: Into<Reply>,
    {
        self.map(Into::into)
    }

    /// Wraps the output as a type-erased [`Value`], as component factories return.
    #[must_use]
    pub fn into_factory(self) -> Callable<Value>
    where
        O: Any + Send + Sync,
    {
        self.map(Value::new)
    }
}

impl<O> fmt::Debug for Callable<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl<O> kiln_router::RouteHandler for Callable<O> {
    fn handler_name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`Callable`].
#[derive(Debug)]
pub struct CallableBuilder {
    name: Cow<'static, str>,
    parameters: Vec<Parameter>,
}

impl CallableBuilder {
    /// Declares a required parameter of type `T`.
    #[must_use]
    pub fn param<T: Any>(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.parameters.push(Parameter::new::<T>(name));
        self
    }

    /// Declares an optional parameter of type `T`.
    #[must_use]
    pub fn optional<T: Any>(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.parameters.push(Parameter::new::<T>(name).optional());
        self
    }

    /// Declares a fully described parameter.
    #[must_use]
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Finishes the callable.
    pub fn build<O, F>(self, func: F) -> Callable<O>
    where
        O: 'static,
        F: Fn(&Arguments) -> KilnResult<O> + Send + Sync + 'static,
    {
        Callable::new(self.name, self.parameters, func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_typed_access() {
        let args = Arguments::new()
            .with("n", Value::new(7_i64))
            .with("missing", Value::none());

        assert_eq!(args.get::<i64>("n").unwrap(), 7);
        assert!(args.get::<String>("n").is_err());
        assert!(args.get::<i64>("missing").is_err());
        assert_eq!(args.optional::<i64>("missing").unwrap(), None);
        assert_eq!(args.optional::<i64>("unset").unwrap(), None);
        assert!(args.optional::<String>("n").is_err());
    }

    #[test]
    fn test_shared_returns_same_instance() {
        let shared = Arc::new(String::from("db"));
        let args = Arguments::new().with("db", Value::shared(Arc::clone(&shared)));
        assert!(Arc::ptr_eq(&args.shared::<String>("db").unwrap(), &shared));
    }

    #[test]
    fn test_map_keeps_signature() {
        let double = Callable::builder("double")
            .param::<i64>("n")
            .build(|args| Ok(args.get::<i64>("n")? * 2))
            .map(|n| n.to_string());

        let args = Arguments::new().with("n", Value::new(21_i64));
        assert_eq!(double.call(&args).unwrap(), "42");
        assert_eq!(double.name(), "double");
        assert_eq!(double.parameters().len(), 1);
    }

    #[test]
    fn test_into_handler() {
        let handler = Callable::builder("index")
            .build(|_| Ok(serde_json::json!({"ok": true})))
            .into_handler();
        let reply = handler.call(&Arguments::new()).unwrap();
        assert_eq!(reply, Reply::ok(serde_json::json!({"ok": true})));
    }
}
