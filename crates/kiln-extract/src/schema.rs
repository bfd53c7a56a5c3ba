//! Schema loading for request data.
//!
//! A schema is a plain struct that knows how to load itself from the
//! parsed request body. Loading goes through a [`Loader`], which
//! validates every declared [`Field`] and collects all failures into a
//! single [`ValidationError`] instead of stopping at the first one.
//!
//! ```rust
//! use kiln_core::ValidationError;
//! use kiln_extract::{Field, Loader, Schema};
//! use serde_json::{json, Value};
//!
//! struct Todo {
//!     title: String,
//!     priority: Option<i64>,
//! }
//!
//! impl Schema for Todo {
//!     fn load(data: &Value) -> Result<Self, ValidationError> {
//!         let mut loader = Loader::new(data);
//!         let title = loader.field(Field::<String>::new("title").min_length(1));
//!         let priority = loader.field(Field::<Option<i64>>::new("priority").minimum(0));
//!         loader.finish(|| Some(Self { title: title?, priority: priority? }))
//!     }
//! }
//!
//! let todo = Todo::load(&json!({"title": "ship it"})).unwrap();
//! assert_eq!(todo.priority, None);
//!
//! let errors = Todo::load(&json!({"priority": -1})).err().unwrap();
//! assert_eq!(errors.to_json(), json!({
//!     "title": "this field is required",
//!     "priority": "value must be >= 0",
//! }));
//! ```

use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use indexmap::IndexMap;
use kiln_core::{Callable, Component, KilnError, Parameter, ValidationError, Value};
use serde_json::{Map, Value as Json};

use crate::body::RequestData;

/// A type that can be loaded and validated from request data.
pub trait Schema: Sized + Send + Sync + 'static {
    /// Loads an instance from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns every field that failed to validate.
    fn load(data: &Json) -> Result<Self, ValidationError>;
}

/// Why a single field failed.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    /// A message for the field itself.
    Message(String),
    /// Reasons for the items or fields nested inside it.
    Nested(ValidationError),
}

impl FieldError {
    /// A plain message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => f.write_str(message),
            Self::Nested(errors) => write!(f, "{}", errors.to_json()),
        }
    }
}

/// A value a [`Field`] can hold.
pub trait FieldValue: Sized {
    /// The type validators see: the value itself, or the wrapped value
    /// for optional fields.
    type Inner;

    /// Converts a non-null JSON value.
    ///
    /// # Errors
    ///
    /// Fails when the value has the wrong shape.
    fn from_json(value: &Json) -> Result<Self, FieldError>;

    /// The value for an explicit `null`.
    ///
    /// # Errors
    ///
    /// Fails unless the field is optional.
    fn from_null() -> Result<Self, FieldError> {
        Err(FieldError::message("this field cannot be null"))
    }

    /// The value for a missing field without a default.
    fn when_missing() -> Option<Self> {
        None
    }

    /// The value validators run against, if any.
    fn present(&self) -> Option<&Self::Inner>;
}

/// The name of a JSON value's type in error messages.
fn kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "NoneType",
        Json::Bool(_) => "bool",
        Json::Number(n) if n.is_f64() => "float",
        Json::Number(_) => "int",
        Json::String(_) => "str",
        Json::Array(_) => "list",
        Json::Object(_) => "dict",
    }
}

fn unexpected(value: &Json) -> FieldError {
    FieldError::Message(format!("unexpected type {}", kind(value)))
}

macro_rules! plain_field_value {
    ($($ty:ty => $convert:expr),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                type Inner = Self;

                fn from_json(value: &Json) -> Result<Self, FieldError> {
                    let convert: fn(&Json) -> Option<Self> = $convert;
                    convert(value).ok_or_else(|| unexpected(value))
                }

                fn present(&self) -> Option<&Self> {
                    Some(self)
                }
            }
        )*
    };
}

plain_field_value! {
    String => |v| v.as_str().map(str::to_string),
    bool => Json::as_bool,
    i64 => Json::as_i64,
    i32 => |v| v.as_i64().and_then(|n| i32::try_from(n).ok()),
    u64 => Json::as_u64,
    u32 => |v| v.as_u64().and_then(|n| u32::try_from(n).ok()),
    f64 => Json::as_f64,
    Json => |v| Some(v.clone()),
}

impl<T: FieldValue> FieldValue for Option<T> {
    type Inner = T::Inner;

    fn from_json(value: &Json) -> Result<Self, FieldError> {
        T::from_json(value).map(Some)
    }

    fn from_null() -> Result<Self, FieldError> {
        Ok(None)
    }

    fn when_missing() -> Option<Self> {
        Some(None)
    }

    fn present(&self) -> Option<&Self::Inner> {
        self.as_ref().and_then(FieldValue::present)
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    type Inner = Self;

    fn from_json(value: &Json) -> Result<Self, FieldError> {
        let Json::Array(items) = value else {
            return Err(FieldError::message("value must be a list"));
        };

        let mut errors = ValidationError::new();
        let mut loaded = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match load_value::<T>(item) {
                Ok(item) => loaded.push(item),
                Err(error) => record(&mut errors, index.to_string(), error),
            }
        }
        errors.into_result().map_err(FieldError::Nested)?;
        Ok(loaded)
    }

    fn present(&self) -> Option<&Self> {
        Some(self)
    }
}

impl<T: FieldValue> FieldValue for BTreeMap<String, T> {
    type Inner = Self;

    fn from_json(value: &Json) -> Result<Self, FieldError> {
        let Json::Object(entries) = value else {
            return Err(FieldError::message("value must be a dict"));
        };

        let mut errors = ValidationError::new();
        let mut loaded = BTreeMap::new();
        for (name, item) in entries {
            match load_value::<T>(item) {
                Ok(item) => {
                    loaded.insert(name.clone(), item);
                }
                Err(error) => record(&mut errors, name.clone(), error),
            }
        }
        errors.into_result().map_err(FieldError::Nested)?;
        Ok(loaded)
    }

    fn present(&self) -> Option<&Self> {
        Some(self)
    }
}

/// A field holding another schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Nested<S>(pub S);

impl<S> Deref for Nested<S> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: Schema> FieldValue for Nested<S> {
    type Inner = Self;

    fn from_json(value: &Json) -> Result<Self, FieldError> {
        if !value.is_object() {
            return Err(FieldError::message("value must be a dict"));
        }
        S::load(value).map(Nested).map_err(FieldError::Nested)
    }

    fn present(&self) -> Option<&Self> {
        Some(self)
    }
}

fn load_value<T: FieldValue>(value: &Json) -> Result<T, FieldError> {
    if value.is_null() {
        T::from_null()
    } else {
        T::from_json(value)
    }
}

fn record(errors: &mut ValidationError, name: String, error: FieldError) {
    match error {
        FieldError::Message(message) => errors.add(name, message),
        FieldError::Nested(nested) => errors.add_nested(name, nested),
    }
}

/// Things with a length, for `min_length`/`max_length`.
pub trait Measure {
    /// The length used by length checks.
    fn measure(&self) -> usize;
}

impl Measure for String {
    fn measure(&self) -> usize {
        self.chars().count()
    }
}

impl<T> Measure for Vec<T> {
    fn measure(&self) -> usize {
        self.len()
    }
}

impl<T> Measure for BTreeMap<String, T> {
    fn measure(&self) -> usize {
        self.len()
    }
}

type Validator<I> = Box<dyn Fn(&I) -> Result<(), String>>;

/// A declared schema field.
pub struct Field<T: FieldValue> {
    name: &'static str,
    request_name: Option<&'static str>,
    default: Option<T>,
    validators: Vec<Validator<T::Inner>>,
}

impl<T: FieldValue> Field<T> {
    /// A field read from the request key `name`.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            request_name: None,
            default: None,
            validators: Vec::new(),
        }
    }

    /// Reads the field from a different request key.
    #[must_use]
    pub fn request_name(mut self, request_name: &'static str) -> Self {
        self.request_name = Some(request_name);
        self
    }

    /// The value used when the field is missing.
    #[must_use]
    pub fn default(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }

    /// Adds a custom check on the present value.
    #[must_use]
    pub fn validate<F>(mut self, check: F) -> Self
    where
        F: Fn(&T::Inner) -> Result<(), String> + 'static,
    {
        self.validators.push(Box::new(check));
        self
    }

    /// The field's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The request key the field is read from.
    #[must_use]
    pub fn key(&self) -> &'static str {
        self.request_name.unwrap_or(self.name)
    }

    /// Validates a raw value, which is `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns why the value was rejected.
    pub fn load(self, value: Option<&Json>) -> Result<T, FieldError> {
        let loaded = match value {
            None => {
                return self
                    .default
                    .or_else(T::when_missing)
                    .ok_or_else(|| FieldError::message("this field is required"));
            }
            Some(value) => load_value::<T>(value)?,
        };

        if let Some(inner) = loaded.present() {
            for check in &self.validators {
                check(inner).map_err(FieldError::Message)?;
            }
        }
        Ok(loaded)
    }
}

impl<T> Field<T>
where
    T: FieldValue,
    T::Inner: Measure,
{
    /// Rejects values shorter than `min`.
    #[must_use]
    pub fn min_length(self, min: usize) -> Self {
        self.validate(move |value| {
            if value.measure() < min {
                return Err(format!("length must be >= {min}"));
            }
            Ok(())
        })
    }

    /// Rejects values longer than `max`.
    #[must_use]
    pub fn max_length(self, max: usize) -> Self {
        self.validate(move |value| {
            if value.measure() > max {
                return Err(format!("length must be <= {max}"));
            }
            Ok(())
        })
    }
}

impl<T> Field<T>
where
    T: FieldValue,
    T::Inner: PartialOrd + fmt::Display + 'static,
{
    /// Rejects values below `min`.
    #[must_use]
    pub fn minimum(self, min: T::Inner) -> Self {
        self.validate(move |value| {
            if *value < min {
                return Err(format!("value must be >= {min}"));
            }
            Ok(())
        })
    }

    /// Rejects values above `max`.
    #[must_use]
    pub fn maximum(self, max: T::Inner) -> Self {
        self.validate(move |value| {
            if *value > max {
                return Err(format!("value must be <= {max}"));
            }
            Ok(())
        })
    }
}

impl<T> Field<T>
where
    T: FieldValue,
    T::Inner: PartialEq + fmt::Debug + 'static,
{
    /// Only accepts one of `choices`.
    #[must_use]
    pub fn choices<I, C>(self, choices: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<T::Inner>,
    {
        let choices: Vec<T::Inner> = choices.into_iter().map(Into::into).collect();
        self.validate(move |value| {
            if choices.contains(value) {
                return Ok(());
            }
            let listed: Vec<String> = choices.iter().map(|choice| format!("{choice:?}")).collect();
            Err(format!("must be one of: {}", listed.join(", ")))
        })
    }
}

impl<T: FieldValue> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("request_name", &self.request_name)
            .field("has_default", &self.default.is_some())
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// Loads fields out of a JSON object, collecting failures.
#[derive(Debug)]
pub struct Loader<'a> {
    data: Option<&'a Map<String, Json>>,
    errors: ValidationError,
}

impl<'a> Loader<'a> {
    /// Starts loading `data`, which must be an object.
    #[must_use]
    pub fn new(data: &'a Json) -> Self {
        let mut errors = ValidationError::new();
        let data = data.as_object();
        if data.is_none() {
            errors.add("_schema", "expected an object");
        }
        Self { data, errors }
    }

    /// Loads one field, recording its failure under the request key.
    pub fn field<T: FieldValue>(&mut self, field: Field<T>) -> Option<T> {
        let data = self.data?;
        let key = field.key();
        match field.load(data.get(key)) {
            Ok(value) => Some(value),
            Err(error) => {
                record(&mut self.errors, key.to_string(), error);
                None
            }
        }
    }

    /// Builds the schema if every field loaded.
    ///
    /// # Errors
    ///
    /// Returns all collected field failures.
    pub fn finish<S, F>(self, build: F) -> Result<S, ValidationError>
    where
        F: FnOnce() -> Option<S>,
    {
        self.errors.into_result()?;
        build().ok_or_else(|| ValidationError::field("_schema", "incomplete schema"))
    }
}

type LoadFn = fn(&Json) -> Result<Value, ValidationError>;

fn load_schema<S: Schema>(data: &Json) -> Result<Value, ValidationError> {
    S::load(data).map(Value::new)
}

/// Provides registered [`Schema`] types loaded from [`RequestData`].
///
/// Not cacheable: each parameter may ask for a different schema.
#[derive(Clone, Default)]
pub struct SchemaComponent {
    loaders: IndexMap<TypeId, (&'static str, LoadFn)>,
}

impl SchemaComponent {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `S` injectable.
    #[must_use]
    pub fn register<S: Schema>(mut self) -> Self {
        self.loaders
            .insert(TypeId::of::<S>(), (std::any::type_name::<S>(), load_schema::<S>));
        self
    }

    /// Whether no schema is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

impl fmt::Debug for SchemaComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.loaders.values().map(|(name, _)| name))
            .finish()
    }
}

impl Component for SchemaComponent {
    fn cacheable(&self) -> bool {
        false
    }

    fn claims(&self, parameter: &Parameter) -> bool {
        self.loaders.contains_key(&parameter.type_id())
    }

    fn resolve(&self) -> Callable {
        let loaders = self.loaders.clone();
        Callable::builder("SchemaComponent::resolve")
            .param::<Parameter>("parameter")
            .param::<RequestData>("data")
            .build(move |args| {
                let parameter = args.shared::<Parameter>("parameter")?;
                let data = args.shared::<RequestData>("data")?;
                let Some((_, load)) = loaders.get(&parameter.type_id()) else {
                    return Err(KilnError::dependency(parameter.to_string(), "SchemaComponent::resolve"));
                };
                load(data.fields()).map_err(|errors| KilnError::bad_request(errors.to_json()))
            })
    }
}
