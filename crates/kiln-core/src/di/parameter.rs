//! Parameter descriptors.

use std::any::{type_name, Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use super::value::Value;

/// Converts a raw string (a path parameter) into a typed [`Value`].
pub type Coerce = fn(&str) -> Option<Value>;

/// The declared type of a parameter.
///
/// Besides identity, a `TypeInfo` knows a short label used in error
/// messages (`int`, `float`, `bool`, `str`, or the bare type name) and,
/// when the type can be built from a string, how to do so.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    label: &'static str,
    coerce: Option<Coerce>,
}

macro_rules! builtin_coercions {
    ($id:expr; $($ty:ty => $label:literal),* $(,)?) => {
        $(
            if $id == TypeId::of::<$ty>() {
                let coerce: Coerce = |raw| raw.parse::<$ty>().ok().map(Value::new);
                return ($label, Some(coerce));
            }
        )*
    };
}

fn builtin<T: Any>() -> (&'static str, Option<Coerce>) {
    let id = TypeId::of::<T>();
    builtin_coercions!(id;
        i8 => "int", i16 => "int", i32 => "int", i64 => "int", i128 => "int", isize => "int",
        u8 => "int", u16 => "int", u32 => "int", u64 => "int", u128 => "int", usize => "int",
        f32 => "float", f64 => "float",
        bool => "bool",
        String => "str",
    );
    (short_name(type_name::<T>()), None)
}

fn short_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

impl TypeInfo {
    /// Describes `T`. Integers, floats, `bool` and `String` can be coerced
    /// from strings.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        let (label, coerce) = builtin::<T>();
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            label,
            coerce,
        }
    }

    /// Describes `T`, coercing from strings through its `FromStr` impl.
    #[must_use]
    pub fn parsed<T: FromStr + Any + Send + Sync>() -> Self {
        let coerce: Coerce = |raw| raw.parse::<T>().ok().map(Value::new);
        Self {
            coerce: Some(coerce),
            ..Self::of::<T>()
        }
    }

    /// The type's identity.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The full type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The short label used in error messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Builds a value from `raw`, if the type supports it.
    #[must_use]
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        self.coerce.and_then(|coerce| coerce(raw))
    }

    /// Whether this describes `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A declared parameter of an injectable function.
///
/// Components receive the descriptor in [`claims`] and may ask for it in
/// their own `resolve` callable, which is how a single header component
/// knows which header it is being asked for.
///
/// [`claims`]: crate::Component::claims
///
/// # Example
///
/// ```rust
/// use kiln_core::Parameter;
///
/// let parameter = Parameter::new::<i64>("page").optional();
/// assert_eq!(parameter.name(), "page");
/// assert!(parameter.is::<i64>());
/// assert!(parameter.is_optional());
/// assert_eq!(parameter.to_string(), "page: Option<i64>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: Cow<'static, str>,
    ty: TypeInfo,
    optional: bool,
    has_default: bool,
}

impl Parameter {
    /// A required parameter of type `T`.
    pub fn new<T: Any>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::with_type(name, TypeInfo::of::<T>())
    }

    /// A required parameter with an explicit type descriptor.
    pub fn with_type(name: impl Into<Cow<'static, str>>, ty: TypeInfo) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            has_default: false,
        }
    }

    /// Marks the parameter optional: an absent value is acceptable.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Marks the parameter as having a default; the resolver leaves it
    /// unset when nothing can provide it.
    #[must_use]
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type, unwrapped from any optional marker.
    #[must_use]
    pub fn type_info(&self) -> &TypeInfo {
        &self.ty
    }

    /// The declared type's identity.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.ty.id
    }

    /// Whether the declared type is `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.ty.is::<T>()
    }

    /// Whether the parameter is optional.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Whether the parameter has a default.
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.has_default
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = short_name(self.ty.name);
        if self.optional {
            write!(f, "{}: Option<{ty}>", self.name)
        } else {
            write!(f, "{}: {ty}", self.name)
        }
    }
}
