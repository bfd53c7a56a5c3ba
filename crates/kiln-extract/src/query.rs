//! Query parameter injection.

use std::ops::Deref;

use kiln_core::{Callable, Component, KilnError, Parameter, QueryParams, Value};
use serde_json::json;

/// The last value of a single query parameter, picked by parameter name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam(pub String);

impl QueryParam {
    /// Returns the value as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the param and returns the inner String.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for QueryParam {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Provides [`QueryParam`] parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParamComponent;

impl Component for QueryParamComponent {
    fn cacheable(&self) -> bool {
        false
    }

    fn claims(&self, parameter: &Parameter) -> bool {
        parameter.is::<QueryParam>()
    }

    fn resolve(&self) -> Callable {
        Callable::builder("QueryParamComponent::resolve")
            .param::<Parameter>("parameter")
            .param::<QueryParams>("params")
            .build(|args| {
                let parameter = args.shared::<Parameter>("parameter")?;
                let params = args.shared::<QueryParams>("params")?;

                match params.get(parameter.name()) {
                    Some(value) => Ok(Value::new(QueryParam(value.to_string()))),
                    None if parameter.is_optional() => Ok(Value::none()),
                    None => Err(KilnError::bad_request(
                        json!({ parameter.name(): "missing" }),
                    )),
                }
            })
    }
}
