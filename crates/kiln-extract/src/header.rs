//! Header injection.

use std::ops::Deref;

use kiln_core::{Callable, Component, Headers, KilnError, Parameter, Value};
use serde_json::json;

/// The value of a single request header.
///
/// The header is picked by the parameter name, with underscores turned
/// into dashes: a parameter `content_type: Header` receives the
/// `content-type` header. Declare the parameter optional to receive
/// nothing instead of a `400` when the header is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header(pub String);

impl Header {
    /// Returns the header value as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the Header and returns the inner String.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for Header {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The request header name a parameter maps to.
#[must_use]
pub fn header_name(parameter: &Parameter) -> String {
    parameter.name().replace('_', "-")
}

/// Provides [`Header`] parameters.
///
/// Not cacheable: each parameter names a different header.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderComponent;

impl Component for HeaderComponent {
    fn cacheable(&self) -> bool {
        false
    }

    fn claims(&self, parameter: &Parameter) -> bool {
        parameter.is::<Header>()
    }

    fn resolve(&self) -> Callable {
        Callable::builder("HeaderComponent::resolve")
            .param::<Parameter>("parameter")
            .param::<Headers>("headers")
            .build(|args| {
                let parameter = args.shared::<Parameter>("parameter")?;
                let headers = args.shared::<Headers>("headers")?;
                let name = header_name(&parameter);

                match headers.get(&name) {
                    Some(value) => Ok(Value::new(Header(value.to_string()))),
                    None if parameter.is_optional() => Ok(Value::none()),
                    None => Err(KilnError::bad_request(json!({ name: "missing" }))),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{InstanceMap, Resolver};
    use std::sync::Arc;

    fn resolver(pairs: &[(&str, &str)]) -> Resolver {
        let mut instances = InstanceMap::new();
        instances.insert(Headers::from_pairs(pairs.iter().copied()).unwrap());
        Resolver::new(vec![Arc::new(HeaderComponent)], instances)
    }

    #[test]
    fn test_header_by_parameter_name() {
        let handler = Callable::builder("handler")
            .param::<Header>("x_request_id")
            .build(|args| Ok(args.get::<Header>("x_request_id")?.into_inner()));

        let value = resolver(&[("X-Request-Id", "abc")]).call(&handler).unwrap();
        assert_eq!(value, "abc");
    }

    #[test]
    fn test_missing_required_header() {
        let handler = Callable::builder("handler")
            .param::<Header>("content_type")
            .build(|_| Ok(()));

        match resolver(&[]).call(&handler).unwrap_err() {
            KilnError::Http { status, payload, .. } => {
                assert_eq!(status, http::StatusCode::BAD_REQUEST);
                assert_eq!(payload, json!({"content-type": "missing"}));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_optional_header() {
        let handler = Callable::builder("handler")
            .optional::<Header>("authorization")
            .build(|args| args.optional::<Header>("authorization"));

        assert_eq!(resolver(&[]).call(&handler).unwrap(), None);
        assert_eq!(
            resolver(&[("authorization", "Bearer x")]).call(&handler).unwrap(),
            Some(Header("Bearer x".into()))
        );
    }

    #[test]
    fn test_not_cached_between_parameters() {
        let handler = Callable::builder("handler")
            .param::<Header>("accept")
            .param::<Header>("host")
            .build(|args| Ok((args.get::<Header>("accept")?, args.get::<Header>("host")?)));

        let (accept, host) = resolver(&[("accept", "*/*"), ("host", "example.com")])
            .call(&handler)
            .unwrap();
        assert_eq!(accept.as_str(), "*/*");
        assert_eq!(&*host, "example.com");
    }
}
