//! Request-scoped components for the matched route.
//!
//! The pipeline registers these after routing, so they only exist for
//! the lifetime of one resolver.

use std::sync::Arc;

use kiln_core::{Callable, Component, Handler, KilnError, Parameter, Value};
use kiln_router::{Params, Route};
use serde_json::json;

/// The route that matched the current request.
pub type CurrentRoute = Route<Handler>;

/// Provides path parameters by name.
///
/// Claims any parameter whose name was captured by the route template
/// and converts the raw segment through the parameter's declared type.
#[derive(Debug, Clone)]
pub struct RouteParamsComponent {
    params: Params,
}

impl RouteParamsComponent {
    /// Exposes `params` to the request's handler.
    #[must_use]
    pub fn new(params: Params) -> Self {
        Self { params }
    }
}

impl Component for RouteParamsComponent {
    fn cacheable(&self) -> bool {
        false
    }

    fn claims(&self, parameter: &Parameter) -> bool {
        self.params.contains(parameter.name())
    }

    fn resolve(&self) -> Callable {
        let params = self.params.clone();
        Callable::builder("RouteParamsComponent::resolve")
            .param::<Parameter>("parameter")
            .build(move |args| {
                let parameter = args.shared::<Parameter>("parameter")?;
                let name = parameter.name();
                let Some(raw) = params.get(name) else {
                    return Err(KilnError::dependency(parameter.to_string(), "RouteParamsComponent::resolve"));
                };

                let ty = parameter.type_info();
                ty.coerce(raw).ok_or_else(|| {
                    KilnError::bad_request(json!({ name: format!("invalid {} value", ty.label()) }))
                })
            })
    }
}

/// Provides the matched [`Route`], or nothing when routing failed.
#[derive(Debug, Clone, Default)]
pub struct RouteComponent {
    route: Option<Arc<CurrentRoute>>,
}

impl RouteComponent {
    /// Exposes `route` to the request's handler and middleware.
    #[must_use]
    pub fn new(route: Option<Arc<CurrentRoute>>) -> Self {
        Self { route }
    }
}

impl Component for RouteComponent {
    fn claims(&self, parameter: &Parameter) -> bool {
        parameter.is::<CurrentRoute>()
    }

    fn resolve(&self) -> Callable {
        let route = self.route.clone();
        Callable::builder("RouteComponent::resolve").build(move |_| {
            Ok(route.clone().map_or_else(Value::none, Value::shared))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use kiln_core::{InstanceMap, Reply, Resolver, TypeInfo};

    fn resolver(params: &[(&str, &str)]) -> Resolver {
        let params: Params = params.iter().copied().collect();
        Resolver::new(vec![Arc::new(RouteParamsComponent::new(params))], InstanceMap::new())
    }

    #[test]
    fn test_coerces_int() {
        let handler = Callable::builder("get_item")
            .param::<i64>("n")
            .build(|args| args.get::<i64>("n"));

        assert_eq!(resolver(&[("n", "7")]).call(&handler).unwrap(), 7);
    }

    #[test]
    fn test_invalid_int_is_bad_request() {
        let handler = Callable::builder("get_item")
            .param::<i64>("n")
            .build(|args| args.get::<i64>("n"));

        let err = resolver(&[("n", "abc")]).call(&handler).unwrap_err();
        match err {
            KilnError::Http { status, payload, .. } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(payload, json!({"n": "invalid int value"}));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_string_and_float() {
        let handler = Callable::builder("h")
            .param::<String>("slug")
            .param::<f64>("ratio")
            .build(|args| Ok((args.get::<String>("slug")?, args.get::<f64>("ratio")?)));

        let (slug, ratio) = resolver(&[("slug", "a-b"), ("ratio", "0.5")])
            .call(&handler)
            .unwrap();
        assert_eq!(slug, "a-b");
        assert!((ratio - 0.5).abs() < f64::EPSILON);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Sku(String);

    impl std::str::FromStr for Sku {
        type Err = ();

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            s.strip_prefix("sku-").map(|rest| Sku(rest.to_string())).ok_or(())
        }
    }

    #[test]
    fn test_parsed_type() {
        let handler = Callable::builder("h")
            .parameter(Parameter::with_type("sku", TypeInfo::parsed::<Sku>()))
            .build(|args| args.get::<Sku>("sku"));

        assert_eq!(
            resolver(&[("sku", "sku-42")]).call(&handler).unwrap(),
            Sku("42".into())
        );
        let err = resolver(&[("sku", "42")]).call(&handler).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unknown_name_is_not_claimed() {
        let handler = Callable::builder("h")
            .param::<i64>("other")
            .build(|args| args.get::<i64>("other"));

        let err = resolver(&[("n", "1")]).call(&handler).unwrap_err();
        assert!(matches!(err, KilnError::DependencyResolution { .. }));
    }

    #[test]
    fn test_route_component() {
        let route: Arc<CurrentRoute> = Arc::new(Route::get(
            "/items",
            Callable::builder("list_items").build(|_| Ok(Reply::from("ok"))),
        ));
        let resolver = Resolver::new(
            vec![Arc::new(RouteComponent::new(Some(route)))],
            InstanceMap::new(),
        );
        let handler = Callable::builder("h")
            .param::<CurrentRoute>("route")
            .build(|args| Ok(args.shared::<CurrentRoute>("route")?.name().to_string()));

        assert_eq!(resolver.call(&handler).unwrap(), "list_items");
    }

    #[test]
    fn test_route_component_on_miss() {
        let resolver = Resolver::new(vec![Arc::new(RouteComponent::default())], InstanceMap::new());
        let handler = Callable::builder("h")
            .optional::<CurrentRoute>("route")
            .build(|args| Ok(args.optional_shared::<CurrentRoute>("route")?.is_none()));

        assert!(resolver.call(&handler).unwrap());
    }
}
