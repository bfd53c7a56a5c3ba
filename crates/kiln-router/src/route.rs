//! Route and Include declarations.

use http::Method;

/// Anything that can be registered as a route handler.
///
/// The handler name becomes the route's default name, which in turn is
/// what `reverse_uri` looks routes up by.
pub trait RouteHandler {
    /// The handler's identifier.
    fn handler_name(&self) -> &str;
}

impl RouteHandler for &'static str {
    fn handler_name(&self) -> &str {
        self
    }
}

impl RouteHandler for String {
    fn handler_name(&self) -> &str {
        self
    }
}

/// A single route: template, handler, method and name.
///
/// # Example
///
/// ```rust
/// use http::Method;
/// use kiln_router::Route;
///
/// let route = Route::new("/accounts", "create_account").with_method(Method::POST);
/// assert_eq!(route.name(), "create_account");
/// assert_eq!(route.method(), &Method::POST);
/// ```
#[derive(Debug, Clone)]
pub struct Route<H> {
    template: String,
    handler: H,
    method: Method,
    name: String,
}

impl<H: RouteHandler> Route<H> {
    /// Creates a `GET` route named after its handler.
    pub fn new(template: impl Into<String>, handler: H) -> Self {
        let name = handler.handler_name().to_string();
        Self {
            template: template.into(),
            handler,
            method: Method::GET,
            name,
        }
    }

    /// Shorthand for a `GET` route.
    pub fn get(template: impl Into<String>, handler: H) -> Self {
        Self::new(template, handler)
    }

    /// Shorthand for a `POST` route.
    pub fn post(template: impl Into<String>, handler: H) -> Self {
        Self::new(template, handler).with_method(Method::POST)
    }

    /// Shorthand for a `PUT` route.
    pub fn put(template: impl Into<String>, handler: H) -> Self {
        Self::new(template, handler).with_method(Method::PUT)
    }

    /// Shorthand for a `PATCH` route.
    pub fn patch(template: impl Into<String>, handler: H) -> Self {
        Self::new(template, handler).with_method(Method::PATCH)
    }

    /// Shorthand for a `DELETE` route.
    pub fn delete(template: impl Into<String>, handler: H) -> Self {
        Self::new(template, handler).with_method(Method::DELETE)
    }
}

impl<H> Route<H> {
    /// Sets the HTTP method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Overrides the route name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The route template.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The route handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The route name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn prefixed(self, prefix: &str, namespace: Option<&str>) -> Self {
        let name = match namespace {
            Some(namespace) => format!("{namespace}:{}", self.name),
            None => self.name,
        };
        Self {
            template: format!("{prefix}{}", self.template),
            handler: self.handler,
            method: self.method,
            name,
        }
    }
}

/// A group of routes sharing a path prefix and, optionally, a namespace.
///
/// Namespaced route names are joined with `:`, so `get_account` inside
/// an include with namespace `accounts` is reversed as `accounts:get_account`.
///
/// # Example
///
/// ```rust
/// use kiln_router::{Include, Route};
///
/// let api = Include::new("/v1/accounts", vec![
///     Route::post("", "create_account").into(),
///     Route::get("/{id}", "get_account").into(),
/// ])
/// .with_namespace("accounts");
/// assert_eq!(api.prefix(), "/v1/accounts");
/// ```
#[derive(Debug, Clone)]
pub struct Include<H> {
    prefix: String,
    routes: Vec<RouteNode<H>>,
    namespace: Option<String>,
}

impl<H> Include<H> {
    /// Creates an include of `routes` under `prefix`.
    pub fn new(prefix: impl Into<String>, routes: Vec<RouteNode<H>>) -> Self {
        Self {
            prefix: prefix.into(),
            routes,
            namespace: None,
        }
    }

    /// Places every nested route name under `namespace`.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// The path prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The namespace, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// The nested routes.
    pub fn routes(&self) -> &[RouteNode<H>] {
        &self.routes
    }

    pub(crate) fn into_parts(self) -> (String, Vec<RouteNode<H>>, Option<String>) {
        (self.prefix, self.routes, self.namespace)
    }
}

/// Either a [`Route`] or an [`Include`].
#[derive(Debug, Clone)]
pub enum RouteNode<H> {
    /// A single route.
    Route(Route<H>),
    /// A nested group.
    Include(Include<H>),
}

impl<H> From<Route<H>> for RouteNode<H> {
    fn from(route: Route<H>) -> Self {
        Self::Route(route)
    }
}

impl<H> From<Include<H>> for RouteNode<H> {
    fn from(include: Include<H>) -> Self {
        Self::Include(include)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_defaults() {
        let route = Route::new("/", "index");
        assert_eq!(route.template(), "/");
        assert_eq!(route.method(), &Method::GET);
        assert_eq!(route.name(), "index");
        assert_eq!(*route.handler(), "index");
    }

    #[test]
    fn test_route_with_name() {
        let route = Route::delete("/a/{id}", "remove").with_name("delete_a");
        assert_eq!(route.name(), "delete_a");
        assert_eq!(route.method(), &Method::DELETE);
    }

    #[test]
    fn test_route_prefixed() {
        let route = Route::get("/{id}", "get_account").prefixed("/v1/accounts", Some("v1:accounts"));
        assert_eq!(route.template(), "/v1/accounts/{id}");
        assert_eq!(route.name(), "v1:accounts:get_account");
    }
}
