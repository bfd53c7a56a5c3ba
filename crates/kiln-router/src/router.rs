//! First-match router over compiled templates.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use indexmap::IndexMap;

use crate::error::{RouterError, RouterResult};
use crate::params::Params;
use crate::route::{Route, RouteNode};
use crate::template::PathTemplate;
use crate::RouteMatch;

/// A set of routes indexed by method and by name.
///
/// Each method keeps its routes in most-recently-registered-first order and
/// `match_route` returns the first template that matches. A route
/// registered later therefore wins over an earlier one with an overlapping
/// template, which is how a composed application overrides base routes.
///
/// # Example
///
/// ```rust
/// use http::Method;
/// use kiln_router::{Include, Params, Route, Router};
///
/// let mut router = Router::new();
/// router.add_route(Route::get("/accounts/{id}", "get_account")).unwrap();
/// router
///     .add_route(Include::new("/v1", vec![Route::get("/ping", "ping").into()]).with_namespace("v1"))
///     .unwrap();
///
/// let matched = router.match_route(&Method::GET, "/accounts/42").unwrap();
/// assert_eq!(matched.route.name(), "get_account");
/// assert_eq!(matched.params.get("id"), Some("42"));
///
/// assert_eq!(router.reverse_uri("v1:ping", Params::new()).unwrap(), "/v1/ping");
/// ```
#[derive(Debug)]
pub struct Router<H> {
    by_name: IndexMap<String, (PathTemplate, Arc<Route<H>>)>,
    by_method: HashMap<Method, Vec<(PathTemplate, Arc<Route<H>>)>>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self {
            by_name: IndexMap::new(),
            by_method: HashMap::new(),
        }
    }
}

impl<H> Router<H> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router from a list of routes and includes.
    pub fn with_routes<I>(routes: I) -> RouterResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<RouteNode<H>>,
    {
        let mut router = Self::new();
        router.add_routes(routes)?;
        Ok(router)
    }

    /// Registers a route or include.
    ///
    /// # Errors
    ///
    /// Fails on a malformed template or when the final (namespaced) name
    /// is already taken. Routes registered before the failure stay registered.
    pub fn add_route(&mut self, node: impl Into<RouteNode<H>>) -> RouterResult<()> {
        self.add_node(node.into(), "", None)
    }

    /// Registers each route or include in order.
    pub fn add_routes<I>(&mut self, routes: I) -> RouterResult<()>
    where
        I: IntoIterator,
        I::Item: Into<RouteNode<H>>,
    {
        for node in routes {
            self.add_route(node)?;
        }
        Ok(())
    }

    fn add_node(&mut self, node: RouteNode<H>, prefix: &str, namespace: Option<&str>) -> RouterResult<()> {
        match node {
            RouteNode::Include(include) => {
                let (inner_prefix, routes, inner_namespace) = include.into_parts();
                let prefix = format!("{prefix}{inner_prefix}");
                let namespace = match (namespace, inner_namespace) {
                    (Some(outer), Some(inner)) => Some(format!("{outer}:{inner}")),
                    (Some(outer), None) => Some(outer.to_string()),
                    (None, inner) => inner,
                };
                for child in routes {
                    self.add_node(child, &prefix, namespace.as_deref())?;
                }
                Ok(())
            }
            RouteNode::Route(route) => self.insert(route.prefixed(prefix, namespace)),
        }
    }

    fn insert(&mut self, route: Route<H>) -> RouterResult<()> {
        if self.by_name.contains_key(route.name()) {
            return Err(RouterError::DuplicateRoute(route.name().to_string()));
        }

        let template = PathTemplate::parse(route.template())?;
        let route = Arc::new(route);
        self.by_name
            .insert(route.name().to_string(), (template.clone(), Arc::clone(&route)));
        self.by_method
            .entry(route.method().clone())
            .or_default()
            .insert(0, (template, route));
        Ok(())
    }

    /// Finds the first route for `method` whose template matches `path`.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<H>> {
        self.by_method.get(method)?.iter().find_map(|(template, route)| {
            template.match_path(path).map(|params| RouteMatch {
                route: Arc::clone(route),
                params,
            })
        })
    }

    /// Builds the path of the route named `name`.
    ///
    /// # Errors
    ///
    /// [`RouterError::RouteNotFound`] for an unknown name and
    /// [`RouterError::RouteParamMissing`] when a placeholder has no value.
    pub fn reverse_uri(&self, name: &str, params: impl Into<Params>) -> RouterResult<String> {
        let (template, _) = self
            .by_name
            .get(name)
            .ok_or_else(|| RouterError::RouteNotFound(name.to_string()))?;
        template.reverse(params)
    }

    /// Looks a route up by its final name.
    #[must_use]
    pub fn route(&self, name: &str) -> Option<&Arc<Route<H>>> {
        self.by_name.get(name).map(|(_, route)| route)
    }

    /// All routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route<H>>> {
        self.by_name.values().map(|(_, route)| route)
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
