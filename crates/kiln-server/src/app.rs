//! The application and its request pipeline.
//!
//! [`App::handle`] runs one request to completion on the calling thread:
//!
//! 1. seed a per-request instance map from the [`Request`]
//! 2. match a route, or pick the `not_found` fallback
//! 3. wrap the handler in the middleware stack and invoke it
//! 4. map failures onto fallback handlers, resolved the same way
//! 5. render data through content negotiation and set `content-length`
//!
//! Every request ends in exactly one [`Outcome`].

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{HeaderValue, StatusCode};
use kiln_core::{
    Component, DependencyInjector, Handler, Headers, Host, InstanceMap, KilnError, KilnResult, Port,
    QueryString, Reply, Request, Resolver, Response, Scheme, Value,
};
use kiln_extract::{default_components, Parsers, RouteComponent, RouteParamsComponent, Schema, SchemaComponent};
use kiln_middleware::{chain, negotiate, Middleware, Renderers, ResponseRendererMiddleware};
use kiln_router::{Params, RouteMatch, RouteNode, Router};
use tracing::{debug, error, info, warn};

use crate::fallback::{Fallbacks, EXCEPTION};
use crate::transport::Transport;

/// The router type an [`App`] dispatches with.
pub type AppRouter = Router<Handler>;

/// How a request ended.
#[derive(Debug)]
pub enum Outcome {
    /// A response is ready to be written.
    Rendered(Response),
    /// The handler wrote its own response through the [`Transport`].
    TakenOver,
    /// The fallback handler failed too.
    Failed {
        /// The error kind, see [`KilnError::kind`].
        kind: &'static str,
        /// The error message.
        detail: String,
    },
}

impl Outcome {
    /// The response to write, if the pipeline owns the connection.
    ///
    /// `Failed` becomes a bare `500 Internal Server Error`.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Rendered(response) => Some(response),
            Self::TakenOver => None,
            Self::Failed { .. } => Some(finalize(Response::text(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            ))),
        }
    }

    /// Returns true if the handler took over the transport.
    #[must_use]
    pub fn is_taken_over(&self) -> bool {
        matches!(self, Self::TakenOver)
    }
}

/// Builder for [`App`].
///
/// # Example
///
/// ```rust
/// use kiln_core::{Callable, Reply};
/// use kiln_router::Route;
/// use kiln_server::App;
/// use serde_json::json;
///
/// let index = Callable::builder("index").build(|_| Ok(Reply::ok(json!({"ok": true}))));
///
/// let app = App::builder().route(Route::get("/", index)).build().unwrap();
/// assert_eq!(app.router().len(), 1);
/// ```
pub struct AppBuilder {
    router: AppRouter,
    components: Vec<Arc<dyn Component>>,
    middleware: Vec<Arc<dyn Middleware>>,
    parsers: Parsers,
    renderers: Renderers,
    schemas: SchemaComponent,
    instances: InstanceMap,
    fallbacks: Fallbacks,
    error: Option<KilnError>,
}

impl AppBuilder {
    /// Creates a builder with the default middleware, parsers and renderers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            components: Vec::new(),
            middleware: vec![Arc::new(ResponseRendererMiddleware::new())],
            parsers: Parsers::default(),
            renderers: Renderers::default(),
            schemas: SchemaComponent::new(),
            instances: InstanceMap::new(),
            fallbacks: Fallbacks::default(),
            error: None,
        }
    }

    /// Registers a route or an include.
    ///
    /// Registration errors are reported by [`build`](Self::build).
    #[must_use]
    pub fn route(mut self, node: impl Into<RouteNode<Handler>>) -> Self {
        if let Err(err) = self.router.add_route(node) {
            self.error.get_or_insert(err.into());
        }
        self
    }

    /// Registers several routes.
    #[must_use]
    pub fn routes<I>(mut self, nodes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RouteNode<Handler>>,
    {
        for node in nodes {
            self = self.route(node);
        }
        self
    }

    /// Adds a component. User components are consulted before the
    /// built-in ones, in registration order.
    #[must_use]
    pub fn component(mut self, component: impl Component) -> Self {
        self.components.push(Arc::new(component));
        self
    }

    /// Adds an already shared component.
    #[must_use]
    pub fn shared_component(mut self, component: Arc<dyn Component>) -> Self {
        self.components.push(component);
        self
    }

    /// Appends a middleware inside the ones already registered.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Replaces the whole middleware stack, outermost first.
    ///
    /// Leaving out [`ResponseRendererMiddleware`] leaves data replies to
    /// the pipeline's own negotiation.
    #[must_use]
    pub fn middleware_stack(mut self, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        self.middleware = middleware;
        self
    }

    /// Replaces the request parsers.
    #[must_use]
    pub fn parsers(mut self, parsers: Parsers) -> Self {
        self.parsers = parsers;
        self
    }

    /// Replaces the response renderers.
    #[must_use]
    pub fn renderers(mut self, renderers: Renderers) -> Self {
        self.renderers = renderers;
        self
    }

    /// Makes handlers able to request `S` loaded from the request data.
    #[must_use]
    pub fn schema<S: Schema>(mut self) -> Self {
        self.schemas = self.schemas.register::<S>();
        self
    }

    /// Adds an application-wide instance, shared by every request.
    #[must_use]
    pub fn instance<T: std::any::Any + Send + Sync>(mut self, value: T) -> Self {
        self.instances.insert(value);
        self
    }

    /// Replaces the handler for unmatched routes.
    #[must_use]
    pub fn not_found(mut self, handler: Handler) -> Self {
        self.fallbacks.not_found = handler;
        self
    }

    /// Replaces the handler for bodies no parser accepts.
    #[must_use]
    pub fn unsupported_media_type(mut self, handler: Handler) -> Self {
        self.fallbacks.unsupported_media_type = handler;
        self
    }

    /// Replaces the handler for bodies that fail to parse.
    #[must_use]
    pub fn parse_error(mut self, handler: Handler) -> Self {
        self.fallbacks.parse_error = handler;
        self
    }

    /// Replaces the handler for every other failure.
    #[must_use]
    pub fn internal_error(mut self, handler: Handler) -> Self {
        self.fallbacks.internal_error = handler;
        self
    }

    /// Builds the app and bootstraps singleton components.
    ///
    /// # Errors
    ///
    /// Fails on a route registration error or when a singleton cannot be
    /// resolved.
    pub fn build(self) -> KilnResult<App> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let router = Arc::new(self.router);
        let mut components = self.components;
        components.extend(default_components(self.parsers.clone()));
        if !self.schemas.is_empty() {
            components.push(Arc::new(self.schemas));
        }

        let mut instances = self.instances;
        instances.insert(self.parsers);
        instances.insert(self.renderers.clone());
        instances.insert_shared(Arc::clone(&router));

        let injector = DependencyInjector::with_instances(components, instances)?;
        info!(
            routes = router.len(),
            components = injector.components().len(),
            middleware = self.middleware.len(),
            "application ready"
        );

        Ok(App {
            router,
            injector,
            middleware: self.middleware,
            renderers: self.renderers,
            fallbacks: self.fallbacks,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A routed, dependency-injected application.
pub struct App {
    router: Arc<AppRouter>,
    injector: DependencyInjector,
    middleware: Vec<Arc<dyn Middleware>>,
    renderers: Renderers,
    fallbacks: Fallbacks,
}

impl App {
    /// Creates an [`AppBuilder`].
    #[must_use]
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Returns the router.
    #[must_use]
    pub fn router(&self) -> &AppRouter {
        &self.router
    }

    /// Returns the dependency injector.
    #[must_use]
    pub fn injector(&self) -> &DependencyInjector {
        &self.injector
    }

    /// Builds the path of a named route.
    ///
    /// # Errors
    ///
    /// Fails if the route is unknown or a parameter is missing.
    pub fn reverse_uri(&self, name: &str, params: impl Into<Params>) -> KilnResult<String> {
        Ok(self.router.reverse_uri(name, params)?)
    }

    /// Handles one request.
    ///
    /// Handlers can only take the connection over when a `transport` is
    /// given.
    pub fn handle(&self, request: Request, transport: Option<Transport>) -> Outcome {
        let accept = request.headers.get("accept").map(str::to_string);
        let method = request.method.clone();
        let path = request.path.clone();
        let matched = self.router.match_route(&method, &path);
        let resolver = self.injector.get_resolver(seed(request, transport));

        let handler = match matched {
            Some(RouteMatch { route, params }) => {
                debug!(route = route.name(), %method, path = %path, "route matched");
                let handler = route.handler().clone();
                resolver.add_component(Arc::new(RouteComponent::new(Some(route))));
                resolver.add_component(Arc::new(RouteParamsComponent::new(params)));
                handler
            }
            None => {
                debug!(%method, path = %path, "no route matched");
                resolver.add_component(Arc::new(RouteComponent::new(None)));
                self.fallbacks.not_found.clone()
            }
        };

        let outcome = match chain(&resolver, &self.middleware, &handler).run() {
            Ok(reply) => self.render(accept.as_deref(), reply),
            Err(KilnError::RequestHandled) => Outcome::TakenOver,
            Err(KilnError::Http { status, payload, headers }) => {
                self.render(accept.as_deref(), Reply::Data { status, data: payload, headers })
            }
            Err(KilnError::Validation(errors)) => {
                debug!(fields = errors.len(), "request failed validation");
                self.render(accept.as_deref(), Reply::Data {
                    status: StatusCode::BAD_REQUEST,
                    data: errors.to_json(),
                    headers: Headers::new(),
                })
            }
            Err(err) => self.recover(&resolver, accept.as_deref(), err),
        };

        match outcome {
            Outcome::Rendered(response) => Outcome::Rendered(finalize(response)),
            other => other,
        }
    }

    fn recover(&self, resolver: &Resolver, accept: Option<&str>, err: KilnError) -> Outcome {
        let fallback = match &err {
            KilnError::UnsupportedMediaType { content_type } => {
                debug!(content_type = %content_type, "no parser accepts the request body");
                &self.fallbacks.unsupported_media_type
            }
            KilnError::Parse { message } => {
                warn!(error = %message, "request body cannot be parsed");
                &self.fallbacks.parse_error
            }
            other => {
                error!(kind = other.kind(), error = %other, "unhandled error while handling request");
                &self.fallbacks.internal_error
            }
        };

        match resolver.resolve(fallback).provide(EXCEPTION, Value::new(err)).call() {
            Ok(reply) => self.render(accept, reply),
            Err(KilnError::RequestHandled) => Outcome::TakenOver,
            Err(failure) => {
                error!(
                    kind = failure.kind(),
                    error = %failure,
                    fallback = fallback.name(),
                    "fallback handler failed"
                );
                Outcome::Failed {
                    kind: failure.kind(),
                    detail: failure.to_string(),
                }
            }
        }
    }

    fn render(&self, accept: Option<&str>, reply: Reply) -> Outcome {
        match reply {
            Reply::Response(response) => Outcome::Rendered(response),
            Reply::Data { status, data, headers } => {
                match negotiate(&self.renderers, accept.unwrap_or("*/*"), status, &data, &headers) {
                    Ok(response) => Outcome::Rendered(response),
                    Err(err) => {
                        error!(kind = err.kind(), error = %err, "response could not be rendered");
                        Outcome::Failed {
                            kind: err.kind(),
                            detail: err.to_string(),
                        }
                    }
                }
            }
        }
    }
}

fn seed(request: Request, transport: Option<Transport>) -> InstanceMap {
    let mut instances = InstanceMap::new();
    instances.insert(request.method.clone());
    instances.insert(Scheme(request.scheme.clone()));
    instances.insert(Host(request.host.clone()));
    instances.insert(Port(request.port));
    instances.insert(QueryString(request.query_string.clone()));
    instances.insert(request.params.clone());
    instances.insert(request.headers.clone());
    instances.insert_shared(Arc::clone(&request.body));
    if let Some(transport) = transport {
        instances.insert(transport);
    }
    instances.insert(request);
    instances
}

/// Sets `content-length`, and strips the body of 204 and 304 responses.
pub(crate) fn finalize(mut response: Response) -> Response {
    if matches!(response.status, StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED) {
        response.body = Bytes::new();
        response.headers.remove("content-length");
    } else {
        response
            .headers
            .set(CONTENT_LENGTH, HeaderValue::from(response.body.len()));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use kiln_core::Callable;
    use kiln_router::Route;
    use serde_json::json;

    fn get(path: &str) -> Request {
        Request::builder(Method::GET, path).build().unwrap()
    }

    #[test]
    fn test_finalize_sets_content_length() {
        let response = finalize(Response::text(StatusCode::OK, "hello"));
        assert_eq!(response.headers.get("content-length"), Some("5"));
    }

    #[test]
    fn test_finalize_strips_no_content_body() {
        let response = finalize(Response::with_body(StatusCode::NO_CONTENT, "ignored"));
        assert!(response.body.is_empty());
        assert!(!response.headers.contains("content-length"));
    }

    #[test]
    fn test_duplicate_route_fails_build() {
        let handler = Callable::builder("index").build(|_| Ok(Reply::ok(json!(null))));
        let result = App::builder()
            .route(Route::get("/", handler.clone()))
            .route(Route::get("/other", handler))
            .build();

        assert!(matches!(result, Err(KilnError::Router(_))));
    }

    #[test]
    fn test_request_parts_are_injectable() {
        let handler = Callable::builder("describe")
            .param::<Method>("method")
            .param::<Host>("host")
            .param::<QueryString>("query")
            .build(|args| {
                let method = args.get::<Method>("method")?;
                let host = args.get::<Host>("host")?;
                let query = args.get::<QueryString>("query")?;
                Ok(Reply::ok(json!([method.as_str(), host.0, query.0])))
            });
        let app = App::builder()
            .route(Route::get("/describe", handler))
            .build()
            .unwrap();

        let request = Request::builder(Method::GET, "/describe?x=1")
            .host("example.com")
            .build()
            .unwrap();
        let response = app.handle(request, None).into_response().unwrap();

        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body, json!(["GET", "example.com", "x=1"]));
    }

    #[test]
    fn test_failed_outcome_becomes_bare_500() {
        let failing = Callable::builder("boom")
            .build(|_| Err::<Reply, _>(KilnError::internal("boom")));
        let app = App::builder()
            .route(Route::get("/", failing.clone()))
            .internal_error(failing)
            .build()
            .unwrap();

        let outcome = app.handle(get("/"), None);
        assert!(matches!(outcome, Outcome::Failed { kind: "internal", .. }));

        let response = outcome.into_response().unwrap();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text_body(), "Internal Server Error");
    }
}
