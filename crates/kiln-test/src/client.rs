//! In-process test client.

use std::sync::Arc;

use http::Method;
use kiln_core::Request;
use kiln_server::{App, Outcome, Transport};

use crate::error::TestError;
use crate::request::TestRequestBuilder;
use crate::response::TestResponse;

/// Drives an [`App`] without binding a socket.
///
/// Requests go through the full pipeline: routing, middleware,
/// fallbacks and rendering. Every request gets a capturing
/// [`Transport`], so take-over handlers can be tested too.
///
/// # Example
///
/// ```rust
/// use kiln_core::{Callable, Reply};
/// use kiln_router::Route;
/// use kiln_server::App;
/// use kiln_test::TestClient;
/// use serde_json::json;
///
/// let ping = Callable::builder("ping").build(|_| Ok(Reply::ok(json!("pong"))));
/// let app = App::builder().route(Route::get("/ping", ping)).build().unwrap();
///
/// let client = TestClient::new(app);
/// let response = client.get("/ping").send().unwrap();
/// assert_eq!(response.status_code(), 200);
/// assert_eq!(response.json::<String>().unwrap(), "pong");
/// ```
#[must_use]
pub struct TestClient {
    app: Arc<App>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client for `app`.
    pub fn new(app: App) -> Self {
        Self::shared(Arc::new(app))
    }

    /// Creates a client for an app that is shared elsewhere.
    pub fn shared(app: Arc<App>) -> Self {
        Self {
            app,
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Returns the app under test.
    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Starts a request with an arbitrary method.
    pub fn request(&self, method: Method, path: impl Into<String>) -> TestRequestBuilder<'_> {
        TestRequestBuilder::new(self, method, path)
    }

    /// Starts a `GET` request.
    pub fn get(&self, path: impl Into<String>) -> TestRequestBuilder<'_> {
        self.request(Method::GET, path)
    }

    /// Starts a `POST` request.
    pub fn post(&self, path: impl Into<String>) -> TestRequestBuilder<'_> {
        self.request(Method::POST, path)
    }

    /// Starts a `PUT` request.
    pub fn put(&self, path: impl Into<String>) -> TestRequestBuilder<'_> {
        self.request(Method::PUT, path)
    }

    /// Starts a `PATCH` request.
    pub fn patch(&self, path: impl Into<String>) -> TestRequestBuilder<'_> {
        self.request(Method::PATCH, path)
    }

    /// Starts a `DELETE` request.
    pub fn delete(&self, path: impl Into<String>) -> TestRequestBuilder<'_> {
        self.request(Method::DELETE, path)
    }

    pub(crate) fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }

    pub(crate) fn dispatch(&self, request: Request) -> Result<TestResponse, TestError> {
        let (transport, captured) = Transport::capture();
        match self.app.handle(request, Some(transport)) {
            Outcome::TakenOver => captured
                .take()
                .map(|response| TestResponse::from_parts(response, true))
                .ok_or(TestError::NoResponse),
            outcome => outcome
                .into_response()
                .map(TestResponse::new)
                .ok_or(TestError::NoResponse),
        }
    }
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("routes", &self.app.router().len())
            .field("default_headers", &self.default_headers)
            .finish()
    }
}
