//! Test request building.

use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use kiln_core::Request;
use serde::Serialize;

use crate::client::TestClient;
use crate::error::TestError;
use crate::response::TestResponse;

/// Builds a request against a [`TestClient`].
///
/// Errors are deferred to [`send`](Self::send) so calls chain.
#[must_use]
pub struct TestRequestBuilder<'a> {
    client: &'a TestClient,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    error: Option<TestError>,
}

impl<'a> TestRequestBuilder<'a> {
    pub(crate) fn new(client: &'a TestClient, method: Method, path: impl Into<String>) -> Self {
        Self {
            client,
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            error: None,
        }
    }

    /// Adds a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the `Accept` header.
    pub fn accept(self, accept: impl Into<String>) -> Self {
        self.header(ACCEPT.as_str(), accept)
    }

    /// Sets the `Authorization` header with a bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header(AUTHORIZATION.as_str(), format!("Bearer {}", token.as_ref()))
    }

    /// Appends a query parameter. Names and values are percent-encoded.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON body and `content-type: application/json`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let response = client
    ///     .post("/accounts")
    ///     .json(&json!({"username": "alice"}))
    ///     .send()
    ///     .unwrap();
    /// ```
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(err) => {
                self.error.get_or_insert(err.into());
            }
        }
        self.header(CONTENT_TYPE.as_str(), "application/json")
    }

    /// Sets a form body and `content-type: application/x-www-form-urlencoded`.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = Some(Bytes::from(encode_pairs(fields.iter().copied())));
        self.header(CONTENT_TYPE.as_str(), "application/x-www-form-urlencoded")
    }

    /// The request target, path plus encoded query.
    #[must_use]
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = encode_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let separator = if self.path.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.path)
    }

    /// Builds the request and runs it through the app.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be built, or the handler took over the
    /// transport without sending a response.
    pub fn send(self) -> Result<TestResponse, TestError> {
        let request = self.build()?;
        self.client.dispatch(request)
    }

    fn build(&self) -> Result<Request, TestError> {
        if let Some(err) = &self.error {
            return Err(TestError::RequestBuild(err.to_string()));
        }

        let mut builder = Request::builder(self.method.clone(), &self.target());
        for (name, value) in self.client.default_headers().iter().chain(&self.headers) {
            builder = builder.header(name, value);
        }
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        builder
            .build()
            .map_err(|err| TestError::RequestBuild(err.to_string()))
    }
}

fn encode_pairs<'p>(pairs: impl Iterator<Item = (&'p str, &'p str)>) -> String {
    pairs
        .map(|(name, value)| format!("{}={}", urlencoding::encode(name), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}
