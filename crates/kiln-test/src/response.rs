//! Test response wrapper.

use bytes::Bytes;
use http::StatusCode;
use kiln_core::{Headers, Response};
use serde::de::DeserializeOwned;

use crate::error::TestError;

/// A response produced by the pipeline, with assertion helpers.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
    taken_over: bool,
}

impl TestResponse {
    /// Wraps a rendered response.
    pub fn new(response: Response) -> Self {
        Self::from_parts(response, false)
    }

    pub(crate) fn from_parts(response: Response, taken_over: bool) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            taken_over,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns true if the status is successful (2xx).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns true if the handler wrote this response through the
    /// transport instead of returning it.
    #[must_use]
    pub fn taken_over(&self) -> bool {
        self.taken_over
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let response = client.get("/accounts/1").send().unwrap();
    /// let account: Account = response.json().unwrap();
    /// ```
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {}, got {} with body {:?}",
            expected, self.status, self.body
        );
        self
    }

    /// Asserts that a header is present with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or differs.
    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let actual = self.header(name);
        assert_eq!(
            actual,
            Some(expected),
            "Expected header {name}: {expected}, got {actual:?}"
        );
        self
    }
}
