//! Responses and handler results.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value as Json;

use crate::error::{KilnError, KilnResult};
use crate::headers::Headers;

/// A fully rendered HTTP response.
///
/// # Example
///
/// ```rust
/// use http::StatusCode;
/// use kiln_core::Response;
///
/// let response = Response::text(StatusCode::NOT_FOUND, "Not Found");
/// assert_eq!(response.status, StatusCode::NOT_FOUND);
/// assert_eq!(response.headers.get("content-type"), Some("text/plain; charset=utf-8"));
/// assert_eq!(response.text_body(), "Not Found");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: Headers,
    /// Response body.
    pub body: Bytes,
}

impl Response {
    /// An empty response with `status`.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// A response with a raw body and no content type.
    pub fn with_body(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// A `text/plain` response.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::with_body(status, body.into()).content_type("text/plain; charset=utf-8")
    }

    /// An `application/json` response.
    ///
    /// # Errors
    ///
    /// Fails if `data` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, data: &T) -> KilnResult<Self> {
        let body = serde_json::to_vec(data)
            .map_err(|err| KilnError::internal(format!("response could not be serialized: {err}")))?;
        Ok(Self::with_body(status, body).content_type("application/json; charset=utf-8"))
    }

    /// A redirect to `location` with the given status.
    ///
    /// # Errors
    ///
    /// Fails if `location` is not a valid header value.
    pub fn redirect(status: StatusCode, location: &str) -> KilnResult<Self> {
        let value = HeaderValue::from_str(location)
            .map_err(|_| KilnError::internal(format!("invalid redirect target '{location}'")))?;
        let mut response = Self::new(status);
        response.headers.set(LOCATION, value);
        Ok(response)
    }

    /// A `303 See Other` redirect, typically sent after a form post.
    ///
    /// # Errors
    ///
    /// Fails if `location` is not a valid header value.
    pub fn see_other(location: &str) -> KilnResult<Self> {
        Self::redirect(StatusCode::SEE_OTHER, location)
    }

    /// Sets the `content-type` header.
    #[must_use]
    pub fn content_type(mut self, content_type: &'static str) -> Self {
        self.headers
            .set(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self
    }

    /// Appends a header, keeping the response unchanged if it is invalid.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Err(err) = self.headers.try_add(name, value) {
            tracing::warn!(error = %err, "dropping invalid response header");
        }
        self
    }

    /// The body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// What a handler or middleware hands back to the pipeline.
///
/// A `Response` is passed through untouched; `Data` is rendered by the
/// response renderer that matches the request's `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// An already rendered response.
    Response(Response),
    /// Data waiting to be rendered.
    Data {
        /// Status code.
        status: StatusCode,
        /// The data to render.
        data: Json,
        /// Extra response headers.
        headers: Headers,
    },
}

impl Reply {
    /// `200 OK` data.
    pub fn ok(data: Json) -> Self {
        Self::with_status(StatusCode::OK, data)
    }

    /// Data with an explicit status.
    pub fn with_status(status: StatusCode, data: Json) -> Self {
        Self::Data {
            status,
            data,
            headers: Headers::new(),
        }
    }

    /// Serializes `data` into a `200 OK` reply.
    ///
    /// # Errors
    ///
    /// Fails if `data` cannot be serialized.
    pub fn serialize<T: Serialize + ?Sized>(data: &T) -> KilnResult<Self> {
        serde_json::to_value(data)
            .map(Self::ok)
            .map_err(|err| KilnError::internal(format!("reply could not be serialized: {err}")))
    }

    /// The status this reply will be sent with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Response(response) => response.status,
            Self::Data { status, .. } => *status,
        }
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Json> for Reply {
    fn from(data: Json) -> Self {
        Self::ok(data)
    }
}

impl From<(StatusCode, Json)> for Reply {
    fn from((status, data): (StatusCode, Json)) -> Self {
        Self::with_status(status, data)
    }
}

impl From<(StatusCode, Json, Headers)> for Reply {
    fn from((status, data, headers): (StatusCode, Json, Headers)) -> Self {
        Self::Data {
            status,
            data,
            headers,
        }
    }
}

impl From<&str> for Reply {
    fn from(data: &str) -> Self {
        Self::ok(Json::String(data.to_string()))
    }
}

impl From<String> for Reply {
    fn from(data: String) -> Self {
        Self::ok(Json::String(data))
    }
}
