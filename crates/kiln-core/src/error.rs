//! Error types for Kiln.
//!
//! Every failure that can happen while resolving or invoking a handler is a
//! [`KilnError`]. The request pipeline is the one place that maps error
//! kinds onto fallback handlers:
//!
//! | Variant | Status | Fallback |
//! |---------|--------|----------|
//! | `DependencyResolution` | 500 | exception handler |
//! | `Router` | 500 | exception handler |
//! | `UnsupportedMediaType` | 415 | unsupported media type handler |
//! | `Parse` | 400 | parse error handler |
//! | `Validation` | 400 | rendered by the pipeline with the per-field reasons |
//! | `Http` | payload status | rendered as-is |
//! | `RequestHandled` | n/a | none, the handler took over |
//! | `Internal`, `Io`, `Other` | 500 | exception handler |

use http::StatusCode;
use kiln_router::RouterError;
use serde_json::{Map, Value as Json};
use thiserror::Error;

use crate::headers::Headers;

/// Result alias used across Kiln.
pub type KilnResult<T> = Result<T, KilnError>;

/// The Kiln error taxonomy.
#[derive(Debug, Error)]
pub enum KilnError {
    /// No exact instance and no component could satisfy a parameter.
    #[error("cannot resolve parameter '{parameter}' of function '{function}'")]
    DependencyResolution {
        /// The unresolved parameter, as `name: Type`.
        parameter: String,
        /// The function that declared it.
        function: String,
    },

    /// Route registration or reverse lookup failed.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// No request parser accepts the request's content type.
    #[error("unsupported media type '{content_type}'")]
    UnsupportedMediaType {
        /// The lower-cased content type, empty when the header is absent.
        content_type: String,
    },

    /// A request parser rejected the body.
    #[error("{message}")]
    Parse {
        /// The parser's message.
        message: String,
    },

    /// Schema loading failed for one or more fields.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A handler, middleware or component short-circuited with a response.
    #[error("HTTP {status}: {payload}")]
    Http {
        /// Response status.
        status: StatusCode,
        /// Response payload, rendered through content negotiation.
        payload: Json,
        /// Extra response headers.
        headers: Headers,
    },

    /// The handler wrote its own response to the transport.
    #[error("request handled")]
    RequestHandled,

    /// An internal failure.
    #[error("{message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },

    /// An I/O failure, typically while reading the request body.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error raised by user code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KilnError {
    /// Creates a dependency-resolution error.
    pub fn dependency(parameter: impl Into<String>, function: impl Into<String>) -> Self {
        Self::DependencyResolution {
            parameter: parameter.into(),
            function: function.into(),
        }
    }

    /// Creates an HTTP short-circuit error.
    pub fn http(status: StatusCode, payload: Json) -> Self {
        Self::Http {
            status,
            payload,
            headers: Headers::new(),
        }
    }

    /// Creates an HTTP short-circuit error with extra headers.
    pub fn http_with_headers(status: StatusCode, payload: Json, headers: Headers) -> Self {
        Self::Http {
            status,
            payload,
            headers,
        }
    }

    /// Creates a `400 Bad Request` short-circuit error.
    pub fn bad_request(payload: Json) -> Self {
        Self::http(StatusCode::BAD_REQUEST, payload)
    }

    /// Creates a body-parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates an unsupported-media-type error.
    pub fn unsupported_media_type(content_type: impl Into<String>) -> Self {
        Self::UnsupportedMediaType {
            content_type: content_type.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Parse { .. } | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Http { status, .. } => *status,
            Self::RequestHandled => StatusCode::OK,
            Self::DependencyResolution { .. }
            | Self::Router(_)
            | Self::Internal { .. }
            | Self::Io(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A stable, lower-case name for the error kind, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DependencyResolution { .. } => "dependency_resolution",
            Self::Router(_) => "router",
            Self::UnsupportedMediaType { .. } => "unsupported_media_type",
            Self::Parse { .. } => "parse",
            Self::Validation(_) => "validation",
            Self::Http { .. } => "http",
            Self::RequestHandled => "request_handled",
            Self::Internal { .. } => "internal",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

/// Per-field validation failures, collected instead of failing on the
/// first bad field.
///
/// Reasons are either a message or, for nested schemas, lists and maps,
/// another reason object.
///
/// # Example
///
/// ```rust
/// use kiln_core::ValidationError;
/// use serde_json::json;
///
/// let mut address = ValidationError::new();
/// address.add("zip", "this field is required");
///
/// let mut errors = ValidationError::new();
/// errors.add("name", "length must be >= 3");
/// errors.add_nested("address", address);
///
/// assert_eq!(errors.to_json(), json!({
///     "name": "length must be >= 3",
///     "address": {"zip": "this field is required"},
/// }));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("validation failed for {} field(s)", .reasons.len())]
pub struct ValidationError {
    reasons: Map<String, Json>,
}

impl ValidationError {
    /// Creates an empty error set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an error set with a single field message.
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, reason);
        errors
    }

    /// Records a message for `field`.
    pub fn add(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.reasons.insert(field.into(), Json::String(reason.into()));
    }

    /// Records nested reasons for `field`.
    pub fn add_nested(&mut self, field: impl Into<String>, nested: ValidationError) {
        self.reasons.insert(field.into(), Json::Object(nested.reasons));
    }

    /// Whether no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    /// Number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    /// The reason recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Json> {
        self.reasons.get(field)
    }

    /// The reasons as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Json {
        Json::Object(self.reasons.clone())
    }

    /// Returns `Err(self)` if any field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}
