//! Built-in fallback handlers.
//!
//! The pipeline resolves fallbacks like any other handler, with the
//! failure that triggered them provided as the `exception` argument.

use http::StatusCode;
use kiln_core::{Callable, Handler, KilnError, Reply, Response};

/// Name under which the triggering failure is provided to fallbacks.
pub const EXCEPTION: &str = "exception";

/// `404 Not Found`.
#[must_use]
pub fn not_found() -> Handler {
    Callable::builder("not_found")
        .build(|_| Ok(Reply::Response(Response::text(StatusCode::NOT_FOUND, "Not Found"))))
}

/// `415 Unsupported Media Type`.
#[must_use]
pub fn unsupported_media_type() -> Handler {
    Callable::builder("unsupported_media_type").build(|_| {
        Ok(Reply::Response(Response::text(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unsupported Media Type",
        )))
    })
}

/// `400 Bad Request` carrying the parser's message.
#[must_use]
pub fn parse_error() -> Handler {
    Callable::builder("parse_error")
        .param::<KilnError>(EXCEPTION)
        .build(|args| {
            let error = args.shared::<KilnError>(EXCEPTION)?;
            Ok(Reply::Response(Response::text(
                StatusCode::BAD_REQUEST,
                format!("Request cannot be parsed: {error}"),
            )))
        })
}

/// `500 Internal Server Error`.
///
/// The failure itself is logged by the pipeline, never sent to the client.
#[must_use]
pub fn internal_error() -> Handler {
    Callable::builder("internal_error").build(|_| {
        Ok(Reply::Response(Response::text(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
        )))
    })
}

/// The fallback set an [`App`](crate::App) dispatches failures to.
#[derive(Clone)]
pub(crate) struct Fallbacks {
    pub(crate) not_found: Handler,
    pub(crate) unsupported_media_type: Handler,
    pub(crate) parse_error: Handler,
    pub(crate) internal_error: Handler,
}

impl Default for Fallbacks {
    fn default() -> Self {
        Self {
            not_found: not_found(),
            unsupported_media_type: unsupported_media_type(),
            parse_error: parse_error(),
            internal_error: internal_error(),
        }
    }
}
