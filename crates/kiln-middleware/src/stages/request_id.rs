//! Request ID middleware.
//!
//! Every request gets an identifier for log correlation. An incoming
//! `X-Request-Id` header is reused; otherwise a UUID v7 is generated,
//! which sorts by creation time.
//!
//! The identifier is injectable downstream as [`RequestId`], every event
//! logged while the request runs is recorded inside a `request` span
//! carrying it, and it is echoed in the response's `X-Request-Id` header.

use std::fmt;

use kiln_core::{Callable, Handler, InstanceKey, KilnResult, Reply, Resolver, Value};
use kiln_extract::Header;
use uuid::Uuid;

use crate::middleware::{Middleware, Next};

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest incoming request ID that is reused.
const MAX_INCOMING_LEN: usize = 128;

/// The current request's identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generates a fresh time-ordered identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Middleware that assigns request IDs.
#[derive(Debug, Clone)]
pub struct RequestIdMiddleware {
    /// Whether to reuse incoming `X-Request-Id` headers.
    trust_incoming: bool,
}

impl RequestIdMiddleware {
    /// Creates a middleware that reuses incoming request IDs.
    #[must_use]
    pub fn new() -> Self {
        Self { trust_incoming: true }
    }

    /// Creates a middleware that ignores incoming IDs and always
    /// generates a new one, for services facing untrusted clients.
    #[must_use]
    pub fn always_generate() -> Self {
        Self { trust_incoming: false }
    }
}

impl Default for RequestIdMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

fn usable(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= MAX_INCOMING_LEN
        && candidate.bytes().all(|b| b.is_ascii_graphic())
}

fn stamp(reply: Reply, id: &RequestId) -> KilnResult<Reply> {
    Ok(match reply {
        Reply::Response(mut response) => {
            response.headers.try_set(REQUEST_ID_HEADER, id.as_str())?;
            Reply::Response(response)
        }
        Reply::Data {
            status,
            data,
            mut headers,
        } => {
            headers.try_set(REQUEST_ID_HEADER, id.as_str())?;
            Reply::Data { status, data, headers }
        }
    })
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn wrap(&self, next: Next) -> Handler {
        let trust_incoming = self.trust_incoming;
        Callable::builder("RequestIdMiddleware")
            .optional::<Header>("x_request_id")
            .param::<Resolver>("resolver")
            .build(move |args| {
                let resolver = args.shared::<Resolver>("resolver")?;
                let id = args
                    .optional_shared::<Header>("x_request_id")?
                    .filter(|header| trust_incoming && usable(header))
                    .map_or_else(RequestId::generate, |header| RequestId(header.to_string()));

                resolver.insert_instance(InstanceKey::of::<RequestId>(), Value::new(id.clone()));
                let span = tracing::info_span!("request", request_id = %id);
                let reply = span.in_scope(|| next.run())?;
                stamp(reply, &id)
            })
    }
}
