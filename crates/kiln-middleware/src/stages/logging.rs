//! Request logging middleware.

use std::time::Instant;

use kiln_core::{Callable, Handler, Request};
use tracing::{info, warn};

use crate::middleware::{Middleware, Next};

/// Emits one structured event per request with its method, path,
/// status and duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLoggingMiddleware;

impl RequestLoggingMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RequestLoggingMiddleware {
    fn name(&self) -> &'static str {
        "request_logging"
    }

    fn wrap(&self, next: Next) -> Handler {
        Callable::builder("RequestLoggingMiddleware")
            .param::<Request>("request")
            .build(move |args| {
                let request = args.shared::<Request>("request")?;
                let started = Instant::now();
                let result = next.run();
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

                match &result {
                    Ok(reply) => info!(
                        method = %request.method,
                        path = %request.path,
                        status = reply.status().as_u16(),
                        duration_ms,
                        "request completed"
                    ),
                    Err(error) => warn!(
                        method = %request.method,
                        path = %request.path,
                        kind = error.kind(),
                        error = %error,
                        duration_ms,
                        "request failed"
                    ),
                }
                result
            })
    }
}
