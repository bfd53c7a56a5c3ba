//! Ready-made middleware.

pub mod logging;
pub mod request_id;

pub use logging::RequestLoggingMiddleware;
pub use request_id::{RequestId, RequestIdMiddleware, REQUEST_ID_HEADER};
