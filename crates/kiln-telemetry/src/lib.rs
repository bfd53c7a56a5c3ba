//! Observability for Kiln applications.
//!
//! - **Logging**: a `tracing-subscriber` registry with JSON or pretty output
//! - **Metrics**: Prometheus request metrics via the `metrics` crate
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `kiln_requests_total` | Counter | `method`, `path`, `status` | Total request count |
//! | `kiln_request_duration_seconds` | Histogram | `method`, `path` | Request latency |
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln_telemetry::{init_logging, init_metrics, LogConfig, MetricsConfig, MetricsMiddleware};
//!
//! # fn main() -> Result<(), kiln_telemetry::TelemetryError> {
//! init_logging(&LogConfig::production())?;
//! let metrics = init_metrics(&MetricsConfig::default())?;
//!
//! // Register `metrics` as an instance and `MetricsMiddleware` in the
//! // middleware chain; a handler can then serve `metrics.render()`.
//! # let _ = (metrics, MetricsMiddleware::new());
//! # Ok(())
//! # }
//! ```
//!
//! The rendered output looks like:
//!
//! ```text
//! # TYPE kiln_requests_total counter
//! kiln_requests_total{method="GET",path="/accounts/{id}",status="200"} 12
//! ```

#![doc(html_root_url = "https://docs.rs/kiln-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use self::logging::{create_env_filter, fields, init_logging, LogConfig};
pub use self::metrics::{init_metrics, record_request, MetricsConfig, MetricsMiddleware, PrometheusMetrics};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
