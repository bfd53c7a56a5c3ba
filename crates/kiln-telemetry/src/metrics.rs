//! Prometheus request metrics.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `kiln_requests_total` | Counter | `method`, `path`, `status` |
//! | `kiln_request_duration_seconds` | Histogram | `method`, `path` |
//!
//! The `path` label is the matched route's template, so `/accounts/42`
//! and `/accounts/7` share a series.

use std::time::{Duration, Instant};

use kiln_core::{Callable, Handler, Parameter, Request};
use kiln_extract::CurrentRoute;
use kiln_middleware::{Middleware, Next};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

use crate::{TelemetryError, TelemetryResult};

/// Request counter name.
pub const REQUESTS_TOTAL: &str = "kiln_requests_total";

/// Request latency histogram name.
pub const REQUEST_DURATION_SECONDS: &str = "kiln_request_duration_seconds";

/// Path label used when no route matched.
pub const UNMATCHED_PATH: &str = "<unmatched>";

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            // 1ms .. 10s
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Renders the installed recorder in Prometheus text format.
///
/// Register it as an instance so a `/metrics` handler can inject it.
#[derive(Debug, Clone)]
pub struct PrometheusMetrics {
    handle: PrometheusHandle,
}

impl PrometheusMetrics {
    /// Wraps a recorder handle.
    #[must_use]
    pub fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Renders all metrics.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Installs the global Prometheus recorder.
///
/// # Errors
///
/// Returns [`TelemetryError::AlreadyInitialized`] when a recorder is
/// already installed and [`TelemetryError::Metrics`] for invalid buckets.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<PrometheusMetrics> {
    let handle = builder(config)?
        .install_recorder()
        .map_err(|err| match err {
            BuildError::FailedToSetGlobalRecorder(_) => {
                TelemetryError::AlreadyInitialized("metrics recorder")
            }
            other => TelemetryError::Metrics(other.to_string()),
        })?;

    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests processed");
    describe_histogram!(REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");

    Ok(PrometheusMetrics::new(handle))
}

fn builder(config: &MetricsConfig) -> TelemetryResult<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::Metrics(e.to_string()))
}

/// Records one completed request.
pub fn record_request(method: &str, path: &str, status: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Counts requests and measures their latency.
///
/// Errors are counted with the status they will be rendered with.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn wrap(&self, next: Next) -> Handler {
        Callable::builder("MetricsMiddleware")
            .param::<Request>("request")
            .parameter(Parameter::new::<CurrentRoute>("route").optional().with_default())
            .build(move |args| {
                let request = args.shared::<Request>("request")?;
                let route = args.optional_shared::<CurrentRoute>("route")?;
                let started = Instant::now();
                let result = next.run();

                let status = match &result {
                    Ok(reply) => reply.status(),
                    Err(error) => error.status_code(),
                };
                let path = route.as_deref().map_or(UNMATCHED_PATH, |r| r.template());
                record_request(request.method.as_str(), path, status.as_u16(), started.elapsed());
                result
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use kiln_core::{InstanceMap, KilnError, Reply, Resolver};
    use serde_json::json;

    fn resolver(path: &str) -> Resolver {
        let mut instances = InstanceMap::new();
        instances.insert(Request::builder(Method::GET, path).build().unwrap());
        Resolver::new(Vec::new(), instances)
    }

    #[test]
    fn test_default_buckets() {
        let config = MetricsConfig::default();
        assert_eq!(config.duration_buckets.first(), Some(&0.001));
        assert_eq!(config.duration_buckets.len(), 12);
    }

    #[test]
    fn test_middleware_records_counter_and_histogram() {
        let recorder = builder(&MetricsConfig::default()).unwrap().build_recorder();
        let metrics = PrometheusMetrics::new(recorder.handle());

        metrics::with_local_recorder(&recorder, || {
            let ok = Next::new("ok", || Ok(Reply::from("ok")));
            resolver("/a").call(&MetricsMiddleware.wrap(ok)).unwrap();

            let missing = Next::new("missing", || {
                Err(KilnError::http(StatusCode::NOT_FOUND, json!("gone")))
            });
            resolver("/b").call(&MetricsMiddleware.wrap(missing)).unwrap_err();
        });

        let rendered = metrics.render();
        assert!(rendered.contains(REQUESTS_TOTAL));
        assert!(rendered.contains("status=\"200\""));
        assert!(rendered.contains("status=\"404\""));
        assert!(rendered.contains(&format!("path=\"{UNMATCHED_PATH}\"")));
        assert!(rendered.contains(&format!("{REQUEST_DURATION_SECONDS}_bucket")));
    }
}
