//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_requests_total` (counter): requests by route, status
//! - `api_request_duration_seconds` (histogram): latency by route
//! - `api_rate_limited_total` (counter): rejections by rate-limit scope
//! - `rate_limit_tracked_keys` (gauge): windows held after each sweep
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests never need to set one up.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics recorder"),
    }
}

/// Record one completed request.
pub fn record_request(route: &'static str, status: u16, duration: Duration) {
    counter!("api_requests_total", "route" => route, "status" => status.to_string()).increment(1);
    histogram!("api_request_duration_seconds", "route" => route).record(duration.as_secs_f64());
}

/// Record one rate-limit rejection.
pub fn record_rate_limited(scope: &'static str) {
    counter!("api_rate_limited_total", "scope" => scope).increment(1);
}

pub fn record_tracked_keys(count: usize) {
    gauge!("rate_limit_tracked_keys").set(count as f64);
}
