//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): relayed HTTP requests by method, status, backend
//! - `proxy_request_duration_seconds` (histogram): relay latency
//! - `proxy_auth_rejections_total` (counter): requests stopped at the auth gate
//! - `proxy_ws_sessions_active` (gauge): open WebSocket relays
//! - `proxy_ws_sessions_total` (counter): WebSocket relays started
//! - `proxy_ws_dial_failures_total` (counter): backend WebSocket dials that failed
//! - `proxy_ws_session_errors_total` (counter): relays ended by an abnormal close
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    histogram!(
        "proxy_request_duration_seconds",
        "method" => method.to_string(),
        "backend" => backend.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_auth_rejection() {
    counter!("proxy_auth_rejections_total").increment(1);
}

pub fn record_session_opened() {
    counter!("proxy_ws_sessions_total").increment(1);
    gauge!("proxy_ws_sessions_active").increment(1.0);
}

pub fn record_session_closed() {
    gauge!("proxy_ws_sessions_active").decrement(1.0);
}

pub fn record_dial_failure(backend: &str) {
    counter!("proxy_ws_dial_failures_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_session_error() {
    counter!("proxy_ws_session_errors_total").increment(1);
}
