//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, domain
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_registry_events_total` (counter): applied watch events by action
//! - `proxy_registry_reconnects_total` (counter): watch stream restarts

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(error) => tracing::error!(error = %error, "failed to install metrics exporter"),
    }

    describe_counter!(
        "proxy_requests_total",
        "Requests handled, labeled by method, status and routing domain"
    );
    describe_histogram!(
        "proxy_request_duration_seconds",
        "Time from request receipt to response completion"
    );
    describe_counter!(
        "proxy_registry_events_total",
        "Registry change events applied, labeled by action"
    );
    describe_counter!(
        "proxy_registry_reconnects_total",
        "Times the registry change stream had to be re-established"
    );
}

pub fn record_request(method: &str, status: u16, domain: &str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "domain" => domain.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_registry_event(action: &'static str) {
    counter!("proxy_registry_events_total", "action" => action).increment(1);
}

pub fn record_registry_reconnect() {
    counter!("proxy_registry_reconnects_total").increment(1);
}
