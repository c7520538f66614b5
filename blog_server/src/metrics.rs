//! Prometheus metrics.
//!
//! Counters are recorded unconditionally; they are only exported when a
//! listener is installed with [`init_metrics`]. Without one the `metrics`
//! macros are no-ops.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use blog_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", 200);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record a finished HTTP request.
pub fn http_requests_total(method: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Count a login attempt by outcome (`success`, `invalid_credentials`, `error`).
pub fn auth_logins_total(outcome: &'static str) {
    metrics::counter!("auth_logins_total", "outcome" => outcome).increment(1);
}

/// Count a request turned away by the gate in required mode.
pub fn auth_gate_rejections_total(mode: &'static str) {
    metrics::counter!("auth_gate_rejections_total", "mode" => mode).increment(1);
}

// ============================================================================
// Verification Metrics
// ============================================================================

pub fn verification_codes_issued_total() {
    metrics::counter!("verification_codes_issued_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter() {
        http_requests_total("GET", 200);
        auth_logins_total("success");
        auth_gate_rejections_total("required");
        verification_codes_issued_total();
    }
}
