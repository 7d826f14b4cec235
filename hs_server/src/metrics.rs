//! Prometheus metrics for identity and admission traffic.
//!
//! Metrics are exposed in Prometheus text format on a dedicated listener
//! configured with `METRICS_BIND`. When no exporter is installed the
//! recording functions are no-ops.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use hs_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::login_attempts_total(true);
//! metrics::registrations_total("inviteOnly");
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

/// Record HTTP request.
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

/// Increment login attempts counter.
pub fn login_attempts_total(success: bool) {
    metrics::counter!("login_attempts_total",
        "success" => success.to_string()
    )
    .increment(1);
}

/// Increment completed registrations, labelled with the admission mode in force.
pub fn registrations_total(mode: &str) {
    metrics::counter!("registrations_total",
        "mode" => mode.to_string()
    )
    .increment(1);
}

/// Increment registrations refused by the admission gate.
pub fn admission_denied_total(mode: &str) {
    metrics::counter!("admission_denied_total",
        "mode" => mode.to_string()
    )
    .increment(1);
}

/// Increment minted invite codes.
pub fn invites_minted_total(count: usize) {
    metrics::counter!("invites_minted_total").increment(count as u64);
}

/// Increment privileged requests rejected for lack of privilege.
pub fn admin_denials_total() {
    metrics::counter!("admin_denials_total").increment(1);
}

/// Increment sessions removed by the expiry sweep.
pub fn sessions_expired_total(count: u64) {
    metrics::counter!("sessions_expired_total").increment(count);
}

// ============================================================================
// Rate Limiting Metrics
// ============================================================================

/// Increment rate limit hits counter.
pub fn rate_limit_hits_total(endpoint: &str) {
    metrics::counter!("rate_limit_hits_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}
