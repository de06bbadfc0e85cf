//! Metrics for targetd RPC calls
//!
//! Recorded through the `metrics` facade; the binary decides whether an
//! exporter is installed.

use std::time::Instant;

use metrics::{counter, histogram};

/// Metric names
pub mod names {
    /// Counter: Total targetd RPC calls by method and status
    pub const RPC_REQUESTS_TOTAL: &str = "targetd_rpc_requests_total";
    /// Histogram: Duration of targetd RPC calls in seconds
    pub const RPC_DURATION_SECONDS: &str = "targetd_rpc_duration_seconds";
}

/// Record a finished RPC call
pub fn record_rpc(method: &str, status: &str, duration_secs: f64) {
    counter!(names::RPC_REQUESTS_TOTAL, "method" => method.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!(names::RPC_DURATION_SECONDS, "method" => method.to_string()).record(duration_secs);
}

/// Times a single RPC call
pub struct RpcTimer {
    method: &'static str,
    start: Instant,
}

impl RpcTimer {
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            start: Instant::now(),
        }
    }

    pub fn finish(self, status: &str) {
        record_rpc(self.method, status, self.start.elapsed().as_secs_f64());
    }
}
