//! Provisioner metrics
//!
//! One counter and one histogram cover provision, delete and resize, labelled
//! by outcome. A separate counter tracks targetd errors that were taken to
//! mean the step had already been done, which is how retried operations show
//! up.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// Metric names
pub mod names {
    /// Counter: operations by kind and outcome
    pub const OPERATIONS_TOTAL: &str = "targetd_provisioner_operations_total";
    /// Histogram: wall time of an operation, targetd round trips included
    pub const OPERATION_DURATION_SECONDS: &str = "targetd_provisioner_operation_duration_seconds";
    /// Counter: targetd errors absorbed as already-done, by call and code
    pub const IDEMPOTENT_OUTCOMES_TOTAL: &str = "targetd_provisioner_idempotent_outcomes_total";
}

/// Outcome label of a successful operation
const SUCCESS: &str = "success";

/// The operations a provisioner exposes to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Provision,
    Delete,
    Resize,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Provision => "provision",
            Operation::Delete => "delete",
            Operation::Resize => "resize",
        }
    }
}

/// Serve the provisioner metrics in Prometheus format on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(names::OPERATIONS_TOTAL, "Provision, delete and resize operations by outcome");
    describe_histogram!(
        names::OPERATION_DURATION_SECONDS,
        "Duration of provision, delete and resize operations"
    );
    describe_counter!(
        names::IDEMPOTENT_OUTCOMES_TOTAL,
        "targetd errors treated as an already completed step"
    );

    info!("Serving provisioner metrics on http://{}/metrics", addr);
    Ok(())
}

/// Count a finished operation and record how long it took. `outcome` is
/// `success` or the error label.
pub fn record_operation(operation: Operation, outcome: &str, duration_secs: f64) {
    counter!(names::OPERATIONS_TOTAL, "operation" => operation.as_str(), "outcome" => outcome.to_string())
        .increment(1);
    histogram!(names::OPERATION_DURATION_SECONDS, "operation" => operation.as_str()).record(duration_secs);
}

/// Count a targetd error that a retried step absorbed.
pub fn record_idempotent(call: &str, code: &str) {
    counter!(names::IDEMPOTENT_OUTCOMES_TOTAL, "call" => call.to_string(), "code" => code.to_string())
        .increment(1);
}

/// Measures one provision, delete or resize from start to outcome.
pub struct OperationTimer {
    operation: Operation,
    start: Instant,
}

impl OperationTimer {
    pub fn start(operation: Operation) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Record the outcome: `None` for success, or the label of the error.
    pub fn observe(self, error_label: Option<&str>) {
        let duration = self.start.elapsed().as_secs_f64();
        record_operation(self.operation, error_label.unwrap_or(SUCCESS), duration);
    }
}
