// Path: crates/telemetry/src/time.rs
use crate::sinks::GrpcMetricsSink;
use std::sync::Arc;
use std::time::Instant;

/// Observes the lifetime of one gRPC call when dropped.
pub struct Timer {
    sink: Arc<dyn GrpcMetricsSink>,
    service: String,
    method: String,
    start: Instant,
}

impl Timer {
    pub fn new(sink: Arc<dyn GrpcMetricsSink>, service: String, method: String) -> Self {
        Self {
            sink,
            service,
            method,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.sink.observe_handling(
            &self.service,
            &self.method,
            self.start.elapsed().as_secs_f64(),
        );
    }
}
