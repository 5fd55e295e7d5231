// Path: crates/telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopSink;

/// A sink for metrics produced by locally hosted gRPC servers.
pub trait GrpcMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the counter of calls received, labeled by service and method.
    fn inc_started(&self, service: &str, method: &str);
    /// Increments the counter of calls completed, labeled by service, method and status code name.
    fn inc_handled(&self, service: &str, method: &str, code: &str);
    /// Observes how long the server took to produce a response.
    fn observe_handling(&self, service: &str, method: &str, duration_secs: f64);
}
impl GrpcMetricsSink for NopSink {
    fn inc_started(&self, _service: &str, _method: &str) {}
    fn inc_handled(&self, _service: &str, _method: &str, _code: &str) {}
    fn observe_handling(&self, _service: &str, _method: &str, _duration_secs: f64) {}
}

/// A sink for the block caches of the chain-state layer.
pub trait CacheMetricsSink: Send + Sync + std::fmt::Debug {
    /// Records a lookup against the named cache.
    fn inc_lookup(&self, cache: &'static str, hit: bool);
}
impl CacheMetricsSink for NopSink {
    fn inc_lookup(&self, _cache: &'static str, _hit: bool) {}
}
