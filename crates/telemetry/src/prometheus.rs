// Path: crates/telemetry/src/prometheus.rs
//! A concrete implementation of the metrics sinks using the Prometheus crate.

use crate::sinks::{CacheMetricsSink, GrpcMetricsSink};
use prometheus::{
    exponential_buckets, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
};

/// gRPC server collectors, registered into a caller-owned registry.
#[derive(Debug, Clone)]
pub struct GrpcServerMetrics {
    started: IntCounterVec,
    handled: IntCounterVec,
    handling_seconds: HistogramVec,
}

impl GrpcServerMetrics {
    /// Creates the collectors and registers them into `registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let started = IntCounterVec::new(
            Opts::new(
                "grpc_server_started_total",
                "Total number of RPCs started on the server.",
            ),
            &["grpc_service", "grpc_method"],
        )?;
        let handled = IntCounterVec::new(
            Opts::new(
                "grpc_server_handled_total",
                "Total number of RPCs completed on the server, regardless of success or failure.",
            ),
            &["grpc_service", "grpc_method", "grpc_code"],
        )?;
        let handling_seconds = HistogramVec::new(
            HistogramOpts::new(
                "grpc_server_handling_seconds",
                "Histogram of response latency of RPCs handled by the server.",
            )
            .buckets(exponential_buckets(0.0005, 2.0, 16)?),
            &["grpc_service", "grpc_method"],
        )?;
        registry.register(Box::new(started.clone()))?;
        registry.register(Box::new(handled.clone()))?;
        registry.register(Box::new(handling_seconds.clone()))?;
        Ok(Self {
            started,
            handled,
            handling_seconds,
        })
    }
}

impl GrpcMetricsSink for GrpcServerMetrics {
    fn inc_started(&self, service: &str, method: &str) {
        self.started.with_label_values(&[service, method]).inc();
    }
    fn inc_handled(&self, service: &str, method: &str, code: &str) {
        self.handled
            .with_label_values(&[service, method, code])
            .inc();
    }
    fn observe_handling(&self, service: &str, method: &str, duration_secs: f64) {
        self.handling_seconds
            .with_label_values(&[service, method])
            .observe(duration_secs);
    }
}

/// Hit and miss counters for the chain-state caches.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    lookups: IntCounterVec,
}

impl CacheMetrics {
    /// Creates the collectors and registers them into `registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let lookups = IntCounterVec::new(
            Opts::new(
                "chain_state_cache_lookups_total",
                "Total lookups against the chain-state block caches.",
            ),
            &["cache", "result"],
        )?;
        registry.register(Box::new(lookups.clone()))?;
        Ok(Self { lookups })
    }
}

impl CacheMetricsSink for CacheMetrics {
    fn inc_lookup(&self, cache: &'static str, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.lookups.with_label_values(&[cache, result]).inc();
    }
}
