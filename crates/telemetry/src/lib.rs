// Path: crates/telemetry/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Plugin VM Telemetry
//!
//! Observability for the node side of the plugin boundary: structured logging
//! initialization, a namespaced metrics aggregator, gRPC server instrumentation
//! and abstract sinks decoupling instrumented code from the Prometheus backend.

/// Merging of named metric sources into a single gatherable surface.
pub mod gatherer;
/// A `tower` layer recording per-method gRPC server metrics.
pub mod grpc;
/// The initialization routine for global structured logging.
pub mod init;
/// The concrete implementation of metrics sinks using the `prometheus` crate.
pub mod prometheus;
/// Abstract traits (`*MetricsSink`) that define the contract for metrics reporting.
pub mod sinks;
/// A simple RAII timer for measuring the duration of a scope.
pub mod time;

pub use gatherer::{Gatherer, MetricsRegisterer, MultiGatherer, NamespacedRegisterer};
pub use grpc::GrpcMetricsLayer;
pub use init::{init_tracing, LogFormat, LoggingConfig};
pub use sinks::{CacheMetricsSink, GrpcMetricsSink, NopSink};
