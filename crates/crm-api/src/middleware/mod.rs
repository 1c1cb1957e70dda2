//! Request middleware: counters and HTTP tracing.

pub mod metrics;
pub mod tracing_layer;
