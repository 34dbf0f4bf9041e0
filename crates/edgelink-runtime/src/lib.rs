//! `edgelink-runtime` – the gateway core
//!
//! Ties the status tracker and the dispatcher together into one running
//! gateway.
//!
//! # Modules
//!
//! - [`gateway`] – [`Gateway`][gateway::Gateway]: node lifecycle
//!   (add/delete/control/setting), driver group bookkeeping, the latest-value
//!   tag cache, write-token routing and the periodic heartbeat.  It is the
//!   [`CoreContext`][edgelink_middleware::CoreContext] every driver adapter
//!   reports into.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable trace export.

pub mod gateway;
pub mod telemetry;

pub use gateway::Gateway;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};

// Re-exported so embedders can build nodes without depending on the lower
// crates directly.
pub use edgelink_kernel::NodeStatusTracker;
pub use edgelink_middleware::{Adapter, AdapterMetrics, CORE_NODE, Dispatcher, Plugin};
