//! `edgelink-middleware` – adapters and message routing
//!
//! Moves typed messages between the gateway core and its nodes without caring
//! about what the messages mean.
//!
//! # Modules
//!
//! - [`adapter`] – the [`Plugin`] trait implemented by node code, the
//!   [`CoreContext`] back-channel a driver uses to reach the core, and the
//!   [`Adapter`] that binds one node's identity to both through a
//!   [`Capabilities`] table fixed at construction.
//! - [`metrics`] – [`AdapterMetrics`], the per-adapter atomic counters.
//! - [`dispatcher`] – [`Dispatcher`]: adapter registry, point-to-point
//!   command/response delivery, lifecycle event fan-out and heartbeat ticks.

pub mod adapter;
pub mod dispatcher;
pub mod metrics;

pub use adapter::{Adapter, Capabilities, CoreContext, Plugin};
pub use dispatcher::{CORE_NODE, DeliveryReport, Dispatcher};
pub use metrics::{AdapterMetrics, Metric, MetricsSnapshot};
