//! `edgelink-kernel` – node status bookkeeping.
//!
//! The kernel does not route messages; it owns the authoritative
//! [`NodeStatus`][edgelink_types::NodeStatus] of every node and enforces the
//! legal transition edges of both halves.
//!
//! # Modules
//!
//! - [`status_tracker`] – [`NodeStatusTracker`][status_tracker::NodeStatusTracker]:
//!   one status pair per registered node, guarded by a single lock so that
//!   readers of a [`HeartbeatSnapshot`][edgelink_types::HeartbeatSnapshot]
//!   never observe a half-written pair.

pub mod status_tracker;

pub use status_tracker::NodeStatusTracker;
