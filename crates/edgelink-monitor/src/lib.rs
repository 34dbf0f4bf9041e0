//! `edgelink-monitor` – node status and lifecycle events over MQTT
//!
//! The monitor is an app node.  Subscribed to the dispatcher, it receives
//! every heartbeat snapshot and every lifecycle event, turns them into JSON
//! documents and publishes them at QoS 0.
//!
//! | Input | Topic | Document |
//! |---|---|---|
//! | `NodesState` | `heartbeat_topic` | `{version, timestamp, states: [{node, link, running}]}` |
//! | `NodeAdded` | `<prefix>/add_node` | `{name, plugin}` |
//! | `NodeDeleted` | `<prefix>/del_node` | `{name}` |
//! | `NodeControlled` | `<prefix>/node_ctl` | `{node, cmd}` |
//! | `NodeSettingChanged` | `<prefix>/node_setting` | `{node, setting}` |
//!
//! Nothing is buffered: while the broker connection is down, heartbeats and
//! events are dropped.
//!
//! # Modules
//!
//! - [`config`] – [`MonitorConfig`]: broker address and topic layout.
//! - [`codec`] – document types and their JSON encoding.
//! - [`payload`] – [`PayloadBuffer`], an encoded document in flight.
//! - [`transport`] – the [`MqttTransport`] seam and its `rumqttc`
//!   implementation [`RumqttTransport`].
//! - [`publisher`] – [`MonitorPublisher`]: pre-checks, encoding, and the
//!   publish primitive that settles metrics on completion.
//! - [`plugin`] – [`MonitorPlugin`], the [`Plugin`][edgelink_middleware::Plugin]
//!   the gateway talks to.

pub mod codec;
pub mod config;
pub mod payload;
pub mod plugin;
pub mod publisher;
pub mod transport;

pub use codec::{EventTopic, HeartbeatDocument, NodeStateDocument};
pub use config::MonitorConfig;
pub use payload::PayloadBuffer;
pub use plugin::MonitorPlugin;
pub use publisher::MonitorPublisher;
pub use transport::{MqttTransport, PublishRequest, Qos, RumqttTransport, SubmitRejected};

/// Plugin name the monitor node is created from.
pub const PLUGIN_NAME: &str = "monitor";
