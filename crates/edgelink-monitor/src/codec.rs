//! JSON documents published by the monitor.
//!
//! Status values are written as their integer discriminants
//! (`link` 0..=2, `running` 0..=4), `cmd` as 0 (start) or 1 (stop).

use bytes::Bytes;
use edgelink_types::{
    GatewayError, HeartbeatSnapshot, LifecycleEvent, LinkStatus, NodeCtl, RunningStatus,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStateDocument {
    pub node: String,
    pub link: LinkStatus,
    pub running: RunningStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatDocument {
    pub version: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub states: Vec<NodeStateDocument>,
}

impl HeartbeatDocument {
    /// One record per snapshot entry, same order.
    pub fn from_snapshot(version: &str, timestamp: i64, snapshot: &HeartbeatSnapshot) -> Self {
        Self {
            version: version.to_string(),
            timestamp,
            states: snapshot
                .iter()
                .map(|s| NodeStateDocument {
                    node: s.node.clone(),
                    link: s.status.link,
                    running: s.status.running,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddNodeDocument {
    pub name: String,
    pub plugin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelNodeDocument {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCtlDocument {
    pub node: String,
    pub cmd: NodeCtl,
}

/// The setting blob is embedded as a JSON value, not as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSettingDocument {
    pub node: String,
    pub setting: serde_json::Value,
}

/// Event topics, relative to the configured prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    AddNode,
    DelNode,
    NodeCtl,
    NodeSetting,
}

impl EventTopic {
    pub fn suffix(&self) -> &'static str {
        match self {
            EventTopic::AddNode => "add_node",
            EventTopic::DelNode => "del_node",
            EventTopic::NodeCtl => "node_ctl",
            EventTopic::NodeSetting => "node_setting",
        }
    }
}

pub fn encode<T: Serialize>(doc: &T) -> Result<Bytes, GatewayError> {
    serde_json::to_vec(doc)
        .map(Bytes::from)
        .map_err(|e| GatewayError::EncodingFailed(e.to_string()))
}

pub fn decode_heartbeat(bytes: &[u8]) -> Result<HeartbeatDocument, GatewayError> {
    serde_json::from_slice(bytes).map_err(|e| GatewayError::EncodingFailed(e.to_string()))
}

/// Pick the topic for `event` and encode its document.
///
/// Group events have no monitor topic and yield
/// [`GatewayError::UnsupportedEvent`].  A setting blob that is not valid JSON
/// yields [`GatewayError::EncodingFailed`].
pub fn encode_event(event: &LifecycleEvent) -> Result<(EventTopic, Bytes), GatewayError> {
    match event {
        LifecycleEvent::NodeAdded { node, plugin } => Ok((
            EventTopic::AddNode,
            encode(&AddNodeDocument {
                name: node.clone(),
                plugin: plugin.clone(),
            })?,
        )),
        LifecycleEvent::NodeDeleted { node } => Ok((
            EventTopic::DelNode,
            encode(&DelNodeDocument { name: node.clone() })?,
        )),
        LifecycleEvent::NodeControlled { node, ctl } => Ok((
            EventTopic::NodeCtl,
            encode(&NodeCtlDocument {
                node: node.clone(),
                cmd: *ctl,
            })?,
        )),
        LifecycleEvent::NodeSettingChanged { node, setting } => {
            let setting = serde_json::from_str(setting)
                .map_err(|e| GatewayError::EncodingFailed(format!("setting of {node}: {e}")))?;
            Ok((
                EventTopic::NodeSetting,
                encode(&NodeSettingDocument {
                    node: node.clone(),
                    setting,
                })?,
            ))
        }
        LifecycleEvent::GroupAdded { .. } | LifecycleEvent::GroupDeleted { .. } => {
            Err(GatewayError::UnsupportedEvent(event.kind()))
        }
    }
}
