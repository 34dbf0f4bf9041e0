//! Message envelope, payload union and lifecycle events.
//!
//! Every message routed between the gateway core and an adapter is a
//! `(ReqRespHead, ReqRespData)` pair.  The head carries the [`ReqRespType`]
//! tag plus correlation metadata; the data is the typed payload for that tag.
//! Build heads with [`ReqRespHead::for_data`] so the two never disagree.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use uuid::Uuid;

use crate::status::NodeStatus;

/// Opaque token correlating a `WriteTag` command with the driver's later
/// `write_response`.
pub type RequestToken = u64;

// ────────────────────────────────────────────────────────────────────────────
// Type tag
// ────────────────────────────────────────────────────────────────────────────

/// Kind of a routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReqRespType {
    // commands
    ReadGroup,
    WriteTag,
    NodeCtl,
    NodeSetting,
    NodesState,
    // responses
    RespError,
    RespReadGroup,
    // events
    AddNodeEvent,
    DelNodeEvent,
    NodeCtlEvent,
    NodeSettingEvent,
    AddGroupEvent,
    DelGroupEvent,
}

impl ReqRespType {
    /// Stable name used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReqRespType::ReadGroup => "read_group",
            ReqRespType::WriteTag => "write_tag",
            ReqRespType::NodeCtl => "node_ctl",
            ReqRespType::NodeSetting => "node_setting",
            ReqRespType::NodesState => "nodes_state",
            ReqRespType::RespError => "resp_error",
            ReqRespType::RespReadGroup => "resp_read_group",
            ReqRespType::AddNodeEvent => "add_node_event",
            ReqRespType::DelNodeEvent => "del_node_event",
            ReqRespType::NodeCtlEvent => "node_ctl_event",
            ReqRespType::NodeSettingEvent => "node_setting_event",
            ReqRespType::AddGroupEvent => "add_group_event",
            ReqRespType::DelGroupEvent => "del_group_event",
        }
    }

    /// `true` for lifecycle event tags.
    pub fn is_event(&self) -> bool {
        matches!(
            self,
            ReqRespType::AddNodeEvent
                | ReqRespType::DelNodeEvent
                | ReqRespType::NodeCtlEvent
                | ReqRespType::NodeSettingEvent
                | ReqRespType::AddGroupEvent
                | ReqRespType::DelGroupEvent
        )
    }
}

impl fmt::Display for ReqRespType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Envelope
// ────────────────────────────────────────────────────────────────────────────

/// Message envelope: type tag plus correlation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqRespHead {
    pub kind: ReqRespType,
    /// Correlates a response with the request that caused it.
    pub id: Uuid,
    pub sender: String,
    pub receiver: String,
}

impl ReqRespHead {
    /// Build a fresh head whose tag matches `data`.
    pub fn for_data(
        data: &ReqRespData,
        sender: impl Into<String>,
        receiver: impl Into<String>,
    ) -> Self {
        Self {
            kind: data.kind(),
            id: Uuid::new_v4(),
            sender: sender.into(),
            receiver: receiver.into(),
        }
    }

    /// Build the head of a reply to `self`: same correlation id, sender and
    /// receiver swapped.
    pub fn reply(&self, data: &ReqRespData) -> Self {
        Self {
            kind: data.kind(),
            id: self.id,
            sender: self.receiver.clone(),
            receiver: self.sender.clone(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Values
// ────────────────────────────────────────────────────────────────────────────

/// A tag value pushed by a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    /// The driver failed to read the tag; carries the device error code.
    Error(i32),
}

/// Latest known value of one tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagValue {
    pub tag: String,
    pub value: DValue,
    pub timestamp: DateTime<Utc>,
}

/// Administrative control verb for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum NodeCtl {
    Start = 0,
    Stop = 1,
}

// ────────────────────────────────────────────────────────────────────────────
// Lifecycle events
// ────────────────────────────────────────────────────────────────────────────

/// One-shot notification of a node-affecting administrative action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    NodeAdded { node: String, plugin: String },
    NodeDeleted { node: String },
    NodeControlled { node: String, ctl: NodeCtl },
    /// `setting` is an opaque blob, usually JSON-encoded configuration.
    NodeSettingChanged { node: String, setting: String },
    GroupAdded { node: String, group: String, interval_ms: u32 },
    GroupDeleted { node: String, group: String },
}

impl LifecycleEvent {
    pub fn kind(&self) -> ReqRespType {
        match self {
            LifecycleEvent::NodeAdded { .. } => ReqRespType::AddNodeEvent,
            LifecycleEvent::NodeDeleted { .. } => ReqRespType::DelNodeEvent,
            LifecycleEvent::NodeControlled { .. } => ReqRespType::NodeCtlEvent,
            LifecycleEvent::NodeSettingChanged { .. } => ReqRespType::NodeSettingEvent,
            LifecycleEvent::GroupAdded { .. } => ReqRespType::AddGroupEvent,
            LifecycleEvent::GroupDeleted { .. } => ReqRespType::DelGroupEvent,
        }
    }

    /// Name of the node the event is about.
    pub fn node(&self) -> &str {
        match self {
            LifecycleEvent::NodeAdded { node, .. }
            | LifecycleEvent::NodeDeleted { node }
            | LifecycleEvent::NodeControlled { node, .. }
            | LifecycleEvent::NodeSettingChanged { node, .. }
            | LifecycleEvent::GroupAdded { node, .. }
            | LifecycleEvent::GroupDeleted { node, .. } => node,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Heartbeat snapshot
// ────────────────────────────────────────────────────────────────────────────

/// One `(node, status)` entry of a [`HeartbeatSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub node: String,
    pub status: NodeStatus,
}

/// Statuses of all known nodes at one instant, in registration order.
///
/// Deliberately not `Clone`: each snapshot is taken for one consumer and
/// consumed by it.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HeartbeatSnapshot {
    states: Vec<NodeState>,
}

impl HeartbeatSnapshot {
    pub fn new(states: Vec<NodeState>) -> Self {
        Self { states }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeState> {
        self.states.iter()
    }

    /// Status of `node`, if it is part of the snapshot.
    pub fn get(&self, node: &str) -> Option<NodeStatus> {
        self.states
            .iter()
            .find(|s| s.node == node)
            .map(|s| s.status)
    }

    pub fn into_states(self) -> Vec<NodeState> {
        self.states
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Payload union
// ────────────────────────────────────────────────────────────────────────────

/// Typed payload of a routed message, keyed by [`ReqRespType`].
#[derive(Debug, PartialEq)]
pub enum ReqRespData {
    ReadGroup {
        driver: String,
        group: String,
    },
    WriteTag {
        driver: String,
        group: String,
        tag: String,
        value: DValue,
        token: RequestToken,
    },
    NodeCtl(NodeCtl),
    NodeSetting(String),
    NodesState(HeartbeatSnapshot),
    /// Generic outcome of a request; `code == 0` means success.
    RespError {
        code: i32,
        message: String,
    },
    RespReadGroup {
        driver: String,
        group: String,
        values: Vec<TagValue>,
    },
    Event(LifecycleEvent),
}

impl ReqRespData {
    pub fn kind(&self) -> ReqRespType {
        match self {
            ReqRespData::ReadGroup { .. } => ReqRespType::ReadGroup,
            ReqRespData::WriteTag { .. } => ReqRespType::WriteTag,
            ReqRespData::NodeCtl(_) => ReqRespType::NodeCtl,
            ReqRespData::NodeSetting(_) => ReqRespType::NodeSetting,
            ReqRespData::NodesState(_) => ReqRespType::NodesState,
            ReqRespData::RespError { .. } => ReqRespType::RespError,
            ReqRespData::RespReadGroup { .. } => ReqRespType::RespReadGroup,
            ReqRespData::Event(event) => event.kind(),
        }
    }
}
