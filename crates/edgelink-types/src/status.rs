//! Node status vocabulary and transition rules.
//!
//! The link half and the running half of a [`NodeStatus`] evolve
//! independently, each along its own fixed set of edges:
//!
//! | Half | Legal edges |
//! |---|---|
//! | [`LinkStatus`] | `Disconnected → Connecting → Connected`, `Connecting → Disconnected`, `Connected → Disconnected` |
//! | [`RunningStatus`] | `Idle → Init → Ready → Running`, `* → Stopped`, `Stopped → Idle` |
//!
//! Both enums serialise as their integer discriminant so they can be dropped
//! straight into heartbeat documents.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Which side of the gateway a node lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum NodeType {
    /// Southbound device driver.
    Driver = 1,
    /// Northbound application.
    App = 2,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Driver => write!(f, "driver"),
            NodeType::App => write!(f, "app"),
        }
    }
}

/// Connectivity of a node's underlying transport.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum LinkStatus {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl LinkStatus {
    /// `true` when `self → next` is one of the legal link edges.
    pub fn can_transition_to(self, next: LinkStatus) -> bool {
        use LinkStatus::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
        )
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Disconnected => write!(f, "disconnected"),
            LinkStatus::Connecting => write!(f, "connecting"),
            LinkStatus::Connected => write!(f, "connected"),
        }
    }
}

/// Execution state of a node's processing logic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum RunningStatus {
    #[default]
    Idle = 0,
    Init = 1,
    Ready = 2,
    Running = 3,
    Stopped = 4,
}

impl RunningStatus {
    /// `true` when `self → next` is one of the legal running edges.
    ///
    /// `Stopped` is reachable from every state (including itself) and can
    /// only be left by reinitialising the node back to `Idle`.
    pub fn can_transition_to(self, next: RunningStatus) -> bool {
        use RunningStatus::*;
        matches!(
            (self, next),
            (Idle, Init) | (Init, Ready) | (Ready, Running) | (_, Stopped) | (Stopped, Idle)
        )
    }

    /// The next state on the way up to `Running`, or `None` once there.
    ///
    /// From `Stopped` the path goes through `Idle` again.
    pub fn next_towards_running(self) -> Option<RunningStatus> {
        use RunningStatus::*;
        match self {
            Idle => Some(Init),
            Init => Some(Ready),
            Ready => Some(Running),
            Running => None,
            Stopped => Some(Idle),
        }
    }
}

impl fmt::Display for RunningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunningStatus::Idle => write!(f, "idle"),
            RunningStatus::Init => write!(f, "init"),
            RunningStatus::Ready => write!(f, "ready"),
            RunningStatus::Running => write!(f, "running"),
            RunningStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// The status pair tracked for every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeStatus {
    pub running: RunningStatus,
    pub link: LinkStatus,
}

impl NodeStatus {
    pub fn new(running: RunningStatus, link: LinkStatus) -> Self {
        Self { running, link }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.link, self.running)
    }
}
