//! `edgelink-types` – shared vocabulary of the gateway core.
//!
//! Every other crate in the workspace speaks in terms of these types:
//!
//! - [`status`] – [`NodeStatus`] and its two halves, [`LinkStatus`] and
//!   [`RunningStatus`], together with the legal transition edges of each.
//! - [`message`] – the [`ReqRespHead`] envelope, the [`ReqRespData`] payload
//!   union keyed by [`ReqRespType`], [`LifecycleEvent`]s and the
//!   [`HeartbeatSnapshot`].
//! - [`error`] – [`GatewayError`], the single error taxonomy of the core.

pub mod error;
pub mod message;
pub mod status;

pub use error::GatewayError;
pub use message::{
    DValue, HeartbeatSnapshot, LifecycleEvent, NodeCtl, NodeState, ReqRespData, ReqRespHead,
    ReqRespType, RequestToken, TagValue,
};
pub use status::{LinkStatus, NodeStatus, NodeType, RunningStatus};
