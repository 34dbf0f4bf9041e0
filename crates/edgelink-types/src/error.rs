use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::ReqRespType;
use crate::status::NodeStatus;

/// Error taxonomy of the gateway core.
///
/// Every variant is recoverable: it is returned to the immediate caller and
/// logged there, never escalated into a process failure.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GatewayError {
    #[error("MQTT transport is not configured")]
    TransportUnavailable,

    #[error("MQTT transport is not connected")]
    TransportDisconnected,

    #[error("Publish rejected by transport: {0}")]
    PublishRejected(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Unsupported event kind: {0}")]
    UnsupportedEvent(ReqRespType),

    #[error("Invalid status transition on {node}: {from} -> {to}")]
    InvalidTransition {
        node: String,
        from: NodeStatus,
        to: NodeStatus,
    },

    #[error("Capability mismatch on {node}: {operation} is not available")]
    CapabilityMismatch { node: String, operation: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node already exists: {0}")]
    NodeExists(String),

    #[error("Write {token} to {driver} is already in flight")]
    WriteInFlight { driver: String, token: u64 },

    #[error("Gateway core is no longer available")]
    CoreUnavailable,

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Device error {code}: {message}")]
    Device { code: i32, message: String },
}

impl GatewayError {
    /// Numeric code carried in `RespError` payloads. `0` is reserved for
    /// success.
    pub fn code(&self) -> i32 {
        match self {
            GatewayError::TransportUnavailable => 4001,
            GatewayError::TransportDisconnected => 4002,
            GatewayError::PublishRejected(_) => 4003,
            GatewayError::EncodingFailed(_) => 1001,
            GatewayError::UnsupportedEvent(_) => 1002,
            GatewayError::InvalidTransition { .. } => 2001,
            GatewayError::CapabilityMismatch { .. } => 2002,
            GatewayError::NodeNotFound(_) => 2003,
            GatewayError::NodeExists(_) => 2004,
            GatewayError::WriteInFlight { .. } => 2005,
            GatewayError::CoreUnavailable => 1003,
            GatewayError::Plugin(_) => 3001,
            GatewayError::Device { code, .. } => *code,
        }
    }
}
