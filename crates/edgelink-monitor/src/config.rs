use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::EventTopic;

/// Broker connection and topic layout of the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Capacity of the submission queue; a full queue rejects publishes.
    pub queue_capacity: usize,
    pub reconnect_delay_ms: u64,
    pub heartbeat_topic: String,
    /// Event topics are `<prefix>/add_node`, `<prefix>/del_node`, ...
    pub event_topic_prefix: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: "edgelink-monitor".to_string(),
            keep_alive_secs: 60,
            queue_capacity: 64,
            reconnect_delay_ms: 3_000,
            heartbeat_topic: "edgelink/heartbeat".to_string(),
            event_topic_prefix: "edgelink/event".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn event_topic(&self, topic: EventTopic) -> String {
        let prefix = self.event_topic_prefix.trim_end_matches('/');
        format!("{prefix}/{}", topic.suffix())
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
