use std::sync::Arc;

use async_trait::async_trait;
use edgelink_middleware::Plugin;
use edgelink_types::{GatewayError, ReqRespData, ReqRespHead};
use tracing::debug;

use crate::publisher::MonitorPublisher;

/// The monitor's node-facing side.
///
/// Heartbeats and lifecycle events arrive as commands; anything else is
/// refused with [`GatewayError::UnsupportedEvent`].
pub struct MonitorPlugin {
    publisher: Arc<MonitorPublisher>,
}

impl MonitorPlugin {
    pub fn new(publisher: Arc<MonitorPublisher>) -> Self {
        Self { publisher }
    }

    pub fn publisher(&self) -> &Arc<MonitorPublisher> {
        &self.publisher
    }
}

#[async_trait]
impl Plugin for MonitorPlugin {
    async fn command(&self, head: ReqRespHead, data: ReqRespData) -> Result<(), GatewayError> {
        match data {
            ReqRespData::NodesState(snapshot) => self.publisher.handle_nodes_state(snapshot),
            ReqRespData::Event(event) => self.publisher.handle_events(event),
            other => {
                debug!(kind = %head.kind, sender = %head.sender, "monitor ignores command");
                Err(GatewayError::UnsupportedEvent(other.kind()))
            }
        }
    }

    async fn response(&self, head: ReqRespHead, _data: ReqRespData) -> Result<(), GatewayError> {
        debug!(kind = %head.kind, sender = %head.sender, "monitor ignores response");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use edgelink_middleware::AdapterMetrics;
    use edgelink_types::{NodeCtl, ReqRespType};

    #[tokio::test]
    async fn non_monitor_commands_are_refused() {
        let publisher = Arc::new(MonitorPublisher::new(
            MonitorConfig::default(),
            Arc::new(AdapterMetrics::new()),
        ));
        let plugin = MonitorPlugin::new(publisher);

        let data = ReqRespData::NodeCtl(NodeCtl::Start);
        let head = ReqRespHead::for_data(&data, "core", "monitor");
        assert_eq!(
            plugin.command(head, data).await,
            Err(GatewayError::UnsupportedEvent(ReqRespType::NodeCtl))
        );
    }

    #[tokio::test]
    async fn heartbeat_without_transport_is_unavailable() {
        let publisher = Arc::new(MonitorPublisher::new(
            MonitorConfig::default(),
            Arc::new(AdapterMetrics::new()),
        ));
        let plugin = MonitorPlugin::new(publisher);

        let data = ReqRespData::NodesState(Default::default());
        let head = ReqRespHead::for_data(&data, "core", "monitor");
        assert_eq!(
            plugin.command(head, data).await,
            Err(GatewayError::TransportUnavailable)
        );
    }
}
