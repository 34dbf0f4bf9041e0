//! [`MonitorPublisher`] – heartbeat and event publishing.
//!
//! Both handlers check the transport before doing any work:
//!
//! | Transport | Result |
//! |---|---|
//! | not installed | [`GatewayError::TransportUnavailable`] |
//! | installed, not connected | [`GatewayError::TransportDisconnected`] |
//! | connected | encode, then [`MonitorPublisher::publish`] |
//!
//! The pre-checks do not touch metrics.  Once [`MonitorPublisher::publish`]
//! is entered, exactly one of `sent_messages_total` /
//! `sent_message_errors_total` is incremented for the attempt: synchronously
//! when the transport refuses the request, otherwise from the completion.

use std::sync::Arc;

use chrono::Utc;
use edgelink_middleware::{AdapterMetrics, Metric};
use edgelink_types::{GatewayError, HeartbeatSnapshot, LifecycleEvent};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::codec::{self, HeartbeatDocument};
use crate::config::MonitorConfig;
use crate::payload::PayloadBuffer;
use crate::transport::{MqttTransport, PublishRequest, Qos};

pub struct MonitorPublisher {
    config: MonitorConfig,
    metrics: Arc<AdapterMetrics>,
    transport: RwLock<Option<Arc<dyn MqttTransport>>>,
    version: String,
}

impl MonitorPublisher {
    pub fn new(config: MonitorConfig, metrics: Arc<AdapterMetrics>) -> Self {
        Self {
            config,
            metrics,
            transport: RwLock::new(None),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<AdapterMetrics> {
        &self.metrics
    }

    /// Install or remove the transport.  Takes effect for the next publish.
    pub fn set_transport(&self, transport: Option<Arc<dyn MqttTransport>>) {
        *self.transport.write() = transport;
    }

    fn transport(&self) -> Option<Arc<dyn MqttTransport>> {
        self.transport.read().clone()
    }

    fn ready_transport(&self) -> Result<Arc<dyn MqttTransport>, GatewayError> {
        let transport = self.transport().ok_or(GatewayError::TransportUnavailable)?;
        if !transport.is_connected() {
            return Err(GatewayError::TransportDisconnected);
        }
        Ok(transport)
    }

    /// Publish `snapshot` as a heartbeat document.  The snapshot is consumed
    /// on every path.
    pub fn handle_nodes_state(&self, snapshot: HeartbeatSnapshot) -> Result<(), GatewayError> {
        self.ready_transport()?;

        let doc = HeartbeatDocument::from_snapshot(
            &self.version,
            Utc::now().timestamp_millis(),
            &snapshot,
        );
        let bytes = codec::encode(&doc).inspect_err(|e| {
            warn!(error = %e, "heartbeat encoding failed");
        })?;
        debug!(nodes = doc.states.len(), "publishing heartbeat");

        self.publish(
            &self.config.heartbeat_topic,
            Qos::AtMostOnce,
            PayloadBuffer::new(bytes, Arc::clone(&self.metrics)),
        )
    }

    /// Publish `event` on its event topic.  The event, including any setting
    /// blob, is consumed on every path.
    pub fn handle_events(&self, event: LifecycleEvent) -> Result<(), GatewayError> {
        self.ready_transport()?;

        let (topic, bytes) = codec::encode_event(&event).inspect_err(|e| {
            warn!(kind = %event.kind(), node = %event.node(), error = %e, "event not published");
        })?;
        let topic = self.config.event_topic(topic);
        debug!(kind = %event.kind(), node = %event.node(), %topic, "publishing event");

        self.publish(
            &topic,
            Qos::AtMostOnce,
            PayloadBuffer::new(bytes, Arc::clone(&self.metrics)),
        )
    }

    /// Hand `payload` to the transport.
    pub fn publish(&self, topic: &str, qos: Qos, payload: PayloadBuffer) -> Result<(), GatewayError> {
        let transport = match self.ready_transport() {
            Ok(transport) => transport,
            Err(e) => return Err(self.fail(topic, e)),
        };

        let metrics = Arc::clone(&self.metrics);
        let completed_topic = topic.to_string();
        let request = PublishRequest {
            topic: topic.to_string(),
            qos,
            payload,
            on_complete: Box::new(move |result, payload| {
                match result {
                    Ok(()) => metrics.increment(Metric::SentMessages),
                    Err(e) => {
                        warn!(topic = %completed_topic, error = %e, "publish failed");
                        metrics.increment(Metric::SentMessageErrors);
                    }
                }
                drop(payload);
            }),
        };

        transport.submit(request).map_err(|rejected| {
            // The request, and with it the payload, is released here.
            self.fail(topic, rejected.reason)
        })
    }

    fn fail(&self, topic: &str, error: GatewayError) -> GatewayError {
        warn!(topic = %topic, ?error, "publish not submitted");
        self.metrics.increment(Metric::SentMessageErrors);
        error
    }
}
