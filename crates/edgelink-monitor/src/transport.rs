//! MQTT transport seam.
//!
//! [`MqttTransport::submit`] never blocks: it either hands the request to the
//! transport, which later runs its completion exactly once, or gives the
//! request back inside a [`SubmitRejected`].
//!
//! [`RumqttTransport`] runs two tasks:
//!
//! - the connection task polls the `rumqttc` event loop and keeps the
//!   connected flag current (`ConnAck` sets it; `Disconnect` or a poll error
//!   clears it, followed by the reconnect delay);
//! - the publish task drains the bounded submission queue into the client and
//!   completes each request with the client's verdict.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use edgelink_types::GatewayError;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::payload::PayloadBuffer;

/// Delivery guarantee of one publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Qos {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl From<Qos> for QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => QoS::AtMostOnce,
            Qos::AtLeastOnce => QoS::AtLeastOnce,
            Qos::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

/// Runs once per accepted request with the outcome and the payload, which
/// it then owns.
pub type PublishCompletion = Box<dyn FnOnce(Result<(), GatewayError>, PayloadBuffer) + Send>;

pub struct PublishRequest {
    pub topic: String,
    pub qos: Qos,
    pub payload: PayloadBuffer,
    pub on_complete: PublishCompletion,
}

impl PublishRequest {
    /// Consume the request by running its completion.
    pub fn complete(self, result: Result<(), GatewayError>) {
        (self.on_complete)(result, self.payload);
    }
}

impl fmt::Debug for PublishRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishRequest")
            .field("topic", &self.topic)
            .field("qos", &self.qos)
            .field("payload", &self.payload)
            .finish()
    }
}

/// A request the transport refused synchronously.  Its completion has not
/// run and never will.
#[derive(Debug)]
pub struct SubmitRejected {
    pub reason: GatewayError,
    pub request: PublishRequest,
}

pub trait MqttTransport: Send + Sync {
    fn is_connected(&self) -> bool;

    fn submit(&self, request: PublishRequest) -> Result<(), SubmitRejected>;
}

// ────────────────────────────────────────────────────────────────────────────
// rumqttc implementation
// ────────────────────────────────────────────────────────────────────────────

pub struct RumqttTransport {
    connected: Arc<AtomicBool>,
    queue: mpsc::Sender<PublishRequest>,
}

impl RumqttTransport {
    /// Create the client and spawn both tasks on the current runtime.  They
    /// stop when `cancel` fires.
    pub fn spawn(config: &MonitorConfig, cancel: CancellationToken) -> Arc<Self> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive());
        let capacity = config.queue_capacity.max(1);
        let (client, event_loop) = AsyncClient::new(options, capacity);

        let connected = Arc::new(AtomicBool::new(false));
        let (queue, requests) = mpsc::channel(capacity);

        tokio::spawn(run_connection(
            event_loop,
            Arc::clone(&connected),
            config.reconnect_delay(),
            cancel.clone(),
        ));
        tokio::spawn(run_publisher(client, requests, cancel));
        info!(host = %config.host, port = config.port, client_id = %config.client_id, "MQTT transport started");

        Arc::new(Self { connected, queue })
    }
}

impl MqttTransport for RumqttTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn submit(&self, request: PublishRequest) -> Result<(), SubmitRejected> {
        if !self.is_connected() {
            return Err(SubmitRejected {
                reason: GatewayError::TransportDisconnected,
                request,
            });
        }
        self.queue.try_send(request).map_err(|e| match e {
            TrySendError::Full(request) => SubmitRejected {
                reason: GatewayError::PublishRejected("submission queue full".to_string()),
                request,
            },
            TrySendError::Closed(request) => SubmitRejected {
                reason: GatewayError::TransportDisconnected,
                request,
            },
        })
    }
}

async fn run_connection(
    mut event_loop: EventLoop,
    connected: Arc<AtomicBool>,
    reconnect_delay: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            polled = event_loop.poll() => match polled {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    connected.store(true, Ordering::Release);
                    info!("MQTT connection established");
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    connected.store(false, Ordering::Release);
                    info!("MQTT server sent disconnect");
                }
                Ok(event) => debug!(?event, "MQTT event"),
                Err(e) => {
                    if connected.swap(false, Ordering::AcqRel) {
                        warn!(error = %e, "MQTT connection lost");
                    } else {
                        debug!(error = %e, "MQTT connect attempt failed");
                    }
                    // The next poll reconnects.
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(reconnect_delay) => {}
                    }
                }
            },
        }
    }
    connected.store(false, Ordering::Release);
    debug!("MQTT connection task stopped");
}

async fn run_publisher(
    client: AsyncClient,
    mut requests: mpsc::Receiver<PublishRequest>,
    cancel: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            _ = cancel.cancelled() => break,
            next = requests.recv() => match next {
                Some(request) => request,
                None => break,
            },
        };
        let result = client
            .publish_bytes(
                request.topic.clone(),
                request.qos.into(),
                false,
                request.payload.bytes(),
            )
            .await
            .map_err(|e| GatewayError::PublishRejected(e.to_string()));
        request.complete(result);
    }

    // Whatever is still queued fails; every accepted request completes once.
    requests.close();
    while let Ok(request) = requests.try_recv() {
        request.complete(Err(GatewayError::TransportDisconnected));
    }
    let _ = client.try_disconnect();
    debug!("MQTT publish task stopped");
}
