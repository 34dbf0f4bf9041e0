//! [`Dispatcher`] – adapter registry and message router.
//!
//! | Path | Entry point | Target |
//! |---|---|---|
//! | Point-to-point command | [`Dispatcher::send_command`] | `head.receiver` |
//! | Point-to-point response | [`Dispatcher::send_response`] | `head.receiver` |
//! | Lifecycle event | [`Dispatcher::emit`] | every subscriber |
//! | Heartbeat | [`Dispatcher::tick`] | every subscriber |
//!
//! Fan-out is at-most-once per attempt: a subscriber whose handler fails is
//! logged and counted in the [`DeliveryReport`], never retried.
//!
//! Locks are only held to look adapters up; no lock is held across a plugin
//! call.

use std::collections::HashMap;
use std::sync::Arc;

use edgelink_types::{
    GatewayError, HeartbeatSnapshot, LifecycleEvent, NodeType, ReqRespData, ReqRespHead,
};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::adapter::Adapter;

/// Sender name used on messages originated by the gateway core itself.
pub const CORE_NODE: &str = "edgelink-core";

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct Dispatcher {
    adapters: RwLock<HashMap<String, Arc<Adapter>>>,
    // Subscription order is delivery order.
    subscribers: RwLock<Vec<String>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Register `adapter` under its node name.
    pub fn register(&self, adapter: Adapter) -> Result<Arc<Adapter>, GatewayError> {
        let mut adapters = self.adapters.write();
        if adapters.contains_key(adapter.name()) {
            return Err(GatewayError::NodeExists(adapter.name().to_string()));
        }
        let adapter = Arc::new(adapter);
        adapters.insert(adapter.name().to_string(), Arc::clone(&adapter));
        info!(node = %adapter.name(), kind = %adapter.kind(), "adapter registered");
        Ok(adapter)
    }

    /// Remove the adapter of `node`, dropping any event subscription it held.
    pub fn unregister(&self, node: &str) -> Result<Arc<Adapter>, GatewayError> {
        let adapter = self
            .adapters
            .write()
            .remove(node)
            .ok_or_else(|| GatewayError::NodeNotFound(node.to_string()))?;
        self.subscribers.write().retain(|name| name != node);
        info!(node = %node, "adapter unregistered");
        Ok(adapter)
    }

    pub fn get(&self, node: &str) -> Option<Arc<Adapter>> {
        self.adapters.read().get(node).cloned()
    }

    /// Registered node names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn lookup(&self, node: &str) -> Result<Arc<Adapter>, GatewayError> {
        self.get(node)
            .ok_or_else(|| GatewayError::NodeNotFound(node.to_string()))
    }

    // -----------------------------------------------------------------------
    // Point-to-point
    // -----------------------------------------------------------------------

    pub async fn send_command(
        &self,
        head: ReqRespHead,
        data: ReqRespData,
    ) -> Result<(), GatewayError> {
        let adapter = self.lookup(&head.receiver)?;
        adapter.command(head, data).await
    }

    pub async fn send_response(
        &self,
        head: ReqRespHead,
        data: ReqRespData,
    ) -> Result<(), GatewayError> {
        let adapter = self.lookup(&head.receiver)?;
        adapter.response(head, data).await
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    /// Subscribe `node` to lifecycle events and heartbeats.  App nodes only.
    pub fn subscribe(&self, node: &str) -> Result<(), GatewayError> {
        let adapter = self.lookup(node)?;
        if adapter.kind() != NodeType::App {
            warn!(node = %node, "driver nodes cannot subscribe to events");
            return Err(GatewayError::CapabilityMismatch {
                node: node.to_string(),
                operation: "subscribe".to_string(),
            });
        }
        let mut subscribers = self.subscribers.write();
        if !subscribers.iter().any(|name| name == node) {
            subscribers.push(node.to_string());
            debug!(node = %node, "subscribed");
        }
        Ok(())
    }

    /// Returns `true` if `node` was subscribed.
    pub fn unsubscribe(&self, node: &str) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|name| name != node);
        subscribers.len() != before
    }

    pub fn subscribers(&self) -> Vec<String> {
        self.subscribers.read().clone()
    }

    /// Deliver a copy of `event` to every subscriber as a command tagged with
    /// the event's kind.  The original is dropped once all copies are out.
    pub async fn emit(&self, event: LifecycleEvent) -> DeliveryReport {
        let kind = event.kind();
        let report = self
            .fan_out(|| ReqRespData::Event(event.clone()))
            .await;
        debug!(kind = %kind, node = %event.node(), ?report, "event emitted");
        report
    }

    /// Deliver a fresh snapshot from `source` to every subscriber as a
    /// `NodesState` command.
    pub async fn tick<F>(&self, source: F) -> DeliveryReport
    where
        F: Fn() -> HeartbeatSnapshot,
    {
        self.fan_out(|| ReqRespData::NodesState(source())).await
    }

    async fn fan_out<F>(&self, make: F) -> DeliveryReport
    where
        F: Fn() -> ReqRespData,
    {
        let targets: Vec<Arc<Adapter>> = {
            let adapters = self.adapters.read();
            self.subscribers
                .read()
                .iter()
                .filter_map(|name| adapters.get(name).cloned())
                .collect()
        };

        let mut report = DeliveryReport::default();
        for adapter in targets {
            let data = make();
            let head = ReqRespHead::for_data(&data, CORE_NODE, adapter.name());
            let kind = head.kind;
            match adapter.command(head, data).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(node = %adapter.name(), kind = %kind, error = %e, "delivery failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::tests::RecordingPlugin;
    use crate::adapter::{CoreContext, Plugin};
    use edgelink_types::{LinkStatus, NodeCtl, NodeState, NodeStatus, ReqRespType, RunningStatus};
    use std::sync::Weak;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn no_core() -> Weak<dyn CoreContext> {
        Weak::<NoCore>::new()
    }

    struct NoCore;

    #[async_trait::async_trait]
    impl CoreContext for NoCore {
        async fn on_update(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: edgelink_types::DValue,
        ) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn on_write_response(
            &self,
            _: &str,
            _: edgelink_types::RequestToken,
            _: Result<(), GatewayError>,
        ) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn add(
        dispatcher: &Dispatcher,
        name: &str,
        kind: NodeType,
        plugin: RecordingPlugin,
    ) -> Arc<RecordingPlugin> {
        let plugin = Arc::new(plugin);
        let as_plugin: Arc<dyn Plugin> = plugin.clone();
        dispatcher
            .register(Adapter::new(name, kind, as_plugin, no_core()))
            .unwrap();
        plugin
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let dispatcher = Dispatcher::new();
        add(&dispatcher, "a", NodeType::App, RecordingPlugin::default());
        let err = dispatcher
            .register(Adapter::new(
                "a",
                NodeType::App,
                Arc::new(RecordingPlugin::default()),
                no_core(),
            ))
            .unwrap_err();
        assert_eq!(err, GatewayError::NodeExists("a".into()));
        assert_eq!(dispatcher.names(), ["a"]);
    }

    #[tokio::test]
    async fn command_goes_to_receiver_only() {
        let dispatcher = Dispatcher::new();
        let a = add(&dispatcher, "a", NodeType::Driver, RecordingPlugin::default());
        let b = add(&dispatcher, "b", NodeType::Driver, RecordingPlugin::default());

        let data = ReqRespData::NodeCtl(NodeCtl::Stop);
        let head = ReqRespHead::for_data(&data, CORE_NODE, "b");
        dispatcher.send_command(head, data).await.unwrap();

        assert!(a.commands.lock().is_empty());
        assert_eq!(b.command_kinds(), [ReqRespType::NodeCtl]);
    }

    #[tokio::test]
    async fn unknown_receiver_is_reported() {
        let dispatcher = Dispatcher::new();
        let data = ReqRespData::RespError {
            code: 0,
            message: String::new(),
        };
        let head = ReqRespHead::for_data(&data, CORE_NODE, "ghost");
        assert_eq!(
            dispatcher.send_response(head, data).await,
            Err(GatewayError::NodeNotFound("ghost".into()))
        );
    }

    #[tokio::test]
    async fn drivers_cannot_subscribe() {
        let dispatcher = Dispatcher::new();
        add(&dispatcher, "dev1", NodeType::Driver, RecordingPlugin::default());
        assert!(matches!(
            dispatcher.subscribe("dev1"),
            Err(GatewayError::CapabilityMismatch { .. })
        ));
        assert!(dispatcher.subscribers().is_empty());
    }

    #[tokio::test]
    async fn emit_reaches_every_subscriber_and_counts_failures() {
        let dispatcher = Dispatcher::new();
        let ok = add(&dispatcher, "ok", NodeType::App, RecordingPlugin::default());
        let bad = add(&dispatcher, "bad", NodeType::App, RecordingPlugin::failing());
        let silent = add(&dispatcher, "silent", NodeType::App, RecordingPlugin::default());
        dispatcher.subscribe("ok").unwrap();
        dispatcher.subscribe("bad").unwrap();

        let report = dispatcher
            .emit(LifecycleEvent::NodeDeleted {
                node: "dev1".into(),
            })
            .await;
        assert_eq!(
            report,
            DeliveryReport {
                delivered: 1,
                failed: 1
            }
        );
        assert_eq!(ok.command_kinds(), [ReqRespType::DelNodeEvent]);
        assert_eq!(bad.command_kinds(), [ReqRespType::DelNodeEvent]);
        assert!(silent.commands.lock().is_empty());
    }

    #[tokio::test]
    async fn tick_takes_one_snapshot_per_subscriber() {
        let dispatcher = Dispatcher::new();
        let a = add(&dispatcher, "a", NodeType::App, RecordingPlugin::default());
        let b = add(&dispatcher, "b", NodeType::App, RecordingPlugin::default());
        dispatcher.subscribe("a").unwrap();
        dispatcher.subscribe("b").unwrap();

        let calls = AtomicUsize::new(0);
        let report = dispatcher
            .tick(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                HeartbeatSnapshot::new(vec![NodeState {
                    node: "dev1".into(),
                    status: NodeStatus::new(RunningStatus::Running, LinkStatus::Connected),
                }])
            })
            .await;

        assert_eq!(report.delivered, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        for plugin in [&a, &b] {
            let commands = plugin.commands.lock();
            match &commands[0].1 {
                ReqRespData::NodesState(snapshot) => assert_eq!(snapshot.len(), 1),
                other => panic!("unexpected payload {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn unregister_drops_subscription() {
        let dispatcher = Dispatcher::new();
        add(&dispatcher, "mon", NodeType::App, RecordingPlugin::default());
        dispatcher.subscribe("mon").unwrap();
        dispatcher.unregister("mon").unwrap();
        assert!(dispatcher.subscribers().is_empty());
        assert!(!dispatcher.unsubscribe("mon"));
        assert_eq!(
            dispatcher.tick(HeartbeatSnapshot::default).await,
            DeliveryReport::default()
        );
    }
}
