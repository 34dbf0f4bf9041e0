//! The adapter abstraction.
//!
//! The core never calls node code directly.  Each node is wrapped in an
//! [`Adapter`] that carries the node's identity and a [`Capabilities`] table
//! chosen once, at construction, from the node's [`NodeType`]:
//!
//! | Operation | Direction | Driver | App |
//! |---|---|---|---|
//! | [`Adapter::command`] | core → plugin | yes | yes |
//! | [`Adapter::response`] | core → plugin | yes | yes |
//! | [`Adapter::update`] | plugin → core | yes | `CapabilityMismatch` |
//! | [`Adapter::write_response`] | plugin → core | yes | `CapabilityMismatch` |
//!
//! The driver-only operations reach the core through a [`Weak`] handle to a
//! [`CoreContext`]; the adapter never keeps the core alive.

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use edgelink_types::{DValue, GatewayError, NodeType, ReqRespData, ReqRespHead, RequestToken};
use tracing::{debug, warn};

use crate::metrics::AdapterMetrics;

// ────────────────────────────────────────────────────────────────────────────
// Seams
// ────────────────────────────────────────────────────────────────────────────

/// Handlers implemented by node code.
///
/// The payload is handed over by value: the plugin owns it from the moment
/// the call starts, whatever the outcome.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Handle a command or lifecycle event addressed to this node.
    async fn command(&self, head: ReqRespHead, data: ReqRespData) -> Result<(), GatewayError>;

    /// Handle a response to a command this node sent earlier.
    async fn response(&self, head: ReqRespHead, data: ReqRespData) -> Result<(), GatewayError>;
}

/// Core-side sink for data flowing up from drivers.
#[async_trait]
pub trait CoreContext: Send + Sync {
    /// A driver pushed a new value for `group/tag`.
    async fn on_update(
        &self,
        driver: &str,
        group: &str,
        tag: &str,
        value: DValue,
    ) -> Result<(), GatewayError>;

    /// A driver finished the write identified by `token`.
    async fn on_write_response(
        &self,
        driver: &str,
        token: RequestToken,
        result: Result<(), GatewayError>,
    ) -> Result<(), GatewayError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Capabilities
// ────────────────────────────────────────────────────────────────────────────

/// Which operations an adapter may perform beyond `command`/`response`.
pub enum Capabilities {
    /// Southbound driver: may push updates and write results into the core.
    Driver { core: Weak<dyn CoreContext> },
    /// Northbound application: plugin handlers only.
    App,
}

impl Capabilities {
    pub fn for_type(kind: NodeType, core: Weak<dyn CoreContext>) -> Self {
        match kind {
            NodeType::Driver => Capabilities::Driver { core },
            NodeType::App => Capabilities::App,
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capabilities::Driver { .. } => f.write_str("Driver"),
            Capabilities::App => f.write_str("App"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Adapter
// ────────────────────────────────────────────────────────────────────────────

/// One node's binding between its plugin and the gateway core.
pub struct Adapter {
    name: String,
    kind: NodeType,
    plugin: Arc<dyn Plugin>,
    capabilities: Capabilities,
    metrics: Arc<AdapterMetrics>,
}

impl Adapter {
    pub fn new(
        name: impl Into<String>,
        kind: NodeType,
        plugin: Arc<dyn Plugin>,
        core: Weak<dyn CoreContext>,
    ) -> Self {
        Self::with_metrics(name, kind, plugin, core, Arc::new(AdapterMetrics::new()))
    }

    /// Like [`Adapter::new`] but sharing an existing metric sink, typically
    /// one the plugin already increments.
    pub fn with_metrics(
        name: impl Into<String>,
        kind: NodeType,
        plugin: Arc<dyn Plugin>,
        core: Weak<dyn CoreContext>,
        metrics: Arc<AdapterMetrics>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            plugin,
            capabilities: Capabilities::for_type(kind, core),
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeType {
        self.kind
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn metrics(&self) -> &Arc<AdapterMetrics> {
        &self.metrics
    }

    pub async fn command(&self, head: ReqRespHead, data: ReqRespData) -> Result<(), GatewayError> {
        debug!(node = %self.name, kind = %head.kind, sender = %head.sender, "command");
        self.plugin.command(head, data).await
    }

    pub async fn response(&self, head: ReqRespHead, data: ReqRespData) -> Result<(), GatewayError> {
        debug!(node = %self.name, kind = %head.kind, sender = %head.sender, "response");
        self.plugin.response(head, data).await
    }

    /// Push a tag value into the core.  Driver only.
    pub async fn update(&self, group: &str, tag: &str, value: DValue) -> Result<(), GatewayError> {
        let core = self.core("update")?;
        core.on_update(&self.name, group, tag, value).await
    }

    /// Report the outcome of a write.  Driver only.
    pub async fn write_response(
        &self,
        token: RequestToken,
        result: Result<(), GatewayError>,
    ) -> Result<(), GatewayError> {
        let core = self.core("write_response")?;
        core.on_write_response(&self.name, token, result).await
    }

    fn core(&self, operation: &str) -> Result<Arc<dyn CoreContext>, GatewayError> {
        match &self.capabilities {
            Capabilities::Driver { core } => core.upgrade().ok_or(GatewayError::CoreUnavailable),
            Capabilities::App => {
                warn!(node = %self.name, operation, "driver-only operation on app adapter");
                Err(GatewayError::CapabilityMismatch {
                    node: self.name.clone(),
                    operation: operation.to_string(),
                })
            }
        }
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use edgelink_types::{NodeCtl, ReqRespType};
    use parking_lot::Mutex;

    /// Plugin that records every call and optionally fails commands.
    #[derive(Default)]
    pub(crate) struct RecordingPlugin {
        pub commands: Mutex<Vec<(ReqRespHead, ReqRespData)>>,
        pub responses: Mutex<Vec<(ReqRespHead, ReqRespData)>>,
        pub fail_commands: bool,
    }

    impl RecordingPlugin {
        pub fn failing() -> Self {
            Self {
                fail_commands: true,
                ..Self::default()
            }
        }

        pub fn command_kinds(&self) -> Vec<ReqRespType> {
            self.commands.lock().iter().map(|(h, _)| h.kind).collect()
        }
    }

    #[async_trait]
    impl Plugin for RecordingPlugin {
        async fn command(&self, head: ReqRespHead, data: ReqRespData) -> Result<(), GatewayError> {
            self.commands.lock().push((head, data));
            if self.fail_commands {
                return Err(GatewayError::Plugin("refused".to_string()));
            }
            Ok(())
        }

        async fn response(&self, head: ReqRespHead, data: ReqRespData) -> Result<(), GatewayError> {
            self.responses.lock().push((head, data));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingCore {
        updates: Mutex<Vec<(String, String, String, DValue)>>,
        writes: Mutex<Vec<(String, RequestToken, Result<(), GatewayError>)>>,
    }

    #[async_trait]
    impl CoreContext for RecordingCore {
        async fn on_update(
            &self,
            driver: &str,
            group: &str,
            tag: &str,
            value: DValue,
        ) -> Result<(), GatewayError> {
            self.updates
                .lock()
                .push((driver.into(), group.into(), tag.into(), value));
            Ok(())
        }

        async fn on_write_response(
            &self,
            driver: &str,
            token: RequestToken,
            result: Result<(), GatewayError>,
        ) -> Result<(), GatewayError> {
            self.writes.lock().push((driver.into(), token, result));
            Ok(())
        }
    }

    fn adapter(kind: NodeType, core: &Arc<RecordingCore>) -> (Adapter, Arc<RecordingPlugin>) {
        let plugin = Arc::new(RecordingPlugin::default());
        let core: Arc<dyn CoreContext> = core.clone();
        let adapter = Adapter::new("node", kind, plugin.clone(), Arc::downgrade(&core));
        (adapter, plugin)
    }

    #[tokio::test]
    async fn command_reaches_plugin() {
        let core = Arc::new(RecordingCore::default());
        let (adapter, plugin) = adapter(NodeType::App, &core);
        let data = ReqRespData::NodeCtl(NodeCtl::Start);
        let head = ReqRespHead::for_data(&data, "core", "node");
        adapter.command(head, data).await.unwrap();
        assert_eq!(plugin.command_kinds(), [ReqRespType::NodeCtl]);
    }

    #[tokio::test]
    async fn driver_update_reaches_core() {
        let core = Arc::new(RecordingCore::default());
        let (adapter, _plugin) = adapter(NodeType::Driver, &core);
        adapter.update("fast", "temp", DValue::Int(21)).await.unwrap();
        adapter
            .write_response(7, Err(GatewayError::Device {
                code: 3,
                message: "busy".into(),
            }))
            .await
            .unwrap();

        let updates = core.updates.lock();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, "node");
        assert_eq!(updates[0].3, DValue::Int(21));
        let writes = core.writes.lock();
        assert_eq!(writes[0].1, 7);
        assert!(writes[0].2.is_err());
    }

    #[tokio::test]
    async fn app_cannot_push_updates() {
        let core = Arc::new(RecordingCore::default());
        let (adapter, _plugin) = adapter(NodeType::App, &core);

        let err = adapter.update("g", "t", DValue::Bool(true)).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::CapabilityMismatch {
                node: "node".into(),
                operation: "update".into(),
            }
        );
        assert!(adapter.write_response(1, Ok(())).await.is_err());
        assert!(core.updates.lock().is_empty());
        assert!(core.writes.lock().is_empty());
    }

    #[tokio::test]
    async fn dropped_core_is_reported() {
        let core = Arc::new(RecordingCore::default());
        let (adapter, _plugin) = adapter(NodeType::Driver, &core);
        drop(core);
        assert_eq!(
            adapter.update("g", "t", DValue::Float(1.5)).await,
            Err(GatewayError::CoreUnavailable)
        );
    }

    #[test]
    fn capability_table_follows_node_type() {
        let core = Arc::new(RecordingCore::default());
        let (driver, _) = adapter(NodeType::Driver, &core);
        let (app, _) = adapter(NodeType::App, &core);
        assert!(matches!(driver.capabilities(), Capabilities::Driver { .. }));
        assert!(matches!(app.capabilities(), Capabilities::App));
    }
}
