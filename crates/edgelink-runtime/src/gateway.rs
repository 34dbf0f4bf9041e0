//! [`Gateway`] – the running gateway core.
//!
//! # Node lifecycle
//!
//! | Operation | Plugin sees | Status effect | Event |
//! |---|---|---|---|
//! | [`Gateway::add_node`] | – | registered at `{Idle, Disconnected}` | `NodeAdded` |
//! | [`Gateway::del_node`] | – | removed | `NodeDeleted` |
//! | [`Gateway::node_ctl`] `Start` | `NodeCtl` command | running walked up to `Running` | `NodeControlled` |
//! | [`Gateway::node_ctl`] `Stop` | `NodeCtl` command | `Stopped`, link `Disconnected` | `NodeControlled` |
//! | [`Gateway::node_setting`] | `NodeSetting` command | `Idle`/`Init` → `Ready` | `NodeSettingChanged` |
//! | [`Gateway::add_group`] / [`Gateway::del_group`] | – | – | `GroupAdded` / `GroupDeleted` |
//!
//! A failed command to a driver node drops that node's link to
//! `Disconnected`; observers learn about it from the next heartbeat.
//!
//! # Data path
//!
//! Drivers push values through [`Adapter::update`], which lands in the
//! gateway's latest-value cache.  Apps read them back with a `ReadGroup`
//! command sent through [`Gateway::send`]; the reply is built from the cache
//! without involving the driver.  `WriteTag` commands go to the driver and
//! the driver's later [`Adapter::write_response`] is routed back to whoever
//! issued the token.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use edgelink_kernel::NodeStatusTracker;
use edgelink_middleware::{
    Adapter, AdapterMetrics, CORE_NODE, CoreContext, DeliveryReport, Dispatcher, Plugin,
};
use edgelink_types::{
    DValue, GatewayError, HeartbeatSnapshot, LifecycleEvent, LinkStatus, NodeCtl, NodeStatus,
    NodeType, ReqRespData, ReqRespHead, RequestToken, RunningStatus, TagValue,
};
use parking_lot::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type GroupKey = (String, String);
/// (driver, token)
type WriteKey = (String, RequestToken);

pub struct Gateway {
    me: Weak<Gateway>,
    tracker: NodeStatusTracker,
    dispatcher: Dispatcher,
    /// node -> plugin name it was created from
    plugins: RwLock<HashMap<String, String>>,
    /// (driver, group) -> poll interval in ms
    groups: RwLock<BTreeMap<GroupKey, u32>>,
    /// (driver, group) -> tag -> latest value
    tags: RwLock<HashMap<GroupKey, BTreeMap<String, TagValue>>>,
    /// (driver, write token) -> head of the `WriteTag` that issued it
    pending_writes: Mutex<HashMap<WriteKey, ReqRespHead>>,
}

impl Gateway {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            tracker: NodeStatusTracker::new(),
            dispatcher: Dispatcher::new(),
            plugins: RwLock::new(HashMap::new()),
            groups: RwLock::new(BTreeMap::new()),
            tags: RwLock::new(HashMap::new()),
            pending_writes: Mutex::new(HashMap::new()),
        })
    }

    pub fn tracker(&self) -> &NodeStatusTracker {
        &self.tracker
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn status(&self, node: &str) -> Option<NodeStatus> {
        self.tracker.status(node)
    }

    pub fn snapshot(&self) -> HeartbeatSnapshot {
        self.tracker.snapshot()
    }

    /// Plugin name `node` was created from.
    pub fn plugin_of(&self, node: &str) -> Option<String> {
        self.plugins.read().get(node).cloned()
    }

    // -----------------------------------------------------------------------
    // Node lifecycle
    // -----------------------------------------------------------------------

    pub async fn add_node(
        &self,
        name: &str,
        plugin_name: &str,
        kind: NodeType,
        plugin: Arc<dyn Plugin>,
    ) -> Result<Arc<Adapter>, GatewayError> {
        self.add_node_with_metrics(name, plugin_name, kind, plugin, Arc::new(AdapterMetrics::new()))
            .await
    }

    /// Add a node whose adapter shares `metrics` with its plugin.
    pub async fn add_node_with_metrics(
        &self,
        name: &str,
        plugin_name: &str,
        kind: NodeType,
        plugin: Arc<dyn Plugin>,
        metrics: Arc<AdapterMetrics>,
    ) -> Result<Arc<Adapter>, GatewayError> {
        self.tracker.register(name)?;

        let core: Weak<dyn CoreContext> = self.me.clone();
        let adapter = Adapter::with_metrics(name, kind, plugin, core, metrics);
        let adapter = match self.dispatcher.register(adapter) {
            Ok(adapter) => adapter,
            Err(e) => {
                // Keep status and adapter in lockstep.
                if let Err(rollback) = self.tracker.remove(name) {
                    warn!(node = %name, error = %rollback, "status rollback failed");
                }
                return Err(e);
            }
        };
        self.plugins
            .write()
            .insert(name.to_string(), plugin_name.to_string());
        info!(node = %name, plugin = %plugin_name, %kind, "node added");

        self.dispatcher
            .emit(LifecycleEvent::NodeAdded {
                node: name.to_string(),
                plugin: plugin_name.to_string(),
            })
            .await;
        Ok(adapter)
    }

    pub async fn del_node(&self, name: &str) -> Result<(), GatewayError> {
        self.dispatcher.unregister(name)?;
        if let Err(e) = self.tracker.remove(name) {
            warn!(node = %name, error = %e, "adapter had no status entry");
        }
        self.plugins.write().remove(name);
        self.groups.write().retain(|(driver, _), _| driver != name);
        self.tags.write().retain(|(driver, _), _| driver != name);
        self.pending_writes
            .lock()
            .retain(|(driver, _), head| driver != name && head.sender != name);
        info!(node = %name, "node deleted");

        self.dispatcher
            .emit(LifecycleEvent::NodeDeleted {
                node: name.to_string(),
            })
            .await;
        Ok(())
    }

    /// Start or stop `name`.  The plugin is told first; status only moves
    /// when it accepts.
    pub async fn node_ctl(&self, name: &str, ctl: NodeCtl) -> Result<NodeStatus, GatewayError> {
        let data = ReqRespData::NodeCtl(ctl);
        let head = ReqRespHead::for_data(&data, CORE_NODE, name);
        self.command_node(head, data).await?;

        let status = match ctl {
            NodeCtl::Start => self.walk_to_running(name)?,
            NodeCtl::Stop => self.tracker.transition(
                name,
                NodeStatus::new(RunningStatus::Stopped, LinkStatus::Disconnected),
            )?,
        };
        info!(node = %name, ?ctl, %status, "node controlled");

        self.dispatcher
            .emit(LifecycleEvent::NodeControlled {
                node: name.to_string(),
                ctl,
            })
            .await;
        Ok(status)
    }

    fn walk_to_running(&self, name: &str) -> Result<NodeStatus, GatewayError> {
        let mut status = self
            .tracker
            .status(name)
            .ok_or_else(|| GatewayError::NodeNotFound(name.to_string()))?;
        while let Some(next) = status.running.next_towards_running() {
            status = self.tracker.set_running(name, next)?;
        }
        Ok(status)
    }

    /// Hand a new opaque setting blob to `name`.
    pub async fn node_setting(&self, name: &str, setting: &str) -> Result<NodeStatus, GatewayError> {
        let data = ReqRespData::NodeSetting(setting.to_string());
        let head = ReqRespHead::for_data(&data, CORE_NODE, name);
        self.command_node(head, data).await?;

        let mut status = self
            .tracker
            .status(name)
            .ok_or_else(|| GatewayError::NodeNotFound(name.to_string()))?;
        while matches!(status.running, RunningStatus::Idle | RunningStatus::Init) {
            let Some(next) = status.running.next_towards_running() else {
                break;
            };
            status = self.tracker.set_running(name, next)?;
        }
        debug!(node = %name, %status, "node setting applied");

        self.dispatcher
            .emit(LifecycleEvent::NodeSettingChanged {
                node: name.to_string(),
                setting: setting.to_string(),
            })
            .await;
        Ok(status)
    }

    /// Report a change of `name`'s transport connectivity.
    pub fn report_link(&self, name: &str, link: LinkStatus) -> Result<NodeStatus, GatewayError> {
        self.tracker.set_link(name, link)
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Create or re-time a polling group on a driver.
    pub async fn add_group(
        &self,
        driver: &str,
        group: &str,
        interval_ms: u32,
    ) -> Result<(), GatewayError> {
        self.require_driver(driver, "add_group")?;
        self.groups
            .write()
            .insert((driver.to_string(), group.to_string()), interval_ms);
        debug!(node = %driver, group, interval_ms, "group added");

        self.dispatcher
            .emit(LifecycleEvent::GroupAdded {
                node: driver.to_string(),
                group: group.to_string(),
                interval_ms,
            })
            .await;
        Ok(())
    }

    pub async fn del_group(&self, driver: &str, group: &str) -> Result<(), GatewayError> {
        let key = (driver.to_string(), group.to_string());
        if self.groups.write().remove(&key).is_none() {
            return Err(GatewayError::NodeNotFound(format!("{driver}/{group}")));
        }
        self.tags.write().remove(&key);
        debug!(node = %driver, group, "group deleted");

        self.dispatcher
            .emit(LifecycleEvent::GroupDeleted {
                node: driver.to_string(),
                group: group.to_string(),
            })
            .await;
        Ok(())
    }

    /// Groups of `driver` with their intervals, sorted by name.
    pub fn groups(&self, driver: &str) -> Vec<(String, u32)> {
        self.groups
            .read()
            .iter()
            .filter(|((d, _), _)| d == driver)
            .map(|((_, g), interval)| (g.clone(), *interval))
            .collect()
    }

    /// Cached values of one group, sorted by tag name.
    pub fn tag_values(&self, driver: &str, group: &str) -> Vec<TagValue> {
        self.tags
            .read()
            .get(&(driver.to_string(), group.to_string()))
            .map(|tags| tags.values().cloned().collect())
            .unwrap_or_default()
    }

    fn require_driver(&self, node: &str, operation: &str) -> Result<(), GatewayError> {
        let adapter = self
            .dispatcher
            .get(node)
            .ok_or_else(|| GatewayError::NodeNotFound(node.to_string()))?;
        if adapter.kind() != NodeType::Driver {
            return Err(GatewayError::CapabilityMismatch {
                node: node.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn require_group(&self, driver: &str, group: &str) -> Result<(), GatewayError> {
        if self
            .groups
            .read()
            .contains_key(&(driver.to_string(), group.to_string()))
        {
            Ok(())
        } else {
            Err(GatewayError::NodeNotFound(format!("{driver}/{group}")))
        }
    }

    // -----------------------------------------------------------------------
    // Message routing
    // -----------------------------------------------------------------------

    /// Route a command issued by a node.
    ///
    /// `ReadGroup` and `WriteTag` must be addressed to the driver their
    /// payload names.
    pub async fn send(&self, head: ReqRespHead, data: ReqRespData) -> Result<(), GatewayError> {
        match data {
            ReqRespData::ReadGroup { driver, group } => {
                Self::require_addressed_to(&head, &driver)?;
                self.require_driver(&driver, "read_group")?;
                self.require_group(&driver, &group)?;
                let values = self.tag_values(&driver, &group);
                let resp = ReqRespData::RespReadGroup {
                    driver,
                    group,
                    values,
                };
                let reply = head.reply(&resp);
                self.dispatcher.send_response(reply, resp).await
            }
            ReqRespData::WriteTag {
                driver,
                group,
                tag,
                value,
                token,
            } => {
                Self::require_addressed_to(&head, &driver)?;
                let key = (head.receiver.clone(), token);
                {
                    let mut pending = self.pending_writes.lock();
                    if pending.contains_key(&key) {
                        warn!(node = %key.0, token, sender = %head.sender, "write token already in flight");
                        return Err(GatewayError::WriteInFlight {
                            driver: key.0,
                            token,
                        });
                    }
                    pending.insert(key.clone(), head.clone());
                }
                let data = ReqRespData::WriteTag {
                    driver,
                    group,
                    tag,
                    value,
                    token,
                };
                let result = self.command_node(head, data).await;
                if result.is_err() {
                    self.pending_writes.lock().remove(&key);
                }
                result
            }
            data => self.command_node(head, data).await,
        }
    }

    fn require_addressed_to(head: &ReqRespHead, driver: &str) -> Result<(), GatewayError> {
        if head.receiver != driver {
            warn!(receiver = %head.receiver, driver, kind = %head.kind, "payload names another driver");
            return Err(GatewayError::NodeNotFound(driver.to_string()));
        }
        Ok(())
    }

    /// Deliver a command and degrade a driver's link when it fails.
    async fn command_node(&self, head: ReqRespHead, data: ReqRespData) -> Result<(), GatewayError> {
        let receiver = head.receiver.clone();
        let kind = head.kind;
        let result = self.dispatcher.send_command(head, data).await;
        if let Err(e) = &result {
            warn!(node = %receiver, kind = %kind, error = %e, "command failed");
            self.degrade_link(&receiver);
        }
        result
    }

    fn degrade_link(&self, node: &str) {
        let is_driver = self
            .dispatcher
            .get(node)
            .is_some_and(|a| a.kind() == NodeType::Driver);
        if !is_driver {
            return;
        }
        if let Some(status) = self.tracker.status(node)
            && status.link != LinkStatus::Disconnected
            && self.tracker.set_link(node, LinkStatus::Disconnected).is_ok()
        {
            info!(node = %node, "link marked disconnected after command failure");
        }
    }

    // -----------------------------------------------------------------------
    // Heartbeat
    // -----------------------------------------------------------------------

    /// Push one fresh status snapshot to every subscriber.
    pub async fn heartbeat_tick(&self) -> DeliveryReport {
        self.dispatcher.tick(|| self.tracker.snapshot()).await
    }

    /// Tick every `period` until `cancel` fires.
    pub async fn run_heartbeat(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_ms = period.as_millis() as u64, "heartbeat started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.heartbeat_tick().await;
                    if report.failed > 0 {
                        debug!(?report, "heartbeat partially delivered");
                    }
                }
            }
        }
        info!("heartbeat stopped");
    }
}

#[async_trait]
impl CoreContext for Gateway {
    async fn on_update(
        &self,
        driver: &str,
        group: &str,
        tag: &str,
        value: DValue,
    ) -> Result<(), GatewayError> {
        if let Err(e) = self.require_group(driver, group) {
            warn!(node = %driver, group, tag, "update for unknown group dropped");
            return Err(e);
        }
        let entry = TagValue {
            tag: tag.to_string(),
            value,
            timestamp: Utc::now(),
        };
        self.tags
            .write()
            .entry((driver.to_string(), group.to_string()))
            .or_default()
            .insert(tag.to_string(), entry);
        Ok(())
    }

    async fn on_write_response(
        &self,
        driver: &str,
        token: RequestToken,
        result: Result<(), GatewayError>,
    ) -> Result<(), GatewayError> {
        let key = (driver.to_string(), token);
        let Some(request) = self.pending_writes.lock().remove(&key) else {
            warn!(node = %driver, token, "write response for unknown token dropped");
            return Ok(());
        };
        let data = match result {
            Ok(()) => ReqRespData::RespError {
                code: 0,
                message: String::new(),
            },
            Err(e) => ReqRespData::RespError {
                code: e.code(),
                message: e.to_string(),
            },
        };
        let reply = request.reply(&data);
        self.dispatcher.send_response(reply, data).await
    }
}
