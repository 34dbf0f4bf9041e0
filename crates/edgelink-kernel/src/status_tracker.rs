//! [`NodeStatusTracker`] – per-node status state machine.
//!
//! Every node owns exactly one [`NodeStatus`] from [`register`] until
//! [`remove`].  Mutations go through the legal-edge tables of
//! [`LinkStatus::can_transition_to`] and [`RunningStatus::can_transition_to`];
//! an illegal request returns [`GatewayError::InvalidTransition`] and leaves
//! the stored pair untouched.
//!
//! [`snapshot`] copies all pairs under the read lock, in registration order,
//! so a reader sees either the old or the new pair of a concurrent writer and
//! never a mix of the two halves.
//!
//! [`register`]: NodeStatusTracker::register
//! [`remove`]: NodeStatusTracker::remove
//! [`snapshot`]: NodeStatusTracker::snapshot

use edgelink_types::{
    GatewayError, HeartbeatSnapshot, LinkStatus, NodeState, NodeStatus, RunningStatus,
};
use parking_lot::RwLock;
use tracing::{debug, warn};

// ────────────────────────────────────────────────────────────────────────────
// NodeStatusTracker
// ────────────────────────────────────────────────────────────────────────────

/// Authoritative status table of all known nodes.
///
/// # Example
///
/// ```
/// use edgelink_kernel::NodeStatusTracker;
/// use edgelink_types::{LinkStatus, RunningStatus};
///
/// let tracker = NodeStatusTracker::new();
/// tracker.register("dev1").unwrap();
/// tracker.set_link("dev1", LinkStatus::Connecting).unwrap();
///
/// // Idle cannot jump straight to Running.
/// assert!(tracker.set_running("dev1", RunningStatus::Running).is_err());
/// assert_eq!(tracker.status("dev1").unwrap().running, RunningStatus::Idle);
/// ```
#[derive(Default)]
pub struct NodeStatusTracker {
    // Vec keeps registration order for snapshots; node counts are small.
    nodes: RwLock<Vec<(String, NodeStatus)>>,
}

impl NodeStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `node` at the default `{Idle, Disconnected}` status.
    pub fn register(&self, node: &str) -> Result<(), GatewayError> {
        let mut nodes = self.nodes.write();
        if nodes.iter().any(|(name, _)| name == node) {
            return Err(GatewayError::NodeExists(node.to_string()));
        }
        nodes.push((node.to_string(), NodeStatus::default()));
        debug!(node = %node, "node status registered");
        Ok(())
    }

    /// Stop tracking `node`, returning its last status.
    pub fn remove(&self, node: &str) -> Result<NodeStatus, GatewayError> {
        let mut nodes = self.nodes.write();
        let idx = nodes
            .iter()
            .position(|(name, _)| name == node)
            .ok_or_else(|| GatewayError::NodeNotFound(node.to_string()))?;
        let (_, status) = nodes.remove(idx);
        debug!(node = %node, %status, "node status removed");
        Ok(status)
    }

    /// Move the link half of `node` to `link`.
    pub fn set_link(&self, node: &str, link: LinkStatus) -> Result<NodeStatus, GatewayError> {
        self.apply(node, |current| {
            (
                NodeStatus::new(current.running, link),
                current.link.can_transition_to(link),
            )
        })
    }

    /// Move the running half of `node` to `running`.
    pub fn set_running(
        &self,
        node: &str,
        running: RunningStatus,
    ) -> Result<NodeStatus, GatewayError> {
        self.apply(node, |current| {
            (
                NodeStatus::new(running, current.link),
                current.running.can_transition_to(running),
            )
        })
    }

    /// Move `node` to `target` in one step.
    ///
    /// A half that stays the same is accepted as-is; a half that changes must
    /// follow a legal edge.  Both halves are validated before either is
    /// written.
    pub fn transition(&self, node: &str, target: NodeStatus) -> Result<NodeStatus, GatewayError> {
        self.apply(node, |current| {
            let link_ok =
                current.link == target.link || current.link.can_transition_to(target.link);
            let running_ok = current.running == target.running
                || current.running.can_transition_to(target.running);
            (target, link_ok && running_ok)
        })
    }

    /// Current status of `node`, if tracked.
    pub fn status(&self, node: &str) -> Option<NodeStatus> {
        self.nodes
            .read()
            .iter()
            .find(|(name, _)| name == node)
            .map(|(_, status)| *status)
    }

    pub fn contains(&self, node: &str) -> bool {
        self.status(node).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Copy of every `(node, status)` pair, in registration order.
    pub fn snapshot(&self) -> HeartbeatSnapshot {
        let states = self
            .nodes
            .read()
            .iter()
            .map(|(node, status)| NodeState {
                node: node.clone(),
                status: *status,
            })
            .collect();
        HeartbeatSnapshot::new(states)
    }

    /// Validate and write under one write lock.  `next` maps the current
    /// pair to the requested one and whether the move is legal.
    fn apply<F>(&self, node: &str, next: F) -> Result<NodeStatus, GatewayError>
    where
        F: FnOnce(NodeStatus) -> (NodeStatus, bool),
    {
        let mut nodes = self.nodes.write();
        let (_, status) = nodes
            .iter_mut()
            .find(|(name, _)| name == node)
            .ok_or_else(|| GatewayError::NodeNotFound(node.to_string()))?;

        let from = *status;
        let (to, legal) = next(from);
        if !legal {
            warn!(node = %node, %from, %to, "illegal status transition rejected");
            return Err(GatewayError::InvalidTransition {
                node: node.to_string(),
                from,
                to,
            });
        }
        *status = to;
        debug!(node = %node, %from, %to, "node status changed");
        Ok(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn running(tracker: &NodeStatusTracker, node: &str) -> RunningStatus {
        tracker.status(node).unwrap().running
    }

    #[test]
    fn registered_node_starts_idle_and_disconnected() {
        let tracker = NodeStatusTracker::new();
        tracker.register("dev1").unwrap();
        assert_eq!(tracker.status("dev1"), Some(NodeStatus::default()));
        assert!(tracker.contains("dev1"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn duplicate_register_is_rejected() {
        let tracker = NodeStatusTracker::new();
        tracker.register("dev1").unwrap();
        assert_eq!(
            tracker.register("dev1"),
            Err(GatewayError::NodeExists("dev1".to_string()))
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn remove_unknown_node_fails() {
        let tracker = NodeStatusTracker::new();
        assert_eq!(
            tracker.remove("ghost"),
            Err(GatewayError::NodeNotFound("ghost".to_string()))
        );
    }

    #[test]
    fn driver_bring_up_sequence() {
        let tracker = NodeStatusTracker::new();
        tracker.register("dev1").unwrap();

        tracker.set_link("dev1", LinkStatus::Connecting).unwrap();
        tracker.set_link("dev1", LinkStatus::Connected).unwrap();
        tracker.set_running("dev1", RunningStatus::Init).unwrap();
        tracker.set_running("dev1", RunningStatus::Ready).unwrap();
        let status = tracker.set_running("dev1", RunningStatus::Running).unwrap();
        assert_eq!(
            status,
            NodeStatus::new(RunningStatus::Running, LinkStatus::Connected)
        );

        tracker.set_link("dev1", LinkStatus::Disconnected).unwrap();
        let snapshot = tracker.snapshot();
        assert_eq!(
            snapshot.get("dev1"),
            Some(NodeStatus::new(
                RunningStatus::Running,
                LinkStatus::Disconnected
            ))
        );
    }

    #[test]
    fn illegal_link_jump_leaves_state_unchanged() {
        let tracker = NodeStatusTracker::new();
        tracker.register("dev1").unwrap();
        let err = tracker.set_link("dev1", LinkStatus::Connected).unwrap_err();
        assert_eq!(
            err,
            GatewayError::InvalidTransition {
                node: "dev1".to_string(),
                from: NodeStatus::default(),
                to: NodeStatus::new(RunningStatus::Idle, LinkStatus::Connected),
            }
        );
        assert_eq!(tracker.status("dev1"), Some(NodeStatus::default()));
    }

    #[test]
    fn illegal_running_jump_leaves_state_unchanged() {
        let tracker = NodeStatusTracker::new();
        tracker.register("dev1").unwrap();
        assert!(tracker.set_running("dev1", RunningStatus::Running).is_err());
        assert_eq!(running(&tracker, "dev1"), RunningStatus::Idle);
    }

    #[test]
    fn stop_is_reachable_from_anywhere_and_left_through_idle() {
        let tracker = NodeStatusTracker::new();
        tracker.register("dev1").unwrap();
        tracker.set_running("dev1", RunningStatus::Init).unwrap();
        tracker.set_running("dev1", RunningStatus::Stopped).unwrap();
        tracker.set_running("dev1", RunningStatus::Stopped).unwrap();

        assert!(tracker.set_running("dev1", RunningStatus::Running).is_err());
        tracker.set_running("dev1", RunningStatus::Idle).unwrap();
        assert_eq!(running(&tracker, "dev1"), RunningStatus::Idle);
    }

    #[test]
    fn transition_checks_both_halves_before_writing() {
        let tracker = NodeStatusTracker::new();
        tracker.register("dev1").unwrap();

        // Running half legal, link half not: nothing changes.
        let target = NodeStatus::new(RunningStatus::Init, LinkStatus::Connected);
        assert!(tracker.transition("dev1", target).is_err());
        assert_eq!(tracker.status("dev1"), Some(NodeStatus::default()));

        let target = NodeStatus::new(RunningStatus::Init, LinkStatus::Connecting);
        assert_eq!(tracker.transition("dev1", target), Ok(target));

        // Unchanged halves are accepted.
        let target = NodeStatus::new(RunningStatus::Ready, LinkStatus::Connecting);
        assert_eq!(tracker.transition("dev1", target), Ok(target));
    }

    #[test]
    fn mutations_on_unknown_node_fail() {
        let tracker = NodeStatusTracker::new();
        assert!(matches!(
            tracker.set_link("ghost", LinkStatus::Connecting),
            Err(GatewayError::NodeNotFound(_))
        ));
        assert!(matches!(
            tracker.set_running("ghost", RunningStatus::Init),
            Err(GatewayError::NodeNotFound(_))
        ));
    }

    #[test]
    fn snapshot_keeps_registration_order() {
        let tracker = NodeStatusTracker::new();
        for name in ["c", "a", "b"] {
            tracker.register(name).unwrap();
        }
        tracker.remove("a").unwrap();
        tracker.register("a").unwrap();

        let names: Vec<String> = tracker
            .snapshot()
            .into_states()
            .into_iter()
            .map(|s| s.node)
            .collect();
        assert_eq!(names, ["c", "b", "a"]);
    }

    #[test]
    fn snapshot_never_sees_half_written_pair() {
        let tracker = Arc::new(NodeStatusTracker::new());
        tracker.register("dev1").unwrap();

        let a = NodeStatus::new(RunningStatus::Idle, LinkStatus::Disconnected);
        let b = NodeStatus::new(RunningStatus::Init, LinkStatus::Connecting);

        let writer = {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    // b -> a is not a legal edge, so cycle through Stopped/Idle.
                    tracker.transition("dev1", b).unwrap();
                    tracker
                        .transition(
                            "dev1",
                            NodeStatus::new(RunningStatus::Stopped, LinkStatus::Disconnected),
                        )
                        .unwrap();
                    tracker.transition("dev1", a).unwrap();
                }
            })
        };

        let allowed = [
            a,
            b,
            NodeStatus::new(RunningStatus::Stopped, LinkStatus::Disconnected),
        ];
        for _ in 0..2_000 {
            let seen = tracker.snapshot().get("dev1").unwrap();
            assert!(allowed.contains(&seen), "torn status {seen}");
        }
        writer.join().unwrap();
    }
}
