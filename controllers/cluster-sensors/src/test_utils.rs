//! Test utilities for unit testing the reconciler, worker and supervisor
//!
//! Record and snapshot builders, a sink that captures what it receives and a
//! connector that hands out `MockClusterClient`s by cluster name.

use crate::config::ClusterConfig;
use crate::error::ControllerError;
use crate::sink::{EntitySink, SinkError};
use crate::supervisor::ClusterConnector;
use cluster_client::{ClusterApi, MockClusterClient};
use sensor_model::{
    ClusterSnapshot, DeploymentStatus, DiffEvent, NodeStatus, ResourceIdentity, ResourceKind,
    ResourceRecord, ResourceStatus, SnapshotBuilder,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Helper to create a Deployment record with `ready` of `desired` replicas available
pub fn deployment_record(cluster: &str, namespace: &str, name: &str, desired: i32, ready: i32) -> ResourceRecord {
    ResourceRecord::new(
        ResourceIdentity::new(cluster, ResourceKind::Deployment, Some(namespace), name),
        ResourceStatus::Deployment(DeploymentStatus {
            desired,
            ready,
            available: ready,
            updated: desired,
            unavailable: desired - ready,
            conditions: Vec::new(),
        }),
    )
}

/// Helper to create a Node record
pub fn node_record(cluster: &str, name: &str, ready: bool) -> ResourceRecord {
    ResourceRecord::new(
        ResourceIdentity::new(cluster, ResourceKind::Node, None, name),
        ResourceStatus::Node(NodeStatus { ready, ..Default::default() }),
    )
}

/// Healthy snapshot holding exactly `records`
pub fn snapshot(cluster: &str, records: Vec<ResourceRecord>) -> ClusterSnapshot {
    snapshot_with_failed(cluster, records, &[])
}

/// Snapshot holding `records` with `failed` kinds marked stale
pub fn snapshot_with_failed(
    cluster: &str,
    records: Vec<ResourceRecord>,
    failed: &[ResourceKind],
) -> ClusterSnapshot {
    let mut builder = SnapshotBuilder::new(cluster);
    builder.add_kind(records);
    for kind in failed {
        builder.mark_failed(*kind);
    }
    builder.build().snapshot
}

/// Sink that records every accepted diff and can be switched to reject them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    accepted: Mutex<Vec<(String, Vec<DiffEvent>)>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls made, including rejected ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Accepted diffs in arrival order
    pub fn accepted(&self) -> Vec<(String, Vec<DiffEvent>)> {
        self.accepted.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// All accepted events for one cluster, flattened
    pub fn events_for(&self, cluster: &str) -> Vec<DiffEvent> {
        self.accepted()
            .into_iter()
            .filter(|(c, _)| c == cluster)
            .flat_map(|(_, events)| events)
            .collect()
    }
}

impl EntitySink for RecordingSink {
    fn apply_diff(&self, cluster: &str, events: &[DiffEvent]) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Rejected("host unavailable".to_string()));
        }
        self.accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((cluster.to_string(), events.to_vec()));
        Ok(())
    }
}

/// Connector serving preconfigured mock clusters by name.
#[derive(Default)]
pub struct MockConnector {
    clusters: HashMap<String, MockClusterClient>,
    failing: Mutex<HashSet<String>>,
    connects: Mutex<HashMap<String, usize>>,
}

impl MockConnector {
    pub fn new<'a>(clusters: impl IntoIterator<Item = (&'a str, MockClusterClient)>) -> Self {
        Self {
            clusters: clusters.into_iter().map(|(n, c)| (n.to_string(), c)).collect(),
            ..Default::default()
        }
    }

    /// While set, connecting to `cluster` fails.
    pub fn fail_connects(&self, cluster: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap_or_else(PoisonError::into_inner);
        if failing {
            set.insert(cluster.to_string());
        } else {
            set.remove(cluster);
        }
    }

    /// Connection attempts for `cluster`, including failed ones
    pub fn connects(&self, cluster: &str) -> usize {
        self.connects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(cluster)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl ClusterConnector for MockConnector {
    async fn connect(&self, cluster: &ClusterConfig) -> Result<Arc<dyn ClusterApi>, ControllerError> {
        *self
            .connects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(cluster.name.clone())
            .or_insert(0) += 1;
        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&cluster.name)
        {
            return Err(ControllerError::InvalidConfig(format!(
                "cannot read kubeconfig {}",
                cluster.kubeconfig.display()
            )));
        }
        let client = self.clusters.get(&cluster.name).cloned().ok_or_else(|| {
            ControllerError::InvalidConfig(format!("unknown cluster {}", cluster.name))
        })?;
        Ok(Arc::new(client))
    }
}
