//! Mock ClusterApi for unit testing
//!
//! In-memory cluster that can be configured to fail individual kinds, go
//! unreachable, respond slowly or panic mid-call. Clones share state so a
//! test can keep a handle while the worker owns another.

pub mod helpers;

use crate::cluster_trait::ClusterApi;
use crate::error::FetchError;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{Namespace, Node};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use sensor_model::ResourceKind;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type Key = (String, String);

fn key(meta: &ObjectMeta) -> Key {
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

#[derive(Default)]
struct MockState {
    deployments: BTreeMap<Key, Deployment>,
    stateful_sets: BTreeMap<Key, StatefulSet>,
    daemon_sets: BTreeMap<Key, DaemonSet>,
    nodes: BTreeMap<Key, Node>,
    namespaces: BTreeMap<Key, Namespace>,
    cron_jobs: BTreeMap<Key, CronJob>,
    failures: HashMap<ResourceKind, FetchError>,
    calls: HashMap<ResourceKind, usize>,
    unreachable: bool,
    latency: Duration,
    panic_on_list: bool,
}

/// Mock cluster for testing
#[derive(Clone, Default)]
pub struct MockClusterClient {
    state: Arc<Mutex<MockState>>,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_deployment(&self, obj: Deployment) {
        self.state().deployments.insert(key(&obj.metadata), obj);
    }

    pub fn add_stateful_set(&self, obj: StatefulSet) {
        self.state().stateful_sets.insert(key(&obj.metadata), obj);
    }

    pub fn add_daemon_set(&self, obj: DaemonSet) {
        self.state().daemon_sets.insert(key(&obj.metadata), obj);
    }

    pub fn add_node(&self, obj: Node) {
        self.state().nodes.insert(key(&obj.metadata), obj);
    }

    pub fn add_namespace(&self, obj: Namespace) {
        self.state().namespaces.insert(key(&obj.metadata), obj);
    }

    pub fn add_cron_job(&self, obj: CronJob) {
        self.state().cron_jobs.insert(key(&obj.metadata), obj);
    }

    /// Remove one object. Pass `""` as namespace for cluster-scoped kinds.
    pub fn remove(&self, kind: ResourceKind, namespace: &str, name: &str) -> bool {
        let k = (namespace.to_string(), name.to_string());
        let mut state = self.state();
        match kind {
            ResourceKind::Deployment => state.deployments.remove(&k).is_some(),
            ResourceKind::StatefulSet => state.stateful_sets.remove(&k).is_some(),
            ResourceKind::DaemonSet => state.daemon_sets.remove(&k).is_some(),
            ResourceKind::Node => state.nodes.remove(&k).is_some(),
            ResourceKind::Namespace => state.namespaces.remove(&k).is_some(),
            ResourceKind::CronJob => state.cron_jobs.remove(&k).is_some(),
        }
    }

    /// Make every list of `kind` fail with `error` until cleared.
    pub fn fail(&self, kind: ResourceKind, error: FetchError) {
        self.state().failures.insert(kind, error);
    }

    pub fn clear_failure(&self, kind: ResourceKind) {
        self.state().failures.remove(&kind);
    }

    /// While set, every list fails transiently as if the API server were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Delay applied before every list call.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// While set, every list call panics.
    pub fn set_panic_on_list(&self, panic: bool) {
        self.state().panic_on_list = panic;
    }

    /// Number of list calls made for `kind`, including failed ones.
    pub fn list_calls(&self, kind: ResourceKind) -> usize {
        self.state().calls.get(&kind).copied().unwrap_or(0)
    }

    async fn begin_list(&self, kind: ResourceKind) -> Result<(), FetchError> {
        let latency = {
            let mut state = self.state();
            *state.calls.entry(kind).or_insert(0) += 1;
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let state = self.state();
        if state.panic_on_list {
            drop(state);
            panic!("mock cluster panicked listing {kind}");
        }
        if state.unreachable {
            return Err(FetchError::transient(kind, "connection refused"));
        }
        match state.failures.get(&kind) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ClusterApi for MockClusterClient {
    async fn list_deployments(&self) -> Result<Vec<Deployment>, FetchError> {
        self.begin_list(ResourceKind::Deployment).await?;
        Ok(self.state().deployments.values().cloned().collect())
    }

    async fn list_stateful_sets(&self) -> Result<Vec<StatefulSet>, FetchError> {
        self.begin_list(ResourceKind::StatefulSet).await?;
        Ok(self.state().stateful_sets.values().cloned().collect())
    }

    async fn list_daemon_sets(&self) -> Result<Vec<DaemonSet>, FetchError> {
        self.begin_list(ResourceKind::DaemonSet).await?;
        Ok(self.state().daemon_sets.values().cloned().collect())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, FetchError> {
        self.begin_list(ResourceKind::Node).await?;
        Ok(self.state().nodes.values().cloned().collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, FetchError> {
        self.begin_list(ResourceKind::Namespace).await?;
        Ok(self.state().namespaces.values().cloned().collect())
    }

    async fn list_cron_jobs(&self) -> Result<Vec<CronJob>, FetchError> {
        self.begin_list(ResourceKind::CronJob).await?;
        Ok(self.state().cron_jobs.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replace_by_key() {
        let mock = MockClusterClient::new();
        mock.add_deployment(helpers::deployment("default", "nginx", 3, 1));
        mock.add_deployment(helpers::deployment("default", "nginx", 3, 3));
        let items = mock.list_deployments().await.expect("list");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status.as_ref().and_then(|s| s.ready_replicas), Some(3));
    }

    #[tokio::test]
    async fn test_remove_cluster_scoped() {
        let mock = MockClusterClient::new();
        mock.add_node(helpers::node("worker-1", true));
        assert!(mock.remove(ResourceKind::Node, "", "worker-1"));
        assert!(mock.list_nodes().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_overrides_failures() {
        let mock = MockClusterClient::new();
        mock.fail(ResourceKind::Node, FetchError::permanent(ResourceKind::Node, "forbidden"));
        mock.set_unreachable(true);
        let err = mock.list_nodes().await.expect_err("unreachable");
        assert!(err.is_transient());
        mock.set_unreachable(false);
        mock.clear_failure(ResourceKind::Node);
        assert!(mock.list_nodes().await.is_ok());
        assert_eq!(mock.list_calls(ResourceKind::Node), 2);
    }
}
