//! ClusterApi trait for mocking
//!
//! This trait abstracts the Kubernetes list capability so the controller can
//! run against `KubeClusterClient` in production and a mock in unit tests.

use crate::error::FetchError;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{Namespace, Node};

/// Read-only, already-authenticated handle to one cluster.
///
/// Every method is a single list call across all namespaces with no retries.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_deployments(&self) -> Result<Vec<Deployment>, FetchError>;
    async fn list_stateful_sets(&self) -> Result<Vec<StatefulSet>, FetchError>;
    async fn list_daemon_sets(&self) -> Result<Vec<DaemonSet>, FetchError>;
    async fn list_nodes(&self) -> Result<Vec<Node>, FetchError>;
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, FetchError>;
    async fn list_cron_jobs(&self) -> Result<Vec<CronJob>, FetchError>;
}
