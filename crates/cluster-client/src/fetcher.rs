//! Resource fetcher
//!
//! One list call for one kind against one cluster, normalized into
//! `ResourceRecord`s. No retries happen here; the worker owns the cadence.

use crate::cluster_trait::ClusterApi;
use crate::error::FetchError;
use crate::normalize;
use sensor_model::{ResourceKind, ResourceRecord};
use std::sync::Arc;

/// Lists and normalizes one kind at a time for a single cluster.
#[derive(Clone)]
pub struct ResourceFetcher {
    cluster: String,
    api: Arc<dyn ClusterApi>,
}

impl std::fmt::Debug for ResourceFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFetcher")
            .field("cluster", &self.cluster)
            .finish_non_exhaustive()
    }
}

impl ResourceFetcher {
    pub fn new(cluster: impl Into<String>, api: Arc<dyn ClusterApi>) -> Self {
        Self { cluster: cluster.into(), api }
    }

    #[must_use]
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Fetch every object of `kind` across all namespaces.
    ///
    /// The whole call fails as one unit: a list that cannot be retrieved or
    /// decoded yields an error, never a partial result. Objects without a
    /// name are skipped.
    ///
    /// # Errors
    /// Returns the `FetchError` produced by the underlying `ClusterApi`.
    pub async fn fetch(&self, kind: ResourceKind) -> Result<Vec<ResourceRecord>, FetchError> {
        let cluster = self.cluster.as_str();
        let records = match kind {
            ResourceKind::Deployment => self
                .api
                .list_deployments()
                .await?
                .iter()
                .filter_map(|o| normalize::deployment(cluster, o))
                .collect(),
            ResourceKind::StatefulSet => self
                .api
                .list_stateful_sets()
                .await?
                .iter()
                .filter_map(|o| normalize::stateful_set(cluster, o))
                .collect(),
            ResourceKind::DaemonSet => self
                .api
                .list_daemon_sets()
                .await?
                .iter()
                .filter_map(|o| normalize::daemon_set(cluster, o))
                .collect(),
            ResourceKind::Node => self
                .api
                .list_nodes()
                .await?
                .iter()
                .filter_map(|o| normalize::node(cluster, o))
                .collect(),
            ResourceKind::Namespace => self
                .api
                .list_namespaces()
                .await?
                .iter()
                .filter_map(|o| normalize::namespace(cluster, o))
                .collect(),
            ResourceKind::CronJob => self
                .api
                .list_cron_jobs()
                .await?
                .iter()
                .filter_map(|o| normalize::cron_job(cluster, o))
                .collect(),
        };
        Ok(records)
    }
}
