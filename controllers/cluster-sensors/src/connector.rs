//! Kubeconfig-backed cluster connector.

use crate::config::ClusterConfig;
use crate::error::ControllerError;
use crate::supervisor::ClusterConnector;
use cluster_client::{ClusterApi, KubeClusterClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builds a `KubeClusterClient` from each cluster's kubeconfig and context.
#[derive(Debug, Clone, Default)]
pub struct KubeconfigConnector {
    timeout: Option<Duration>,
}

impl KubeconfigConnector {
    /// `timeout` bounds connect and read on every request made by the client.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl ClusterConnector for KubeconfigConnector {
    async fn connect(&self, cluster: &ClusterConfig) -> Result<Arc<dyn ClusterApi>, ControllerError> {
        let client =
            KubeClusterClient::from_kubeconfig(&cluster.kubeconfig, cluster.context.as_deref(), self.timeout)
                .await?;
        info!(
            cluster = %cluster.name,
            context = cluster.context.as_deref().unwrap_or("current-context"),
            "Connected to cluster"
        );
        Ok(Arc::new(client))
    }
}
