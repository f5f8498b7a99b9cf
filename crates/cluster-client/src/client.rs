//! Kubernetes API client
//!
//! Implements `ClusterApi` on top of `kube::Client`. Each call is one
//! cluster-wide `list` with default parameters.

use crate::cluster_trait::ClusterApi;
use crate::error::{ClientError, FetchError};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{Namespace, Node};
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use sensor_model::ResourceKind;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// `ClusterApi` backed by a live Kubernetes client
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Wrap an existing client
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from a kubeconfig file
    ///
    /// # Arguments
    /// * `path` - Path to the kubeconfig file
    /// * `context` - Context to use (defaults to the file's current-context)
    /// * `timeout` - Connect and read timeout applied to every request
    ///
    /// # Errors
    /// Returns `ClientError` if the kubeconfig cannot be read or resolved,
    /// or if the client cannot be constructed from it.
    pub async fn from_kubeconfig(
        path: &Path,
        context: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        debug!("Loading kubeconfig from {}", path.display());
        let kubeconfig = Kubeconfig::read_from(path)?;
        let options = KubeConfigOptions {
            context: context.map(str::to_string),
            ..Default::default()
        };
        let mut config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
        if let Some(timeout) = timeout {
            config.connect_timeout = Some(timeout);
            config.read_timeout = Some(timeout);
        }
        let client = Client::try_from(config)?;
        Ok(Self::new(client))
    }

    async fn list_all<K>(&self, kind: ResourceKind) -> Result<Vec<K>, FetchError>
    where
        K: kube::Resource + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| FetchError::from_kube(kind, &e))?;
        debug!(kind = %kind, count = list.items.len(), "Listed resources");
        Ok(list.items)
    }
}

#[async_trait::async_trait]
impl ClusterApi for KubeClusterClient {
    async fn list_deployments(&self) -> Result<Vec<Deployment>, FetchError> {
        self.list_all(ResourceKind::Deployment).await
    }

    async fn list_stateful_sets(&self) -> Result<Vec<StatefulSet>, FetchError> {
        self.list_all(ResourceKind::StatefulSet).await
    }

    async fn list_daemon_sets(&self) -> Result<Vec<DaemonSet>, FetchError> {
        self.list_all(ResourceKind::DaemonSet).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, FetchError> {
        self.list_all(ResourceKind::Node).await
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, FetchError> {
        self.list_all(ResourceKind::Namespace).await
    }

    async fn list_cron_jobs(&self) -> Result<Vec<CronJob>, FetchError> {
        self.list_all(ResourceKind::CronJob).await
    }
}
