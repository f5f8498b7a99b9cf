//! Cluster Client
//!
//! Read-only access to the Kubernetes API for cluster sensors.
//!
//! # Components
//!
//! - **`ClusterApi`**: capability trait, one list call per monitored kind
//! - **`KubeClusterClient`**: `kube::Client`-backed implementation
//! - **`ResourceFetcher`**: one list call plus normalization into `ResourceRecord`s
//! - **`FetchError`**: transient vs permanent classification of list failures
//! - **`MockClusterClient`** (`test-util` feature): in-memory cluster with failure injection
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{KubeClusterClient, ResourceFetcher};
//! use sensor_model::ResourceKind;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeClusterClient::from_kubeconfig(Path::new("/etc/kube/prod.yaml"), None, None).await?;
//! let fetcher = ResourceFetcher::new("prod", Arc::new(client));
//! let deployments = fetcher.fetch(ResourceKind::Deployment).await?;
//! println!("{} deployments", deployments.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod fetcher;
pub mod normalize;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeClusterClient;
pub use error::{ClientError, FetchError};
pub use fetcher::ResourceFetcher;
pub use cluster_trait::ClusterApi;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockClusterClient;
