//! Controller-specific error types.
//!
//! Errors raised by the cluster sensors controller that are not covered by
//! the fetch-level `FetchError` of `cluster-client`.

use crate::sink::SinkError;
use cluster_client::{ClientError, FetchError};
use thiserror::Error;

/// Errors that can occur in the cluster sensors controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Cluster client could not be built (kubeconfig or `kube::Client` failure)
    #[error("Cluster client error: {0}")]
    Client(#[from] ClientError),

    /// Permanent list failure, reported once as a worker fault
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading the cluster configuration file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cluster configuration file is not valid YAML
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Entity sink rejected a diff
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// A cluster worker panicked or exited with an error
    #[error("Worker crashed for cluster {cluster}: {reason}")]
    WorkerCrash { cluster: String, reason: String },

    /// Internal consistency check failed (e.g. duplicate identity in one snapshot)
    #[error("Reconcile invariant violated: {0}")]
    InvariantViolation(String),
}
