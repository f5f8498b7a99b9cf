//! Cluster client errors

use sensor_model::ResourceKind;
use thiserror::Error;

/// Failure of a single list call for one kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network, timeout, 5xx, throttling or an undecodable (partial) response.
    /// Retried on the normal or backoff cadence.
    #[error("transient error listing {kind}: {message}")]
    Transient { kind: ResourceKind, message: String },

    /// Authorization denied or API not served by the cluster.
    /// Not expected to recover without reconfiguration.
    #[error("permanent error listing {kind}: {message}")]
    Permanent { kind: ResourceKind, message: String },
}

impl FetchError {
    pub fn transient(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self::Transient { kind, message: message.into() }
    }

    pub fn permanent(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self::Permanent { kind, message: message.into() }
    }

    /// Classify a `kube::Error` raised while listing `kind`.
    #[must_use]
    pub fn from_kube(kind: ResourceKind, error: &kube::Error) -> Self {
        let message = error.to_string();
        match error {
            kube::Error::Api(response) => {
                if is_permanent_status(response.code) {
                    Self::permanent(kind, message)
                } else {
                    Self::transient(kind, message)
                }
            }
            kube::Error::Auth(_) | kube::Error::InferConfig(_) | kube::Error::BuildRequest(_) => {
                Self::permanent(kind, message)
            }
            _ => Self::transient(kind, message),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Transient { kind, .. } | Self::Permanent { kind, .. } => *kind,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// 401/403 (RBAC), 404/405 (kind not served), 410 (API removed).
const fn is_permanent_status(code: u16) -> bool {
    matches!(code, 401 | 403 | 404 | 405 | 410)
}

/// Errors building a client for a cluster.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Kubeconfig could not be read or resolved
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// Kubernetes client construction failed
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}
