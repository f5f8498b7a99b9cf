//! Monitored resource kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kubernetes resource kinds tracked as sensors.
///
/// The set is closed: adding a kind means adding a `ResourceStatus` variant
/// and a normalizer, and the compiler points at every match that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    Node,
    Namespace,
    CronJob,
}

impl ResourceKind {
    /// All kinds, in fetch order.
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Deployment,
        ResourceKind::StatefulSet,
        ResourceKind::DaemonSet,
        ResourceKind::Node,
        ResourceKind::Namespace,
        ResourceKind::CronJob,
    ];

    /// Whether objects of this kind live in a namespace.
    #[must_use]
    pub const fn is_namespaced(self) -> bool {
        !matches!(self, ResourceKind::Node | ResourceKind::Namespace)
    }

    /// Kubernetes kind name (e.g. `StatefulSet`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Deployment => "Deployment",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::DaemonSet => "DaemonSet",
            ResourceKind::Node => "Node",
            ResourceKind::Namespace => "Namespace",
            ResourceKind::CronJob => "CronJob",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_scoped_kinds() {
        assert!(!ResourceKind::Node.is_namespaced());
        assert!(!ResourceKind::Namespace.is_namespaced());
        assert!(ResourceKind::Deployment.is_namespaced());
        assert!(ResourceKind::CronJob.is_namespaced());
    }

    #[test]
    fn test_all_kinds_are_distinct() {
        let mut kinds = ResourceKind::ALL.to_vec();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), ResourceKind::ALL.len());
    }
}
