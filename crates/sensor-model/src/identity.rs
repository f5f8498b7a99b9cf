//! Stable resource identity

use crate::kind::ResourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite key identifying one resource across poll cycles.
///
/// Ordering is total (cluster, kind, namespace, name), which gives every
/// snapshot and every diff a deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub cluster: String,
    pub kind: ResourceKind,
    /// Empty for cluster-scoped kinds (Node, Namespace)
    pub namespace: String,
    pub name: String,
}

impl ResourceIdentity {
    /// Build an identity, forcing the namespace empty for cluster-scoped kinds.
    pub fn new(
        cluster: impl Into<String>,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: impl Into<String>,
    ) -> Self {
        let namespace = if kind.is_namespaced() {
            namespace.unwrap_or_default().to_string()
        } else {
            String::new()
        };
        Self {
            cluster: cluster.into(),
            kind,
            namespace,
            name: name.into(),
        }
    }

    /// Namespace, or `None` for cluster-scoped resources.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        (!self.namespace.is_empty()).then_some(self.namespace.as_str())
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace() {
            Some(ns) => write!(f, "{}/{}/{}/{}", self.cluster, self.kind, ns, self.name),
            None => write!(f, "{}/{}/{}", self.cluster, self.kind, self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_scoped_identity_drops_namespace() {
        let id = ResourceIdentity::new("prod", ResourceKind::Node, Some("ignored"), "worker-1");
        assert_eq!(id.namespace, "");
        assert_eq!(id.namespace(), None);
        assert_eq!(id.to_string(), "prod/Node/worker-1");
    }

    #[test]
    fn test_namespaced_identity_display() {
        let id = ResourceIdentity::new("prod", ResourceKind::Deployment, Some("default"), "nginx");
        assert_eq!(id.namespace(), Some("default"));
        assert_eq!(id.to_string(), "prod/Deployment/default/nginx");
    }
}
