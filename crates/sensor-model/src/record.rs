//! Observed resource records

use crate::identity::ResourceIdentity;
use crate::kind::ResourceKind;
use crate::status::ResourceStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One observed resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub identity: ResourceIdentity,
    pub status: ResourceStatus,
    /// `metadata.uid`; changes when an object is deleted and recreated
    pub uid: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Opaque `metadata.resourceVersion`. Never part of state comparison.
    pub resource_version: Option<String>,
}

impl ResourceRecord {
    /// Create a record with empty metadata.
    #[must_use]
    pub fn new(identity: ResourceIdentity, status: ResourceStatus) -> Self {
        Self {
            identity,
            status,
            uid: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            created_at: None,
            resource_version: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.identity.kind
    }

    /// Value comparison ignoring `resource_version`.
    #[must_use]
    pub fn same_state(&self, other: &ResourceRecord) -> bool {
        self.identity == other.identity
            && self.status == other.status
            && self.uid == other.uid
            && self.labels == other.labels
            && self.annotations == other.annotations
            && self.created_at == other.created_at
    }
}
