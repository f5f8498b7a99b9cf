//! Kind-specific status summaries
//!
//! One variant per `ResourceKind`, each carrying only the typed fields the
//! sensors surface. Counts default to zero when the API omits them.

use crate::kind::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A `type`/`status` pair from an object's status conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
}

impl Condition {
    pub fn new(type_: impl Into<String>, status: impl Into<String>) -> Self {
        Self { type_: type_.into(), status: status.into() }
    }

    /// `true` when status is exactly `"True"`.
    #[must_use]
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }

    /// `true` when status is exactly `"False"`.
    #[must_use]
    pub fn is_false(&self) -> bool {
        self.status == "False"
    }
}

/// A node address (`InternalIP`, `ExternalIP`, `Hostname`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    #[serde(rename = "type")]
    pub type_: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeploymentStatus {
    /// `status.replicas`
    pub desired: i32,
    pub ready: i32,
    pub available: i32,
    pub updated: i32,
    pub unavailable: i32,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatefulSetStatus {
    pub desired: i32,
    pub ready: i32,
    pub current: i32,
    pub updated: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DaemonSetStatus {
    pub desired_scheduled: i32,
    pub current_scheduled: i32,
    pub ready: i32,
    pub available: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeStatus {
    /// `Ready` condition is `"True"`
    pub ready: bool,
    pub conditions: Vec<Condition>,
    pub addresses: Vec<NodeAddress>,
    /// Raw quantity strings (`cpu`, `memory`, ...)
    pub capacity: BTreeMap<String, String>,
    pub allocatable: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamespaceStatus {
    pub phase: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CronJobStatus {
    pub schedule: String,
    pub suspend: bool,
    pub last_schedule_time: Option<DateTime<Utc>>,
    /// Names of currently running jobs
    pub active_jobs: Vec<String>,
}

/// Typed status summary of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ResourceStatus {
    Deployment(DeploymentStatus),
    StatefulSet(StatefulSetStatus),
    DaemonSet(DaemonSetStatus),
    Node(NodeStatus),
    Namespace(NamespaceStatus),
    CronJob(CronJobStatus),
}

impl ResourceStatus {
    /// Kind this status belongs to.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            ResourceStatus::Deployment(_) => ResourceKind::Deployment,
            ResourceStatus::StatefulSet(_) => ResourceKind::StatefulSet,
            ResourceStatus::DaemonSet(_) => ResourceKind::DaemonSet,
            ResourceStatus::Node(_) => ResourceKind::Node,
            ResourceStatus::Namespace(_) => ResourceKind::Namespace,
            ResourceStatus::CronJob(_) => ResourceKind::CronJob,
        }
    }
}
