//! Normalization of Kubernetes objects into `ResourceRecord`s
//!
//! Each function maps one k8s-openapi type onto its `ResourceStatus`
//! variant. Missing counts become zero, missing lists become empty.
//! Objects without `metadata.name` yield `None`.

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{Namespace, Node};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use sensor_model::{
    Condition, CronJobStatus, DaemonSetStatus, DeploymentStatus, NamespaceStatus, NodeAddress,
    NodeStatus, ResourceIdentity, ResourceKind, ResourceRecord, ResourceStatus, StatefulSetStatus,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Convert a k8s `Time` into `DateTime<Utc>` through its RFC 3339 wire form.
fn to_utc<T: Serialize>(time: &T) -> Option<DateTime<Utc>> {
    let value = serde_json::to_value(time).ok()?;
    let text = value.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn quantities(map: Option<&BTreeMap<String, Quantity>>) -> BTreeMap<String, String> {
    map.map(|m| m.iter().map(|(k, q)| (k.clone(), q.0.clone())).collect())
        .unwrap_or_default()
}

/// Common metadata mapping shared by every kind.
fn record(
    cluster: &str,
    kind: ResourceKind,
    meta: &ObjectMeta,
    status: ResourceStatus,
) -> Option<ResourceRecord> {
    let Some(name) = meta.name.as_deref() else {
        debug!(kind = %kind, "Skipping object without metadata.name");
        return None;
    };
    let identity = ResourceIdentity::new(cluster, kind, meta.namespace.as_deref(), name);
    Some(ResourceRecord {
        identity,
        status,
        uid: meta.uid.clone(),
        labels: meta.labels.clone().unwrap_or_default(),
        annotations: meta.annotations.clone().unwrap_or_default(),
        created_at: meta.creation_timestamp.as_ref().and_then(to_utc),
        resource_version: meta.resource_version.clone(),
    })
}

#[must_use]
pub fn deployment(cluster: &str, obj: &Deployment) -> Option<ResourceRecord> {
    let status = obj.status.as_ref();
    let summary = DeploymentStatus {
        desired: status.and_then(|s| s.replicas).unwrap_or(0),
        ready: status.and_then(|s| s.ready_replicas).unwrap_or(0),
        available: status.and_then(|s| s.available_replicas).unwrap_or(0),
        updated: status.and_then(|s| s.updated_replicas).unwrap_or(0),
        unavailable: status.and_then(|s| s.unavailable_replicas).unwrap_or(0),
        conditions: status
            .and_then(|s| s.conditions.as_ref())
            .map(|cs| cs.iter().map(|c| Condition::new(&c.type_, &c.status)).collect())
            .unwrap_or_default(),
    };
    record(cluster, ResourceKind::Deployment, &obj.metadata, ResourceStatus::Deployment(summary))
}

#[must_use]
pub fn stateful_set(cluster: &str, obj: &StatefulSet) -> Option<ResourceRecord> {
    let status = obj.status.as_ref();
    let summary = StatefulSetStatus {
        desired: status.map_or(0, |s| s.replicas),
        ready: status.and_then(|s| s.ready_replicas).unwrap_or(0),
        current: status.and_then(|s| s.current_replicas).unwrap_or(0),
        updated: status.and_then(|s| s.updated_replicas).unwrap_or(0),
    };
    record(cluster, ResourceKind::StatefulSet, &obj.metadata, ResourceStatus::StatefulSet(summary))
}

#[must_use]
pub fn daemon_set(cluster: &str, obj: &DaemonSet) -> Option<ResourceRecord> {
    let status = obj.status.as_ref();
    let summary = DaemonSetStatus {
        desired_scheduled: status.map_or(0, |s| s.desired_number_scheduled),
        current_scheduled: status.map_or(0, |s| s.current_number_scheduled),
        ready: status.map_or(0, |s| s.number_ready),
        available: status.and_then(|s| s.number_available).unwrap_or(0),
    };
    record(cluster, ResourceKind::DaemonSet, &obj.metadata, ResourceStatus::DaemonSet(summary))
}

#[must_use]
pub fn node(cluster: &str, obj: &Node) -> Option<ResourceRecord> {
    let status = obj.status.as_ref();
    let conditions: Vec<Condition> = status
        .and_then(|s| s.conditions.as_ref())
        .map(|cs| cs.iter().map(|c| Condition::new(&c.type_, &c.status)).collect())
        .unwrap_or_default();
    let ready = conditions.iter().any(|c| c.type_ == "Ready" && c.is_true());
    let summary = NodeStatus {
        ready,
        conditions,
        addresses: status
            .and_then(|s| s.addresses.as_ref())
            .map(|xs| {
                xs.iter()
                    .map(|a| NodeAddress { type_: a.type_.clone(), address: a.address.clone() })
                    .collect()
            })
            .unwrap_or_default(),
        capacity: quantities(status.and_then(|s| s.capacity.as_ref())),
        allocatable: quantities(status.and_then(|s| s.allocatable.as_ref())),
    };
    record(cluster, ResourceKind::Node, &obj.metadata, ResourceStatus::Node(summary))
}

#[must_use]
pub fn namespace(cluster: &str, obj: &Namespace) -> Option<ResourceRecord> {
    let summary = NamespaceStatus {
        phase: obj.status.as_ref().and_then(|s| s.phase.clone()),
    };
    record(cluster, ResourceKind::Namespace, &obj.metadata, ResourceStatus::Namespace(summary))
}

#[must_use]
pub fn cron_job(cluster: &str, obj: &CronJob) -> Option<ResourceRecord> {
    let spec = obj.spec.as_ref();
    let status = obj.status.as_ref();
    let summary = CronJobStatus {
        schedule: spec.map(|s| s.schedule.clone()).unwrap_or_default(),
        suspend: spec.and_then(|s| s.suspend).unwrap_or(false),
        last_schedule_time: status
            .and_then(|s| s.last_schedule_time.as_ref())
            .and_then(to_utc),
        active_jobs: status
            .and_then(|s| s.active.as_ref())
            .map(|refs| refs.iter().filter_map(|r| r.name.clone()).collect())
            .unwrap_or_default(),
    };
    record(cluster, ResourceKind::CronJob, &obj.metadata, ResourceStatus::CronJob(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::DeploymentStatus as K8sDeploymentStatus;
    use k8s_openapi::api::batch::v1::CronJobSpec;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus as K8sNodeStatus};

    fn meta(name: Option<&str>, namespace: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: name.map(str::to_string),
            namespace: namespace.map(str::to_string),
            uid: Some("0b6f3a4e-0000-0000-0000-000000000001".to_string()),
            resource_version: Some("42".to_string()),
            labels: Some(BTreeMap::from([("app".to_string(), "nginx".to_string())])),
            ..Default::default()
        }
    }

    #[test]
    fn test_deployment_counts_and_metadata() {
        let obj = Deployment {
            metadata: meta(Some("nginx"), Some("default")),
            status: Some(K8sDeploymentStatus {
                replicas: Some(3),
                ready_replicas: Some(2),
                available_replicas: Some(2),
                updated_replicas: Some(3),
                unavailable_replicas: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };
        let Some(rec) = deployment("prod", &obj) else {
            panic!("named deployment should normalize");
        };
        assert_eq!(rec.identity, ResourceIdentity::new("prod", ResourceKind::Deployment, Some("default"), "nginx"));
        assert_eq!(rec.resource_version.as_deref(), Some("42"));
        assert_eq!(rec.labels.get("app").map(String::as_str), Some("nginx"));
        match rec.status {
            ResourceStatus::Deployment(s) => {
                assert_eq!((s.desired, s.ready, s.available, s.unavailable), (3, 2, 2, 1));
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn test_deployment_without_status_defaults_to_zero() {
        let obj = Deployment { metadata: meta(Some("idle"), Some("default")), ..Default::default() };
        let rec = deployment("prod", &obj);
        assert!(matches!(
            rec.map(|r| r.status),
            Some(ResourceStatus::Deployment(DeploymentStatus { desired: 0, ready: 0, .. }))
        ));
    }

    #[test]
    fn test_unnamed_object_is_skipped() {
        let obj = Namespace { metadata: meta(None, None), ..Default::default() };
        assert!(namespace("prod", &obj).is_none());
    }

    #[test]
    fn test_node_ready_condition() {
        let obj = Node {
            metadata: meta(Some("worker-1"), None),
            status: Some(K8sNodeStatus {
                conditions: Some(vec![
                    NodeCondition { type_: "MemoryPressure".to_string(), status: "False".to_string(), ..Default::default() },
                    NodeCondition { type_: "Ready".to_string(), status: "True".to_string(), ..Default::default() },
                ]),
                capacity: Some(BTreeMap::from([("memory".to_string(), Quantity("8Gi".to_string()))])),
                ..Default::default()
            }),
            ..Default::default()
        };
        let Some(rec) = node("prod", &obj) else {
            panic!("named node should normalize");
        };
        assert_eq!(rec.identity.namespace, "");
        match rec.status {
            ResourceStatus::Node(s) => {
                assert!(s.ready);
                assert_eq!(s.conditions.len(), 2);
                assert_eq!(s.capacity.get("memory").map(String::as_str), Some("8Gi"));
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn test_node_without_conditions_is_not_ready() {
        let obj = Node { metadata: meta(Some("worker-2"), None), ..Default::default() };
        assert!(matches!(
            node("prod", &obj).map(|r| r.status),
            Some(ResourceStatus::Node(NodeStatus { ready: false, .. }))
        ));
    }

    #[test]
    fn test_cron_job_schedule_and_suspend() {
        let obj = CronJob {
            metadata: meta(Some("backup"), Some("ops")),
            spec: Some(CronJobSpec {
                schedule: "0 3 * * *".to_string(),
                suspend: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        match cron_job("prod", &obj).map(|r| r.status) {
            Some(ResourceStatus::CronJob(s)) => {
                assert_eq!(s.schedule, "0 3 * * *");
                assert!(s.suspend);
                assert!(s.last_schedule_time.is_none());
                assert!(s.active_jobs.is_empty());
            }
            other => panic!("unexpected status {other:?}"),
        }
    }
}
