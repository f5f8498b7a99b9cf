//! Builders for Kubernetes objects used by the mock and by tests

use k8s_openapi::api::apps::v1::{
    DaemonSet, DaemonSetStatus, Deployment, DeploymentCondition, DeploymentStatus, StatefulSet,
    StatefulSetStatus,
};
use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec};
use k8s_openapi::api::core::v1::{
    Namespace, NamespaceStatus, Node, NodeAddress, NodeCondition, NodeStatus,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

fn meta(namespace: Option<&str>, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        uid: Some(format!("uid-{}-{}", namespace.unwrap_or("cluster"), name)),
        resource_version: Some("1".to_string()),
        ..Default::default()
    }
}

/// Deployment with `desired` replicas of which `ready` are ready and available.
pub fn deployment(namespace: &str, name: &str, desired: i32, ready: i32) -> Deployment {
    let available = if ready >= desired { "True" } else { "False" };
    Deployment {
        metadata: meta(Some(namespace), name),
        status: Some(DeploymentStatus {
            replicas: Some(desired),
            ready_replicas: Some(ready),
            available_replicas: Some(ready),
            updated_replicas: Some(desired),
            unavailable_replicas: Some((desired - ready).max(0)),
            conditions: Some(vec![DeploymentCondition {
                type_: "Available".to_string(),
                status: available.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn stateful_set(namespace: &str, name: &str, desired: i32, ready: i32) -> StatefulSet {
    StatefulSet {
        metadata: meta(Some(namespace), name),
        status: Some(StatefulSetStatus {
            replicas: desired,
            ready_replicas: Some(ready),
            current_replicas: Some(ready),
            updated_replicas: Some(desired),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn daemon_set(namespace: &str, name: &str, desired: i32, ready: i32) -> DaemonSet {
    DaemonSet {
        metadata: meta(Some(namespace), name),
        status: Some(DaemonSetStatus {
            desired_number_scheduled: desired,
            current_number_scheduled: desired,
            number_ready: ready,
            number_available: Some(ready),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn node(name: &str, ready: bool) -> Node {
    Node {
        metadata: meta(None, name),
        status: Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            addresses: Some(vec![NodeAddress {
                type_: "InternalIP".to_string(),
                address: "10.0.0.10".to_string(),
            }]),
            capacity: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity("4".to_string())),
                ("memory".to_string(), Quantity("16384Mi".to_string())),
            ])),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn namespace(name: &str, phase: &str) -> Namespace {
    Namespace {
        metadata: meta(None, name),
        status: Some(NamespaceStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn cron_job(namespace: &str, name: &str, schedule: &str) -> CronJob {
    CronJob {
        metadata: meta(Some(namespace), name),
        spec: Some(CronJobSpec {
            schedule: schedule.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}
