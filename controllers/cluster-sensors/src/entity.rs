//! Entity rendering.
//!
//! Turns a `ResourceRecord` into the dashboard-facing view: a deterministic
//! entity id, friendly name, derived state, icon and attribute map.

use sensor_model::{
    CronJobStatus, DaemonSetStatus, DeploymentStatus, NodeStatus, ResourceIdentity, ResourceKind,
    ResourceRecord, ResourceStatus, StatefulSetStatus,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

const BYTES_PER_GIB: f64 = 1_073_741_824.0;

/// Host-facing view of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    pub entity_id: String,
    pub name: String,
    pub state: String,
    pub icon: &'static str,
    pub attributes: Map<String, Value>,
}

impl EntityView {
    #[must_use]
    pub fn render(record: &ResourceRecord) -> Self {
        let identity = &record.identity;
        let mut attributes = match &record.status {
            ResourceStatus::Deployment(s) => deployment_attributes(s),
            ResourceStatus::StatefulSet(s) => stateful_set_attributes(s),
            ResourceStatus::DaemonSet(s) => daemon_set_attributes(s),
            ResourceStatus::Node(s) => node_attributes(s),
            ResourceStatus::Namespace(s) => {
                let mut attrs = Map::new();
                attrs.insert("status".into(), json!(s.phase));
                attrs
            }
            ResourceStatus::CronJob(s) => cron_job_attributes(s),
        };
        attributes.insert("cluster".into(), json!(identity.cluster));
        if let Some(ns) = identity.namespace() {
            attributes.insert("namespace".into(), json!(ns));
        }
        attributes.insert("resource_type".into(), json!(identity.kind.as_str()));
        if !record.labels.is_empty() {
            attributes.insert("labels".into(), json!(record.labels));
        }
        if let Some(created) = record.created_at {
            attributes.insert("creation_timestamp".into(), json!(created.to_rfc3339()));
        }

        Self {
            entity_id: entity_id(identity),
            name: friendly_name(identity),
            state: derive_state(&record.status),
            icon: icon(identity.kind),
            attributes,
        }
    }
}

/// `k8s_{cluster}_{kind}_{namespace}_{name}`, slugified. Cluster-scoped
/// kinds have no namespace segment.
///
/// Slugging is lossy once a segment holds anything outside `[a-z0-9]`
/// (`team-a/api` and `team/a-api` would both become `team_a_api`), so such
/// ids get an 8 hex digit suffix hashed from the exact segments.
#[must_use]
pub fn entity_id(identity: &ResourceIdentity) -> String {
    let kind = identity.kind.as_str().to_ascii_lowercase();
    let mut segments = vec![identity.cluster.as_str(), kind.as_str()];
    segments.extend(identity.namespace());
    segments.push(identity.name.as_str());

    let slug = slugify(&format!("k8s_{}", segments.join("_")));
    if segments.iter().all(|s| is_plain_segment(s)) {
        slug
    } else {
        format!("{slug}_{}", segment_hash(&segments))
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

fn segment_hash(segments: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for segment in segments {
        hasher.update(segment.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().as_str()[..8].to_string()
}

/// Lowercase; runs of anything outside `[a-z0-9]` collapse to one `_`.
fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

#[must_use]
pub fn friendly_name(identity: &ResourceIdentity) -> String {
    match identity.namespace() {
        Some(ns) => format!("{} {}/{}", identity.kind, ns, identity.name),
        None => format!("{} {}", identity.kind, identity.name),
    }
}

#[must_use]
pub const fn icon(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Deployment | ResourceKind::StatefulSet | ResourceKind::DaemonSet => {
            "mdi:application-brackets"
        }
        ResourceKind::Node => "mdi:server",
        ResourceKind::Namespace => "mdi:folder-outline",
        ResourceKind::CronJob => "mdi:clock-outline",
    }
}

#[must_use]
pub fn derive_state(status: &ResourceStatus) -> String {
    match status {
        ResourceStatus::Deployment(s) => deployment_state(s).to_string(),
        ResourceStatus::StatefulSet(s) => stateful_set_state(s).to_string(),
        ResourceStatus::DaemonSet(s) => daemon_set_state(s).to_string(),
        ResourceStatus::Node(s) => if s.ready { "Ready" } else { "NotReady" }.to_string(),
        ResourceStatus::Namespace(s) => s.phase.clone().unwrap_or_else(|| "Unknown".to_string()),
        ResourceStatus::CronJob(s) => s
            .last_schedule_time
            .map_or_else(|| "Never".to_string(), |t| t.to_rfc3339()),
    }
}

fn deployment_state(s: &DeploymentStatus) -> &'static str {
    // First matching condition wins
    for c in &s.conditions {
        if c.type_ == "Progressing" && c.is_false() {
            return "Failed";
        }
        if c.type_ == "Available" && c.is_false() {
            return "Progressing";
        }
    }
    if s.desired == 0 {
        "Stopped"
    } else if s.available == s.desired {
        "Running"
    } else {
        "Progressing"
    }
}

fn stateful_set_state(s: &StatefulSetStatus) -> &'static str {
    if s.desired == 0 {
        "Stopped"
    } else if s.ready == s.desired && s.updated == s.desired {
        "Running"
    } else if s.current > 0 {
        "Progressing"
    } else {
        "Failed"
    }
}

fn daemon_set_state(s: &DaemonSetStatus) -> &'static str {
    if s.desired_scheduled == 0 {
        "Stopped"
    } else if s.ready == s.desired_scheduled && s.available == s.desired_scheduled {
        "Running"
    } else if s.ready > 0 {
        "Progressing"
    } else {
        "Failed"
    }
}

fn deployment_attributes(s: &DeploymentStatus) -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert("replicas".into(), json!(s.desired));
    attrs.insert("ready_replicas".into(), json!(s.ready));
    attrs.insert("available_replicas".into(), json!(s.available));
    attrs.insert("updated_replicas".into(), json!(s.updated));
    attrs.insert("unavailable_replicas".into(), json!(s.unavailable));
    attrs
}

fn stateful_set_attributes(s: &StatefulSetStatus) -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert("replicas".into(), json!(s.desired));
    attrs.insert("ready_replicas".into(), json!(s.ready));
    attrs.insert("current_replicas".into(), json!(s.current));
    attrs.insert("updated_replicas".into(), json!(s.updated));
    attrs
}

fn daemon_set_attributes(s: &DaemonSetStatus) -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert("desired_number_scheduled".into(), json!(s.desired_scheduled));
    attrs.insert("current_number_scheduled".into(), json!(s.current_scheduled));
    attrs.insert("number_ready".into(), json!(s.ready));
    attrs.insert("number_available".into(), json!(s.available));
    attrs
}

fn node_attributes(s: &NodeStatus) -> Map<String, Value> {
    let ip_address = s
        .addresses
        .iter()
        .find(|a| a.type_ == "InternalIP")
        .or_else(|| s.addresses.first())
        .map(|a| a.address.clone());

    let mut attrs = Map::new();
    attrs.insert("ip_address".into(), json!(ip_address));
    attrs.insert("cpu_cores".into(), json!(s.capacity.get("cpu")));
    attrs.insert(
        "memory_capacity_gib".into(),
        json!(s.capacity.get("memory").and_then(|m| memory_to_gib(m))),
    );
    attrs.insert(
        "memory_allocatable_gib".into(),
        json!(s.allocatable.get("memory").and_then(|m| memory_to_gib(m))),
    );
    attrs.insert(
        "addresses".into(),
        json!(s.addresses.iter().map(|a| a.address.as_str()).collect::<Vec<_>>()),
    );
    attrs.insert("capacity".into(), json!(s.capacity));
    attrs.insert("allocatable".into(), json!(s.allocatable));
    attrs.insert("conditions".into(), json!(s.conditions));
    attrs
}

fn cron_job_attributes(s: &CronJobStatus) -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert("schedule".into(), json!(s.schedule));
    attrs.insert("suspend".into(), json!(s.suspend));
    attrs.insert("active".into(), json!(s.active_jobs));
    attrs
}

/// Convert a memory quantity (`Ki`, `Mi`, `Gi` or plain bytes) to whole GiB.
#[must_use]
pub fn memory_to_gib(quantity: &str) -> Option<i64> {
    let quantity = quantity.trim();
    let (number, scale) = if let Some(n) = quantity.strip_suffix("Ki") {
        (n, 1024.0)
    } else if let Some(n) = quantity.strip_suffix("Mi") {
        (n, 1024.0 * 1024.0)
    } else if let Some(n) = quantity.strip_suffix("Gi") {
        (n, BYTES_PER_GIB)
    } else {
        (quantity, 1.0)
    };
    let value: f64 = number.trim().parse().ok()?;
    let gib = (value * scale / BYTES_PER_GIB).round();
    if !gib.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, reason = "node memory in GiB fits in i64")]
    let whole = gib as i64;
    Some(whole)
}
