//! Cluster snapshots
//!
//! A `ClusterSnapshot` is the complete picture of one cluster at one poll
//! instant. Snapshots are built once through `SnapshotBuilder` and never
//! mutated afterwards; a worker replaces its snapshot wholesale each cycle.

use crate::identity::ResourceIdentity;
use crate::kind::ResourceKind;
use crate::record::ResourceRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Cluster-level outcome of the fetches behind a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotStatus {
    Healthy,
    /// Kinds whose fetch failed this cycle
    PartiallyDegraded(BTreeSet<ResourceKind>),
    Unreachable,
}

/// Immutable mapping from identity to record for one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    cluster: String,
    records: BTreeMap<ResourceIdentity, ResourceRecord>,
    /// Kinds whose records were not refreshed this cycle
    stale_kinds: BTreeSet<ResourceKind>,
    taken_at: DateTime<Utc>,
}

impl ClusterSnapshot {
    /// Snapshot with no records and no stale kinds.
    pub fn empty(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            records: BTreeMap::new(),
            stale_kinds: BTreeSet::new(),
            taken_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    #[must_use]
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, identity: &ResourceIdentity) -> Option<&ResourceRecord> {
        self.records.get(identity)
    }

    #[must_use]
    pub fn contains(&self, identity: &ResourceIdentity) -> bool {
        self.records.contains_key(identity)
    }

    /// Records in identity order.
    pub fn records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records.values()
    }

    /// Records of one kind, in identity order.
    pub fn records_of(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceRecord> {
        self.records.values().filter(move |r| r.kind() == kind)
    }

    #[must_use]
    pub fn stale_kinds(&self) -> &BTreeSet<ResourceKind> {
        &self.stale_kinds
    }

    #[must_use]
    pub fn is_stale(&self, kind: ResourceKind) -> bool {
        self.stale_kinds.contains(&kind)
    }

    /// Derived from the stale kinds: none is healthy, all is unreachable.
    #[must_use]
    pub fn status(&self) -> SnapshotStatus {
        if self.stale_kinds.is_empty() {
            SnapshotStatus::Healthy
        } else if self.stale_kinds.len() == ResourceKind::ALL.len() {
            SnapshotStatus::Unreachable
        } else {
            SnapshotStatus::PartiallyDegraded(self.stale_kinds.clone())
        }
    }

    /// Copy of `self` with `previous`'s records for every stale kind folded in.
    ///
    /// Any records of a stale kind present in `self` are replaced, so the
    /// stale kinds' view is drawn entirely from `previous`.
    #[must_use]
    pub fn with_stale_carried_forward(&self, previous: &ClusterSnapshot) -> ClusterSnapshot {
        if self.stale_kinds.is_empty() {
            return self.clone();
        }
        let mut records: BTreeMap<ResourceIdentity, ResourceRecord> = self
            .records
            .iter()
            .filter(|(id, _)| !self.stale_kinds.contains(&id.kind))
            .map(|(id, r)| (id.clone(), r.clone()))
            .collect();
        for (id, record) in &previous.records {
            if self.stale_kinds.contains(&id.kind) {
                records.insert(id.clone(), record.clone());
            }
        }
        ClusterSnapshot {
            cluster: self.cluster.clone(),
            records,
            stale_kinds: self.stale_kinds.clone(),
            taken_at: self.taken_at,
        }
    }
}

/// Accumulates per-kind fetch results into a `ClusterSnapshot`.
#[derive(Debug)]
pub struct SnapshotBuilder {
    cluster: String,
    records: BTreeMap<ResourceIdentity, ResourceRecord>,
    stale_kinds: BTreeSet<ResourceKind>,
    duplicates: Vec<ResourceIdentity>,
    taken_at: DateTime<Utc>,
}

/// A built snapshot plus the identities dropped as duplicates.
#[derive(Debug)]
pub struct BuiltSnapshot {
    pub snapshot: ClusterSnapshot,
    /// Later occurrences of an identity already present; first-seen wins
    pub duplicates: Vec<ResourceIdentity>,
}

impl SnapshotBuilder {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            records: BTreeMap::new(),
            stale_kinds: BTreeSet::new(),
            duplicates: Vec::new(),
            taken_at: Utc::now(),
        }
    }

    /// Add a successful fetch result. Records are inserted in list order.
    pub fn add_kind(&mut self, records: impl IntoIterator<Item = ResourceRecord>) -> &mut Self {
        for record in records {
            self.add_record(record);
        }
        self
    }

    /// Add one record; a repeated identity keeps the first record.
    pub fn add_record(&mut self, record: ResourceRecord) -> &mut Self {
        if self.records.contains_key(&record.identity) {
            self.duplicates.push(record.identity);
        } else {
            self.records.insert(record.identity.clone(), record);
        }
        self
    }

    /// Mark a kind's fetch as failed for this cycle.
    pub fn mark_failed(&mut self, kind: ResourceKind) -> &mut Self {
        self.stale_kinds.insert(kind);
        self
    }

    #[must_use]
    pub fn build(self) -> BuiltSnapshot {
        BuiltSnapshot {
            snapshot: ClusterSnapshot {
                cluster: self.cluster,
                records: self.records,
                stale_kinds: self.stale_kinds,
                taken_at: self.taken_at,
            },
            duplicates: self.duplicates,
        }
    }
}
