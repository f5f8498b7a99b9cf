//! Entity lifecycle events

use crate::identity::ResourceIdentity;
use crate::record::ResourceRecord;
use serde::{Deserialize, Serialize};

/// One entity lifecycle event produced by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiffEvent {
    EntityCreated {
        identity: ResourceIdentity,
        record: ResourceRecord,
    },
    EntityUpdated {
        identity: ResourceIdentity,
        old: ResourceRecord,
        new: ResourceRecord,
    },
    EntityRemoved {
        identity: ResourceIdentity,
    },
}

impl DiffEvent {
    #[must_use]
    pub fn identity(&self) -> &ResourceIdentity {
        match self {
            DiffEvent::EntityCreated { identity, .. }
            | DiffEvent::EntityUpdated { identity, .. }
            | DiffEvent::EntityRemoved { identity } => identity,
        }
    }

    /// Record the entity should show after this event, if it still exists.
    #[must_use]
    pub fn current_record(&self) -> Option<&ResourceRecord> {
        match self {
            DiffEvent::EntityCreated { record, .. } => Some(record),
            DiffEvent::EntityUpdated { new, .. } => Some(new),
            DiffEvent::EntityRemoved { .. } => None,
        }
    }

    /// Short event name for logs.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            DiffEvent::EntityCreated { .. } => "created",
            DiffEvent::EntityUpdated { .. } => "updated",
            DiffEvent::EntityRemoved { .. } => "removed",
        }
    }
}

/// Per-action counts of a diff, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

impl DiffSummary {
    #[must_use]
    pub fn of(events: &[DiffEvent]) -> Self {
        events.iter().fold(Self::default(), |mut acc, e| {
            match e {
                DiffEvent::EntityCreated { .. } => acc.created += 1,
                DiffEvent::EntityUpdated { .. } => acc.updated += 1,
                DiffEvent::EntityRemoved { .. } => acc.removed += 1,
            }
            acc
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.removed == 0
    }
}
