//! Snapshot reconciliation.
//!
//! Pure diff of the previous snapshot against the current one. Kinds that
//! failed to fetch in `current` are drawn entirely from `previous` before
//! diffing, so a failed read never removes or recreates entities.

use sensor_model::{ClusterSnapshot, DiffEvent};

/// Events for one reconcile pass plus the snapshot to keep as "previous".
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Lifecycle events in identity order, at most one per identity
    pub events: Vec<DiffEvent>,
    /// `current` with the stale kinds' records carried forward from `previous`
    pub snapshot: ClusterSnapshot,
}

/// Diff `previous` (or nothing, on the first cycle) against `current`.
///
/// - identities only in the effective current view: `EntityCreated`
/// - identities only in `previous`: `EntityRemoved`
/// - identities in both whose state differs, ignoring `resource_version`: `EntityUpdated`
///
/// Deterministic and side-effect free; `reconcile(Some(&s), &s)` is always empty.
#[must_use]
pub fn reconcile(previous: Option<&ClusterSnapshot>, current: &ClusterSnapshot) -> ReconcileOutcome {
    let effective = match previous {
        Some(prev) => current.with_stale_carried_forward(prev),
        None => current.clone(),
    };

    let mut events = Vec::new();
    for record in effective.records() {
        match previous.and_then(|prev| prev.get(&record.identity)) {
            None => events.push(DiffEvent::EntityCreated {
                identity: record.identity.clone(),
                record: record.clone(),
            }),
            Some(old) if !old.same_state(record) => events.push(DiffEvent::EntityUpdated {
                identity: record.identity.clone(),
                old: old.clone(),
                new: record.clone(),
            }),
            Some(_) => {}
        }
    }

    if let Some(prev) = previous {
        for record in prev.records() {
            if !effective.contains(&record.identity) {
                events.push(DiffEvent::EntityRemoved {
                    identity: record.identity.clone(),
                });
            }
        }
        events.sort_by(|a, b| a.identity().cmp(b.identity()));
    }

    ReconcileOutcome {
        events,
        snapshot: effective,
    }
}
