//! Entity sinks.
//!
//! An `EntitySink` receives each cluster's diff after reconciliation. The
//! worker calls it once per cycle with a non-empty event list, sequentially
//! per cluster. Delivery is at-least-once: when `apply_diff` fails the worker
//! keeps its previous snapshot and the same diff is recomputed next cycle.

use crate::entity::{entity_id, EntityView};
use sensor_model::{DiffEvent, DiffSummary};
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

/// Errors returned by an `EntitySink`.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write entity update: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize entity update: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The host refused the diff
    #[error("entity update rejected: {0}")]
    Rejected(String),
}

/// Host-side receiver of entity lifecycle events.
pub trait EntitySink: Send + Sync {
    /// Apply one cluster's diff.
    ///
    /// # Errors
    /// Returns `SinkError` when the diff could not be applied. The caller
    /// retries by recomputing the diff on its next cycle.
    fn apply_diff(&self, cluster: &str, events: &[DiffEvent]) -> Result<(), SinkError>;
}

/// Logs every event through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EntitySink for TracingSink {
    fn apply_diff(&self, cluster: &str, events: &[DiffEvent]) -> Result<(), SinkError> {
        let summary = DiffSummary::of(events);
        info!(
            cluster = %cluster,
            created = summary.created,
            updated = summary.updated,
            removed = summary.removed,
            "Applying entity diff"
        );
        for event in events {
            match event.current_record() {
                Some(record) => {
                    let view = EntityView::render(record);
                    info!(
                        cluster = %cluster,
                        action = event.action(),
                        entity_id = %view.entity_id,
                        state = %view.state,
                        "{}",
                        view.name
                    );
                }
                None => info!(
                    cluster = %cluster,
                    action = event.action(),
                    entity_id = %entity_id(event.identity()),
                    "Entity removed"
                ),
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct EntityLine<'a> {
    cluster: &'a str,
    action: &'static str,
    entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity: Option<EntityView>,
}

/// Writes one JSON object per event, newline-delimited.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl JsonLinesSink<std::io::Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<W: Write + Send> EntitySink for JsonLinesSink<W> {
    fn apply_diff(&self, cluster: &str, events: &[DiffEvent]) -> Result<(), SinkError> {
        // Render everything first so a serialization failure writes nothing
        let mut buf = Vec::new();
        for event in events {
            let line = EntityLine {
                cluster,
                action: event.action(),
                entity_id: entity_id(event.identity()),
                entity: event.current_record().map(EntityView::render),
            };
            serde_json::to_writer(&mut buf, &line)?;
            buf.push(b'\n');
        }
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        out.write_all(&buf)?;
        out.flush()?;
        debug!(cluster = %cluster, events = events.len(), "Wrote entity diff");
        Ok(())
    }
}
