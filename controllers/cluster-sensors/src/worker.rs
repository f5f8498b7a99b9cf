//! Per-cluster poll loop.
//!
//! A `ClusterWorker` owns one cluster's "previous" snapshot. Every cycle it
//! fetches all kinds concurrently, reconciles against the previous snapshot
//! and forwards the diff to the `EntitySink`:
//!
//! ```text
//! Idle -> Fetching -> Reconciling -> Sleeping -> Fetching ...
//!            |
//!            +-- every kind Transient, N times in a row --> Backoff -> Fetching
//! ```
//!
//! Cancellation is observed at the fetch and at the sleep; anything fetched
//! after cancellation is dropped without being reconciled.

use crate::backoff::ExponentialBackoff;
use crate::config::ClusterConfig;
use crate::error::ControllerError;
use crate::reconciler::reconcile;
use crate::sink::EntitySink;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use cluster_client::{FetchError, ResourceFetcher};
use futures::future::join_all;
use sensor_model::{
    BuiltSnapshot, ClusterSnapshot, DiffSummary, ResourceKind, ResourceRecord, SnapshotBuilder,
    SnapshotStatus,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Most recent faults kept in `WorkerStatus::faults`
const MAX_FAULTS: usize = 20;

/// Lifecycle state of a cluster worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    /// Not started yet, or waiting out a restart cooldown
    #[default]
    Idle,
    Fetching,
    Reconciling,
    Sleeping,
    Backoff,
    Stopped,
    /// Crashed again within the fault window; left stopped by the supervisor
    Faulted,
}

/// Observable health of one cluster worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub state: WorkerState,
    /// Consecutive cycles in which every kind failed transiently
    pub consecutive_failures: u32,
    /// Kinds whose last fetch failed; their entities show last-known state
    pub degraded_kinds: BTreeSet<ResourceKind>,
    pub cycles_completed: u64,
    /// Fetch outcome of the latest cycle
    pub cluster_status: Option<SnapshotStatus>,
    /// Capture time of the last snapshot accepted by the sink
    pub last_snapshot_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Health faults, oldest first
    pub faults: Vec<String>,
}

/// Timing and threshold settings for one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    /// Unreachable cycles in a row before entering Backoff
    pub failure_threshold: u32,
    pub backoff_max_multiplier: u32,
    /// Deadline for each single list call
    pub fetch_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            failure_threshold: 3,
            backoff_max_multiplier: 10,
            fetch_timeout: Duration::from_secs(20),
        }
    }
}

impl WorkerSettings {
    /// Apply a cluster's poll interval override.
    #[must_use]
    pub fn for_cluster(self, cluster: &ClusterConfig) -> Self {
        Self {
            poll_interval: cluster.poll_interval(self.poll_interval),
            ..self
        }
    }
}

/// State shared between a worker, the supervisor and diagnostics.
///
/// Outlives individual worker instances, so a restarted worker resumes from
/// the last published snapshot.
#[derive(Debug, Clone)]
pub struct WorkerHandles {
    status: Arc<watch::Sender<WorkerStatus>>,
    snapshot: Arc<ArcSwapOption<ClusterSnapshot>>,
}

impl Default for WorkerHandles {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerHandles {
    #[must_use]
    pub fn new() -> Self {
        let (status, _) = watch::channel(WorkerStatus::default());
        Self {
            status: Arc::new(status),
            snapshot: Arc::new(ArcSwapOption::empty()),
        }
    }

    #[must_use]
    pub fn status(&self) -> WorkerStatus {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.status.subscribe()
    }

    /// Last snapshot accepted by the sink.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<ClusterSnapshot>> {
        self.snapshot.load_full()
    }

    pub fn set_state(&self, state: WorkerState) {
        self.status.send_if_modified(|s| {
            let changed = s.state != state;
            s.state = state;
            changed
        });
    }

    pub fn record_fault(&self, fault: impl Into<String>) {
        let fault = fault.into();
        self.status.send_modify(|s| {
            s.last_error = Some(fault.clone());
            s.faults.push(fault);
            if s.faults.len() > MAX_FAULTS {
                let excess = s.faults.len() - MAX_FAULTS;
                s.faults.drain(..excess);
            }
        });
    }

    fn update(&self, f: impl FnOnce(&mut WorkerStatus)) {
        self.status.send_modify(f);
    }

    fn publish(&self, snapshot: Arc<ClusterSnapshot>) {
        self.snapshot.store(Some(snapshot));
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Snapshot reconciled and the diff accepted
    Reconciled { events: usize },
    /// Every kind failed transiently; nothing reconciled
    Unreachable,
    /// Sink rejected the diff; previous snapshot kept
    SinkRejected,
}

/// Result of one cycle and the wait before the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub next_delay: Duration,
}

type KindResult = (ResourceKind, Result<Vec<ResourceRecord>, FetchError>);

/// One cluster's poll loop.
pub struct ClusterWorker {
    cluster: String,
    fetcher: ResourceFetcher,
    sink: Arc<dyn EntitySink>,
    settings: WorkerSettings,
    backoff: ExponentialBackoff,
    handles: WorkerHandles,
    previous: Option<Arc<ClusterSnapshot>>,
    consecutive_failures: u32,
    /// Kinds currently failing permanently; a fault is reported on entry only
    permanent_failures: BTreeSet<ResourceKind>,
}

impl std::fmt::Debug for ClusterWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterWorker")
            .field("cluster", &self.cluster)
            .field("settings", &self.settings)
            .field("consecutive_failures", &self.consecutive_failures)
            .finish_non_exhaustive()
    }
}

impl ClusterWorker {
    pub fn new(
        fetcher: ResourceFetcher,
        sink: Arc<dyn EntitySink>,
        settings: WorkerSettings,
        handles: WorkerHandles,
    ) -> Self {
        let previous = handles.snapshot();
        Self {
            cluster: fetcher.cluster().to_string(),
            fetcher,
            sink,
            settings,
            backoff: ExponentialBackoff::new(settings.poll_interval, settings.backoff_max_multiplier),
            handles,
            previous,
            consecutive_failures: 0,
            permanent_failures: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn handles(&self) -> &WorkerHandles {
        &self.handles
    }

    /// Run until `cancel` fires. The first fetch starts immediately.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            cluster = %self.cluster,
            interval_secs = self.settings.poll_interval.as_secs(),
            "Starting cluster worker"
        );
        loop {
            self.handles.set_state(WorkerState::Fetching);
            let results = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                results = self.fetch_all() => results,
            };
            if cancel.is_cancelled() {
                debug!(cluster = %self.cluster, "Discarding fetch results after cancellation");
                break;
            }

            let report = self.complete_cycle(results);

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(report.next_delay) => {}
            }
        }
        self.handles.set_state(WorkerState::Stopped);
        info!(cluster = %self.cluster, "Cluster worker stopped");
    }

    /// One full cycle without cancellation: fetch, reconcile, emit.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.handles.set_state(WorkerState::Fetching);
        let results = self.fetch_all().await;
        self.complete_cycle(results)
    }

    async fn fetch_all(&self) -> Vec<KindResult> {
        let timeout = self.settings.fetch_timeout;
        let fetches = ResourceKind::ALL.iter().map(|&kind| {
            let fetcher = &self.fetcher;
            async move {
                let result = match tokio::time::timeout(timeout, fetcher.fetch(kind)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::transient(
                        kind,
                        format!("list timed out after {}s", timeout.as_secs()),
                    )),
                };
                (kind, result)
            }
        });
        join_all(fetches).await
    }

    fn complete_cycle(&mut self, results: Vec<KindResult>) -> CycleReport {
        let all_transient = results
            .iter()
            .all(|(_, result)| matches!(result, Err(err) if err.is_transient()));

        let outcome = if all_transient {
            self.record_unreachable(&results)
        } else {
            if self.consecutive_failures > 0 {
                info!(
                    cluster = %self.cluster,
                    failures = self.consecutive_failures,
                    "Cluster reachable again"
                );
            }
            self.consecutive_failures = 0;
            self.backoff.reset();
            self.reconcile_and_emit(results)
        };

        let (state, next_delay) = if self.consecutive_failures >= self.settings.failure_threshold {
            (WorkerState::Backoff, self.backoff.next_delay())
        } else {
            (WorkerState::Sleeping, self.settings.poll_interval)
        };
        if state == WorkerState::Backoff {
            warn!(
                cluster = %self.cluster,
                failures = self.consecutive_failures,
                delay_secs = next_delay.as_secs(),
                "Cluster unreachable, backing off"
            );
        }
        let failures = self.consecutive_failures;
        self.handles.update(|s| {
            s.state = state;
            s.consecutive_failures = failures;
        });

        CycleReport { outcome, next_delay }
    }

    fn record_unreachable(&mut self, results: &[KindResult]) -> CycleOutcome {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let message = results
            .iter()
            .find_map(|(_, r)| r.as_ref().err())
            .map_or_else(|| "cluster unreachable".to_string(), ToString::to_string);
        warn!(
            cluster = %self.cluster,
            failures = self.consecutive_failures,
            error = %message,
            "All resource kinds failed, keeping previous snapshot"
        );
        self.handles.update(|s| {
            s.cluster_status = Some(SnapshotStatus::Unreachable);
            s.last_error = Some(message);
        });
        CycleOutcome::Unreachable
    }

    fn reconcile_and_emit(&mut self, results: Vec<KindResult>) -> CycleOutcome {
        self.handles.set_state(WorkerState::Reconciling);

        let mut builder = SnapshotBuilder::new(self.cluster.as_str());
        let mut permanent_now = BTreeSet::new();
        for (kind, result) in results {
            match result {
                Ok(records) => {
                    builder.add_kind(records);
                }
                Err(err) => {
                    builder.mark_failed(kind);
                    if err.is_transient() {
                        warn!(cluster = %self.cluster, kind = %kind, error = %err, "Fetch failed, keeping last-known state");
                    } else {
                        permanent_now.insert(kind);
                        if !self.permanent_failures.contains(&kind) {
                            error!(cluster = %self.cluster, kind = %kind, error = %err, "Kind unavailable, marking degraded");
                            self.handles.record_fault(ControllerError::Fetch(err).to_string());
                        }
                    }
                }
            }
        }
        for kind in self.permanent_failures.difference(&permanent_now) {
            info!(cluster = %self.cluster, kind = %kind, "Kind recovered");
        }
        self.permanent_failures = permanent_now;

        let BuiltSnapshot { snapshot, duplicates } = builder.build();
        if !duplicates.is_empty() {
            let names: Vec<String> = duplicates.iter().map(ToString::to_string).collect();
            let fault = ControllerError::InvariantViolation(format!(
                "duplicate identities dropped: {}",
                names.join(", ")
            ));
            error!(cluster = %self.cluster, error = %fault, "Snapshot contained duplicates");
            self.handles.record_fault(fault.to_string());
        }

        self.handles.update(|s| s.cluster_status = Some(snapshot.status()));

        let outcome = reconcile(self.previous.as_deref(), &snapshot);
        let summary = DiffSummary::of(&outcome.events);
        if !summary.is_empty() {
            if let Err(err) = self.sink.apply_diff(&self.cluster, &outcome.events) {
                let err = ControllerError::Sink(err);
                warn!(cluster = %self.cluster, error = %err, "Sink rejected diff, will retry next cycle");
                self.handles.update(|s| s.last_error = Some(err.to_string()));
                return CycleOutcome::SinkRejected;
            }
        }
        debug!(
            cluster = %self.cluster,
            created = summary.created,
            updated = summary.updated,
            removed = summary.removed,
            records = outcome.snapshot.len(),
            "Cycle reconciled"
        );

        let degraded = outcome.snapshot.stale_kinds().clone();
        let taken_at = outcome.snapshot.taken_at();
        let effective = Arc::new(outcome.snapshot);
        self.previous = Some(Arc::clone(&effective));
        self.handles.publish(effective);
        self.handles.update(|s| {
            s.degraded_kinds = degraded;
            s.last_snapshot_at = Some(taken_at);
            s.cycles_completed += 1;
        });

        CycleOutcome::Reconciled {
            events: outcome.events.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{deployment_record, RecordingSink};
    use cluster_client::mock::helpers;
    use cluster_client::MockClusterClient;
    use sensor_model::{DiffEvent, ResourceStatus};

    fn worker(mock: &MockClusterClient, sink: &Arc<RecordingSink>) -> ClusterWorker {
        let fetcher = ResourceFetcher::new("prod", Arc::new(mock.clone()));
        let sink: Arc<dyn EntitySink> = Arc::clone(sink) as Arc<dyn EntitySink>;
        ClusterWorker::new(fetcher, sink, WorkerSettings::default(), WorkerHandles::new())
    }

    #[tokio::test]
    async fn test_nginx_scenario() {
        let mock = MockClusterClient::new();
        let sink = Arc::new(RecordingSink::default());
        let mut worker = worker(&mock, &sink);

        mock.add_deployment(helpers::deployment("default", "nginx", 3, 3));
        assert_eq!(worker.run_cycle().await.outcome, CycleOutcome::Reconciled { events: 1 });

        mock.add_deployment(helpers::deployment("default", "nginx", 3, 2));
        assert_eq!(worker.run_cycle().await.outcome, CycleOutcome::Reconciled { events: 1 });

        assert!(mock.remove(ResourceKind::Deployment, "default", "nginx"));
        assert_eq!(worker.run_cycle().await.outcome, CycleOutcome::Reconciled { events: 1 });

        let events = sink.events_for("prod");
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], DiffEvent::EntityCreated { record, .. }
            if matches!(&record.status, ResourceStatus::Deployment(s) if s.ready == 3)));
        assert!(matches!(&events[1], DiffEvent::EntityUpdated { new, .. }
            if matches!(&new.status, ResourceStatus::Deployment(s) if s.ready == 2)));
        assert!(matches!(&events[2], DiffEvent::EntityRemoved { identity }
            if identity.to_string() == "prod/Deployment/default/nginx"));
    }

    #[tokio::test]
    async fn test_quiet_cycle_skips_sink() {
        let mock = MockClusterClient::new();
        mock.add_node(helpers::node("worker-1", true));
        let sink = Arc::new(RecordingSink::default());
        let mut worker = worker(&mock, &sink);

        worker.run_cycle().await;
        let report = worker.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Reconciled { events: 0 });
        assert_eq!(sink.attempts(), 1);
        assert_eq!(worker.handles().status().cycles_completed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_escalation_and_reset() {
        let mock = MockClusterClient::new();
        mock.add_deployment(helpers::deployment("default", "nginx", 1, 1));
        mock.set_unreachable(true);
        let sink = Arc::new(RecordingSink::default());
        let mut worker = worker(&mock, &sink);

        for expected in 1..=2 {
            let report = worker.run_cycle().await;
            assert_eq!(report.outcome, CycleOutcome::Unreachable);
            assert_eq!(report.next_delay, Duration::from_secs(30));
            let status = worker.handles().status();
            assert_eq!(status.consecutive_failures, expected);
            assert_eq!(status.state, WorkerState::Sleeping);
        }

        let report = worker.run_cycle().await;
        assert_eq!(report.next_delay, Duration::from_secs(60));
        assert_eq!(worker.handles().status().state, WorkerState::Backoff);
        assert_eq!(worker.run_cycle().await.next_delay, Duration::from_secs(120));
        assert_eq!(sink.attempts(), 0);

        mock.set_unreachable(false);
        let report = worker.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Reconciled { events: 1 });
        assert_eq!(report.next_delay, Duration::from_secs(30));
        let status = worker.handles().status();
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.state, WorkerState::Sleeping);
    }

    #[tokio::test]
    async fn test_unreachable_keeps_previous_snapshot() {
        let mock = MockClusterClient::new();
        mock.add_deployment(helpers::deployment("default", "nginx", 1, 1));
        let sink = Arc::new(RecordingSink::default());
        let mut worker = worker(&mock, &sink);
        worker.run_cycle().await;

        mock.set_unreachable(true);
        for _ in 0..4 {
            worker.run_cycle().await;
        }
        let snapshot = worker.handles().snapshot().expect("published");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(sink.events_for("prod").len(), 1);
        let status = worker.handles().status();
        assert_eq!(status.cluster_status, Some(SnapshotStatus::Unreachable));
        assert_eq!(status.last_snapshot_at, Some(snapshot.taken_at()));
    }

    #[tokio::test]
    async fn test_transient_kind_failure_preserves_entities() {
        let mock = MockClusterClient::new();
        mock.add_node(helpers::node("worker-1", true));
        mock.add_node(helpers::node("worker-2", true));
        mock.add_deployment(helpers::deployment("default", "nginx", 3, 3));
        let sink = Arc::new(RecordingSink::default());
        let mut worker = worker(&mock, &sink);
        worker.run_cycle().await;

        mock.fail(ResourceKind::Node, FetchError::transient(ResourceKind::Node, "503"));
        mock.add_deployment(helpers::deployment("default", "nginx", 3, 2));
        let report = worker.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Reconciled { events: 1 });

        let (_, last) = sink.accepted().pop().expect("second diff");
        assert!(last.iter().all(|e| e.identity().kind == ResourceKind::Deployment));

        let snapshot = worker.handles().snapshot().expect("published");
        assert_eq!(snapshot.records_of(ResourceKind::Node).count(), 2);
        let status = worker.handles().status();
        assert_eq!(status.degraded_kinds, BTreeSet::from([ResourceKind::Node]));
        assert_eq!(
            status.cluster_status,
            Some(SnapshotStatus::PartiallyDegraded(BTreeSet::from([ResourceKind::Node])))
        );
        assert_eq!(status.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_permanent_failure_reported_once_and_never_backs_off() {
        let mock = MockClusterClient::new();
        let sink = Arc::new(RecordingSink::default());
        let mut worker = worker(&mock, &sink);
        mock.fail(ResourceKind::CronJob, FetchError::permanent(ResourceKind::CronJob, "forbidden"));

        for _ in 0..4 {
            let report = worker.run_cycle().await;
            assert_eq!(report.next_delay, Duration::from_secs(30));
        }
        assert_eq!(worker.handles().status().faults.len(), 1);

        mock.clear_failure(ResourceKind::CronJob);
        worker.run_cycle().await;
        mock.fail(ResourceKind::CronJob, FetchError::permanent(ResourceKind::CronJob, "forbidden"));
        worker.run_cycle().await;
        assert_eq!(worker.handles().status().faults.len(), 2);
    }

    #[tokio::test]
    async fn test_all_permanent_is_not_unreachable() {
        let mock = MockClusterClient::new();
        for kind in ResourceKind::ALL {
            mock.fail(kind, FetchError::permanent(kind, "forbidden"));
        }
        let sink = Arc::new(RecordingSink::default());
        let mut worker = worker(&mock, &sink);
        for _ in 0..3 {
            assert_eq!(worker.run_cycle().await.outcome, CycleOutcome::Reconciled { events: 0 });
        }
        assert_eq!(worker.handles().status().state, WorkerState::Sleeping);
    }

    #[tokio::test]
    async fn test_sink_failure_re_emits_next_cycle() {
        let mock = MockClusterClient::new();
        mock.add_deployment(helpers::deployment("default", "nginx", 3, 3));
        let sink = Arc::new(RecordingSink::default());
        let mut worker = worker(&mock, &sink);

        sink.set_failing(true);
        assert_eq!(worker.run_cycle().await.outcome, CycleOutcome::SinkRejected);
        assert!(worker.handles().snapshot().is_none());

        sink.set_failing(false);
        assert_eq!(worker.run_cycle().await.outcome, CycleOutcome::Reconciled { events: 1 });
        assert_eq!(sink.attempts(), 2);
        assert!(matches!(sink.events_for("prod").as_slice(), [DiffEvent::EntityCreated { .. }]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_kind_times_out_as_transient() {
        let mock = MockClusterClient::new();
        mock.add_deployment(helpers::deployment("default", "nginx", 1, 1));
        mock.set_latency(Duration::from_secs(60));
        let sink = Arc::new(RecordingSink::default());
        let mut worker = worker(&mock, &sink);

        let report = worker.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Unreachable);
        let status = worker.handles().status();
        assert!(status.last_error.is_some_and(|e| e.contains("timed out")));
    }

    #[tokio::test]
    async fn test_restarted_worker_resumes_from_published_snapshot() {
        let mock = MockClusterClient::new();
        mock.add_deployment(helpers::deployment("default", "nginx", 3, 3));
        let sink = Arc::new(RecordingSink::default());
        let handles = WorkerHandles::new();

        let fetcher = ResourceFetcher::new("prod", Arc::new(mock.clone()));
        let dyn_sink: Arc<dyn EntitySink> = Arc::clone(&sink) as Arc<dyn EntitySink>;
        let mut first = ClusterWorker::new(fetcher.clone(), Arc::clone(&dyn_sink), WorkerSettings::default(), handles.clone());
        first.run_cycle().await;
        drop(first);

        let mut second = ClusterWorker::new(fetcher, dyn_sink, WorkerSettings::default(), handles);
        assert_eq!(second.run_cycle().await.outcome, CycleOutcome::Reconciled { events: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_discards_in_flight_cycle() {
        let mock = MockClusterClient::new();
        mock.add_deployment(helpers::deployment("default", "nginx", 1, 1));
        mock.set_latency(Duration::from_secs(10));
        let sink = Arc::new(RecordingSink::default());
        let worker = worker(&mock, &sink);
        let handles = worker.handles().clone();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(worker.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handles.status().state, WorkerState::Fetching);

        cancel.cancel();
        task.await.expect("worker task");
        assert_eq!(sink.attempts(), 0);
        assert!(handles.snapshot().is_none());
        assert_eq!(handles.status().state, WorkerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_on_interval() {
        let mock = MockClusterClient::new();
        mock.add_node(helpers::node("worker-1", true));
        let sink = Arc::new(RecordingSink::default());
        let worker = worker(&mock, &sink);
        let handles = worker.handles().clone();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(worker.run(cancel.clone()));
        // Cycles at t=0, 30 and 60
        tokio::time::sleep(Duration::from_secs(75)).await;
        cancel.cancel();
        task.await.expect("worker task");

        assert_eq!(handles.status().cycles_completed, 3);
        assert_eq!(mock.list_calls(ResourceKind::Node), 3);
        assert_eq!(sink.attempts(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_identity_reported_as_fault() {
        let mock = MockClusterClient::new();
        let sink = Arc::new(RecordingSink::default());
        let mut worker = worker(&mock, &sink);

        let results: Vec<KindResult> = ResourceKind::ALL
            .iter()
            .map(|&kind| {
                let records = if kind == ResourceKind::Deployment {
                    vec![
                        deployment_record("prod", "default", "nginx", 3, 3),
                        deployment_record("prod", "default", "nginx", 3, 1),
                    ]
                } else {
                    Vec::new()
                };
                (kind, Ok(records))
            })
            .collect();
        let report = worker.complete_cycle(results);
        assert_eq!(report.outcome, CycleOutcome::Reconciled { events: 1 });

        let status = worker.handles().status();
        assert_eq!(status.faults.len(), 1);
        assert!(status.faults[0].contains("duplicate identities dropped: prod/Deployment/default/nginx"));

        // First-seen record wins
        match sink.events_for("prod").as_slice() {
            [DiffEvent::EntityCreated { record, .. }] => match &record.status {
                ResourceStatus::Deployment(d) => assert_eq!(d.ready, 3),
                other => panic!("unexpected status {other:?}"),
            },
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_kinds_are_fetched_concurrently() {
        let mock = MockClusterClient::new();
        mock.add_deployment(helpers::deployment("default", "nginx", 1, 1));
        mock.set_latency(Duration::from_secs(10));
        let sink = Arc::new(RecordingSink::default());
        let mut worker = worker(&mock, &sink);

        let started = tokio::time::Instant::now();
        let report = worker.run_cycle().await;
        // Six 10s lists back to back would take a minute
        assert!(started.elapsed() < Duration::from_secs(20));
        assert_eq!(report.outcome, CycleOutcome::Reconciled { events: 1 });
        for kind in ResourceKind::ALL {
            assert_eq!(mock.list_calls(kind), 1);
        }
    }
}
