//! Cluster supervisor.
//!
//! Owns the registry of running workers, keyed by cluster name. Each worker
//! runs inside its own guard task, which catches crashes and applies the
//! restart policy: restart once after a cooldown, and leave the worker
//! `Faulted` if it crashes again within the fault window.

use crate::config::ClusterConfig;
use crate::error::ControllerError;
use crate::sink::EntitySink;
use crate::worker::{ClusterWorker, WorkerHandles, WorkerSettings, WorkerState, WorkerStatus};
use cluster_client::{ClusterApi, ResourceFetcher};
use sensor_model::ClusterSnapshot;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Builds an authenticated cluster handle from configuration.
#[async_trait::async_trait]
pub trait ClusterConnector: Send + Sync {
    /// # Errors
    /// Returns `ControllerError` if no handle can be built for `cluster`.
    async fn connect(&self, cluster: &ClusterConfig) -> Result<Arc<dyn ClusterApi>, ControllerError>;
}

/// Crash handling for worker guard tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Wait before restarting a crashed worker
    pub cooldown: Duration,
    /// A second crash within this long of the first leaves the worker faulted
    pub fault_window: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(30),
            fault_window: Duration::from_secs(300),
        }
    }
}

/// What a `reconcile_cluster_set` call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSetChange {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    pub restarted: Vec<String>,
}

impl ClusterSetChange {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty() && self.restarted.is_empty()
    }
}

struct WorkerEntry {
    config: ClusterConfig,
    cancel: CancellationToken,
    handles: WorkerHandles,
    guard: JoinHandle<()>,
}

/// Starts, stops and restarts one worker per configured cluster.
pub struct ClusterSupervisor {
    connector: Arc<dyn ClusterConnector>,
    sink: Arc<dyn EntitySink>,
    defaults: WorkerSettings,
    policy: RestartPolicy,
    workers: Mutex<HashMap<String, WorkerEntry>>,
}

impl std::fmt::Debug for ClusterSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterSupervisor")
            .field("clusters", &self.cluster_names())
            .field("defaults", &self.defaults)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ClusterSupervisor {
    pub fn new(
        connector: Arc<dyn ClusterConnector>,
        sink: Arc<dyn EntitySink>,
        defaults: WorkerSettings,
        policy: RestartPolicy,
    ) -> Self {
        Self {
            connector,
            sink,
            defaults,
            policy,
            workers: Mutex::new(HashMap::new()),
        }
    }

    fn workers(&self) -> MutexGuard<'_, HashMap<String, WorkerEntry>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bring the running workers in line with `desired`.
    ///
    /// New clusters get a worker, removed clusters are cancelled, and
    /// clusters whose configuration changed are stopped and started again
    /// from their last published snapshot. Calls must not overlap.
    pub async fn reconcile_cluster_set(&self, desired: &[ClusterConfig]) -> ClusterSetChange {
        let mut change = ClusterSetChange::default();
        let mut stopping = Vec::new();
        let mut restarting = Vec::new();
        {
            let mut workers = self.workers();
            let removed: Vec<String> = workers
                .keys()
                .filter(|name| !desired.iter().any(|c| &c.name == *name))
                .cloned()
                .collect();
            for name in removed {
                if let Some(entry) = workers.remove(&name) {
                    info!(cluster = %name, "Cluster removed, stopping worker");
                    entry.cancel.cancel();
                    stopping.push(entry);
                    change.stopped.push(name);
                }
            }
            for config in desired {
                let unchanged = workers.get(&config.name).map(|e| e.config == *config);
                match unchanged {
                    None => {
                        info!(cluster = %config.name, "Cluster added, starting worker");
                        let entry = self.spawn_guard(config.clone(), WorkerHandles::new());
                        workers.insert(config.name.clone(), entry);
                        change.started.push(config.name.clone());
                    }
                    Some(false) => {
                        info!(cluster = %config.name, "Cluster configuration changed, restarting worker");
                        if let Some(entry) = workers.remove(&config.name) {
                            entry.cancel.cancel();
                            restarting.push((config.clone(), entry));
                        }
                        change.restarted.push(config.name.clone());
                    }
                    Some(true) => {}
                }
            }
        }

        for entry in stopping {
            await_guard(&entry.config.name, entry.guard).await;
        }
        for (config, old) in restarting {
            await_guard(&config.name, old.guard).await;
            old.handles.set_state(WorkerState::Idle);
            let entry = self.spawn_guard(config.clone(), old.handles);
            self.workers().insert(config.name, entry);
        }

        change.started.sort();
        change.stopped.sort();
        change.restarted.sort();
        change
    }

    fn spawn_guard(&self, config: ClusterConfig, handles: WorkerHandles) -> WorkerEntry {
        let cancel = CancellationToken::new();
        let guard = tokio::spawn(guard_worker(GuardContext {
            config: config.clone(),
            connector: Arc::clone(&self.connector),
            sink: Arc::clone(&self.sink),
            settings: self.defaults.for_cluster(&config),
            policy: self.policy,
            handles: handles.clone(),
            cancel: cancel.clone(),
        }));
        WorkerEntry {
            config,
            cancel,
            handles,
            guard,
        }
    }

    /// Cancel every worker and wait for all of them to stop.
    pub async fn shutdown(&self) {
        let entries: Vec<WorkerEntry> = self.workers().drain().map(|(_, e)| e).collect();
        info!(workers = entries.len(), "Shutting down cluster workers");
        for entry in &entries {
            entry.cancel.cancel();
        }
        for entry in entries {
            await_guard(&entry.config.name, entry.guard).await;
        }
    }

    #[must_use]
    pub fn status(&self, cluster: &str) -> Option<WorkerStatus> {
        self.workers().get(cluster).map(|e| e.handles.status())
    }

    #[must_use]
    pub fn subscribe(&self, cluster: &str) -> Option<watch::Receiver<WorkerStatus>> {
        self.workers().get(cluster).map(|e| e.handles.subscribe())
    }

    #[must_use]
    pub fn snapshot(&self, cluster: &str) -> Option<Arc<ClusterSnapshot>> {
        self.workers().get(cluster).and_then(|e| e.handles.snapshot())
    }

    /// Registered cluster names, sorted.
    #[must_use]
    pub fn cluster_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workers().keys().cloned().collect();
        names.sort();
        names
    }
}

async fn await_guard(cluster: &str, guard: JoinHandle<()>) {
    if let Err(err) = guard.await {
        warn!(cluster = %cluster, error = %err, "Worker guard did not exit cleanly");
    }
}

struct GuardContext {
    config: ClusterConfig,
    connector: Arc<dyn ClusterConnector>,
    sink: Arc<dyn EntitySink>,
    settings: WorkerSettings,
    policy: RestartPolicy,
    handles: WorkerHandles,
    cancel: CancellationToken,
}

/// Runs the worker in a child task and applies the restart policy.
async fn guard_worker(ctx: GuardContext) {
    let cluster = ctx.config.name.clone();
    let mut last_crash: Option<Instant> = None;
    loop {
        let attempt = tokio::spawn(run_worker(
            ctx.config.clone(),
            Arc::clone(&ctx.connector),
            Arc::clone(&ctx.sink),
            ctx.settings,
            ctx.handles.clone(),
            ctx.cancel.clone(),
        ));
        let reason = match attempt.await {
            Ok(Ok(())) => {
                ctx.handles.set_state(WorkerState::Stopped);
                return;
            }
            Ok(Err(err)) => err.to_string(),
            Err(join_err) if join_err.is_panic() => {
                format!("worker panicked: {}", panic_message(join_err.into_panic().as_ref()))
            }
            Err(join_err) => join_err.to_string(),
        };
        if ctx.cancel.is_cancelled() {
            ctx.handles.set_state(WorkerState::Stopped);
            return;
        }

        let crash = ControllerError::WorkerCrash {
            cluster: cluster.clone(),
            reason,
        };
        error!(cluster = %cluster, error = %crash, "Cluster worker crashed");
        ctx.handles.record_fault(crash.to_string());

        let now = Instant::now();
        if last_crash.is_some_and(|at| now.duration_since(at) <= ctx.policy.fault_window) {
            error!(
                cluster = %cluster,
                window_secs = ctx.policy.fault_window.as_secs(),
                "Worker crashed again within fault window, leaving it stopped"
            );
            ctx.handles.set_state(WorkerState::Faulted);
            return;
        }
        last_crash = Some(now);
        // Restart pending; Stopped is reserved for workers that are done
        ctx.handles.set_state(WorkerState::Idle);

        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return,
            () = tokio::time::sleep(ctx.policy.cooldown) => {}
        }
        info!(cluster = %cluster, "Restarting cluster worker after cooldown");
    }
}

async fn run_worker(
    config: ClusterConfig,
    connector: Arc<dyn ClusterConnector>,
    sink: Arc<dyn EntitySink>,
    settings: WorkerSettings,
    handles: WorkerHandles,
    cancel: CancellationToken,
) -> Result<(), ControllerError> {
    let api = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        api = connector.connect(&config) => api?,
    };
    let fetcher = ResourceFetcher::new(config.name.as_str(), api);
    ClusterWorker::new(fetcher, sink, settings, handles)
        .run(cancel)
        .await;
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
