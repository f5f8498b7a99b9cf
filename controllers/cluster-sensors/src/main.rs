//! Cluster Sensors Controller
//!
//! Polls a set of Kubernetes clusters and keeps a dashboard's entity set in
//! line with them:
//! - One worker per cluster lists Deployments, StatefulSets, DaemonSets,
//!   Nodes, Namespaces and CronJobs on its own interval
//! - Each cycle is reconciled against the last good snapshot and only the
//!   difference is handed to the entity sink
//! - Unreachable clusters back off exponentially without affecting the rest
//!
//! The cluster list is read from `CLUSTERS_CONFIG` and reloaded on SIGHUP.

mod backoff;
mod config;
mod connector;
mod entity;
mod error;
mod reconciler;
mod sink;
mod supervisor;
mod worker;

#[cfg(test)]
mod test_utils;

use crate::config::{load_clusters, ControllerConfig, SinkKind};
use crate::connector::KubeconfigConnector;
use crate::error::ControllerError;
use crate::sink::{EntitySink, JsonLinesSink, TracingSink};
use crate::supervisor::ClusterSupervisor;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn log_subscriber<W>(filter: EnvFilter, writer: W) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish()
}

fn log_worker_status(supervisor: &ClusterSupervisor) {
    for name in supervisor.cluster_names() {
        let Some(status) = supervisor.status(&name) else { continue };
        let records = supervisor.snapshot(&name).map_or(0, |s| s.len());
        info!(
            cluster = %name,
            state = ?status.state,
            cycles = status.cycles_completed,
            consecutive_failures = status.consecutive_failures,
            records,
            "Worker status"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    // Configure rustls crypto provider before kube creates any client
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider already installed");
    }

    // stdout carries the JSON-lines entity stream; logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    log_subscriber(filter, std::io::stderr).init();

    info!("Starting Cluster Sensors Controller");

    let config = ControllerConfig::from_env()?;
    let clusters = load_clusters(&config.clusters_config)?;

    info!("Configuration:");
    info!("  Clusters config: {}", config.clusters_config.display());
    info!("  Clusters: {}", clusters.len());
    info!("  Default poll interval: {}s", config.default_poll_interval.as_secs());
    info!("  Failure threshold: {}", config.failure_threshold);
    info!("  Sink: {:?}", config.sink);

    let sink: Arc<dyn EntitySink> = match config.sink {
        SinkKind::Log => Arc::new(TracingSink),
        SinkKind::Json => Arc::new(JsonLinesSink::stdout()),
    };
    let connector = Arc::new(KubeconfigConnector::new(Some(config.fetch_timeout)));
    let supervisor = ClusterSupervisor::new(
        connector,
        sink,
        config.worker_defaults(),
        config.restart_policy(),
    );

    let change = supervisor.reconcile_cluster_set(&clusters).await;
    info!(started = change.started.len(), "Cluster workers running");

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutdown requested");
                break;
            }
            _ = hangup.recv() => {
                info!("SIGHUP received, reloading {}", config.clusters_config.display());
                match load_clusters(&config.clusters_config) {
                    Ok(clusters) => {
                        let change = supervisor.reconcile_cluster_set(&clusters).await;
                        if change.is_empty() {
                            info!("Cluster set unchanged");
                        } else {
                            info!(
                                started = ?change.started,
                                stopped = ?change.stopped,
                                restarted = ?change.restarted,
                                "Cluster set updated"
                            );
                        }
                    }
                    Err(e) => error!("Keeping current cluster set, reload failed: {}", e),
                }
                log_worker_status(&supervisor);
            }
        }
    }

    supervisor.shutdown().await;
    info!("Cluster Sensors Controller stopped");
    Ok(())
}
