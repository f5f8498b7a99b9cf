//! Controller configuration.
//!
//! Process-wide settings come from environment variables. The set of
//! monitored clusters comes from a YAML file named by `CLUSTERS_CONFIG`,
//! which is re-read on SIGHUP:
//!
//! ```yaml
//! clusters:
//!   - name: prod
//!     kubeconfig: /etc/cluster-sensors/prod.kubeconfig
//!     poll_interval_seconds: 15
//!   - name: lab
//!     kubeconfig: /etc/cluster-sensors/lab.kubeconfig
//!     context: lab-admin
//! ```

use crate::error::ControllerError;
use crate::supervisor::RestartPolicy;
use crate::worker::WorkerSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// One monitored cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Unique, user-chosen cluster name; part of every entity id
    pub name: String,
    /// Path to the kubeconfig file for this cluster
    pub kubeconfig: PathBuf,
    /// Kubeconfig context; defaults to the file's current-context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Overrides `DEFAULT_POLL_INTERVAL_SECONDS` for this cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_seconds: Option<u64>,
}

impl ClusterConfig {
    pub fn new(name: impl Into<String>, kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kubeconfig: kubeconfig.into(),
            context: None,
            poll_interval_seconds: None,
        }
    }

    #[must_use]
    pub fn poll_interval(&self, default: Duration) -> Duration {
        self.poll_interval_seconds.map_or(default, Duration::from_secs)
    }
}

#[derive(Debug, Deserialize)]
struct ClustersFile {
    #[serde(default)]
    clusters: Vec<ClusterConfig>,
}

/// Parse and validate a YAML cluster list.
///
/// # Errors
/// Returns `ControllerError::Yaml` for malformed YAML and
/// `ControllerError::InvalidConfig` when validation fails.
pub fn parse_clusters(yaml: &str) -> Result<Vec<ClusterConfig>, ControllerError> {
    let file: ClustersFile = serde_yaml::from_str(yaml)?;
    validate_clusters(&file.clusters)?;
    Ok(file.clusters)
}

/// Read, parse and validate the cluster list at `path`.
///
/// # Errors
/// Returns `ControllerError::Io` if the file cannot be read, otherwise see
/// [`parse_clusters`].
pub fn load_clusters(path: &Path) -> Result<Vec<ClusterConfig>, ControllerError> {
    let yaml = std::fs::read_to_string(path)?;
    parse_clusters(&yaml)
}

/// Names must be non-empty and unique; intervals must be non-zero.
///
/// # Errors
/// Returns `ControllerError::InvalidConfig` describing the first problem found.
pub fn validate_clusters(clusters: &[ClusterConfig]) -> Result<(), ControllerError> {
    let mut seen = HashSet::new();
    for cluster in clusters {
        let name = cluster.name.trim();
        if name.is_empty() {
            return Err(ControllerError::InvalidConfig(
                "cluster name is required".to_string(),
            ));
        }
        if !seen.insert(name) {
            return Err(ControllerError::InvalidConfig(format!(
                "cluster name '{name}' already exists"
            )));
        }
        if cluster.poll_interval_seconds == Some(0) {
            return Err(ControllerError::InvalidConfig(format!(
                "cluster '{name}': poll_interval_seconds must be greater than 0"
            )));
        }
    }
    Ok(())
}

/// Which `EntitySink` the binary installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    /// Log every event through `tracing`
    Log,
    /// Print rendered entities as JSON lines on stdout
    #[default]
    Json,
}

impl FromStr for SinkKind {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "json" => Ok(Self::Json),
            other => Err(ControllerError::InvalidConfig(format!(
                "SINK must be 'log' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub clusters_config: PathBuf,
    pub default_poll_interval: Duration,
    pub failure_threshold: u32,
    pub backoff_max_multiplier: u32,
    pub fetch_timeout: Duration,
    pub restart_cooldown: Duration,
    pub fault_window: Duration,
    pub sink: SinkKind,
}

impl ControllerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns `ControllerError::InvalidConfig` if `CLUSTERS_CONFIG` is
    /// missing or any variable fails to parse.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let clusters_config = lookup("CLUSTERS_CONFIG").map(PathBuf::from).ok_or_else(|| {
            ControllerError::InvalidConfig(
                "CLUSTERS_CONFIG environment variable is required".to_string(),
            )
        })?;

        let default_poll_interval: u64 = parse_var(&lookup, "DEFAULT_POLL_INTERVAL_SECONDS", 30)?;
        let failure_threshold: u32 = parse_var(&lookup, "FAILURE_THRESHOLD", 3)?;
        let backoff_max_multiplier: u32 = parse_var(&lookup, "BACKOFF_MAX_MULTIPLIER", 10)?;
        let fetch_timeout: u64 = parse_var(&lookup, "FETCH_TIMEOUT_SECONDS", 20)?;
        let restart_cooldown: u64 = parse_var(&lookup, "RESTART_COOLDOWN_SECONDS", 30)?;
        let fault_window: u64 = parse_var(&lookup, "FAULT_WINDOW_SECONDS", 300)?;
        let sink = lookup("SINK").map_or(Ok(SinkKind::default()), |s| s.parse())?;

        if default_poll_interval == 0 {
            return Err(ControllerError::InvalidConfig(
                "DEFAULT_POLL_INTERVAL_SECONDS must be greater than 0".to_string(),
            ));
        }
        if failure_threshold == 0 {
            return Err(ControllerError::InvalidConfig(
                "FAILURE_THRESHOLD must be at least 1".to_string(),
            ));
        }
        if fetch_timeout == 0 {
            return Err(ControllerError::InvalidConfig(
                "FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            clusters_config,
            default_poll_interval: Duration::from_secs(default_poll_interval),
            failure_threshold,
            backoff_max_multiplier,
            fetch_timeout: Duration::from_secs(fetch_timeout),
            restart_cooldown: Duration::from_secs(restart_cooldown),
            fault_window: Duration::from_secs(fault_window),
            sink,
        })
    }

    /// Worker settings before any per-cluster interval override.
    #[must_use]
    pub fn worker_defaults(&self) -> WorkerSettings {
        WorkerSettings {
            poll_interval: self.default_poll_interval,
            failure_threshold: self.failure_threshold,
            backoff_max_multiplier: self.backoff_max_multiplier,
            fetch_timeout: self.fetch_timeout,
        }
    }

    #[must_use]
    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy {
            cooldown: self.restart_cooldown,
            fault_window: self.fault_window,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ControllerError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            ControllerError::InvalidConfig(format!("{key} has an invalid value: '{raw}'"))
        }),
    }
}
