//! Cluster Sensor Model
//!
//! Data model shared by the cluster client and the sensors controller:
//! - `ResourceKind`: the fixed set of monitored Kubernetes kinds
//! - `ResourceIdentity`: stable `(cluster, kind, namespace, name)` key
//! - `ResourceRecord` / `ResourceStatus`: one observed object with typed, kind-specific status
//! - `ClusterSnapshot`: immutable per-cluster aggregate of one poll cycle
//! - `DiffEvent`: entity lifecycle events emitted by reconciliation

pub mod kind;
pub mod identity;
pub mod status;
pub mod record;
pub mod snapshot;
pub mod diff;

pub use kind::*;
pub use identity::*;
pub use status::*;
pub use record::*;
pub use snapshot::*;
pub use diff::*;
