use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::cli::Cli;

/// Immutable runtime configuration consumed by the core loops.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub controller_name: String,
    pub source_namespace: String,
    pub destination_namespace: String,
    pub container: String,
    pub poll_interval: Duration,
    pub validate_interval: Duration,
    pub drain_grace: Duration,
}

impl From<&Cli> for MirrorConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            controller_name: cli.controller.clone(),
            source_namespace: cli.source_namespace.clone(),
            destination_namespace: cli.destination_namespace.clone(),
            container: cli
                .container
                .clone()
                .unwrap_or_else(|| cli.controller.clone()),
            poll_interval: Duration::from_secs(cli.poll_interval),
            validate_interval: Duration::from_secs(cli.validate_interval),
            drain_grace: Duration::from_secs(cli.drain_grace),
        }
    }
}

/// The unsealing controller deployment a discovery cycle resolves against.
/// The desired replica count is read from the deployment spec each cycle,
/// never cached here.
#[derive(Debug, Clone)]
pub struct ControllerTarget {
    pub name: String,
    pub namespace: String,
}

/// A secret as seen through the cluster accessor: its data blobs and labels.
/// The source of truth lives in the source namespace; mirrored instances
/// carry the same data and labels in their destination namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretView {
    pub name: String,
    pub data: BTreeMap<String, ByteString>,
    pub labels: BTreeMap<String, String>,
}

/// Classification of a single mirror attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    Created,
    Updated,
    Unchanged,
}

impl fmt::Display for MirrorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorOutcome::Created => write!(f, "created"),
            MirrorOutcome::Updated => write!(f, "updated"),
            MirrorOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}
