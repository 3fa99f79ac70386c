use crate::kubernetes::Cluster;
use crate::types::{MirrorConfig, MirrorOutcome, SecretView};
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Label on a source secret that routes its mirror to a specific namespace.
pub const TARGET_NAMESPACE_LABEL: &str = "TargetNamespace";

/// Resolve the destination namespace for a source secret's labels.
/// Re-evaluated on every mirror and every validation pass, since labels may
/// change between runs.
pub fn resolve_destination<'a>(
    labels: &'a BTreeMap<String, String>,
    default_namespace: &'a str,
) -> &'a str {
    labels
        .get(TARGET_NAMESPACE_LABEL)
        .map(String::as_str)
        .unwrap_or(default_namespace)
}

/// Copy one source secret's data and labels into its destination namespace.
///
/// The apply is create-or-update under the fixed field manager; concurrent
/// writers resolve last-writer-wins on the API server. A missing source
/// secret and an apply failure both abort this single attempt; the only
/// retry is a future unseal event.
pub async fn mirror_secret<C: Cluster>(
    cluster: &C,
    config: &MirrorConfig,
    name: &str,
) -> Result<MirrorOutcome> {
    let source = cluster
        .get_secret(&config.source_namespace, name)
        .await?
        .ok_or_else(|| {
            anyhow!(
                "source secret {} not found in {}",
                name,
                config.source_namespace
            )
        })?;

    let destination = resolve_destination(&source.labels, &config.destination_namespace).to_string();

    // Absence of a prior copy is not an error, only evidence of a first mirror.
    let previous = cluster.get_secret(&destination, name).await?;

    let applied = cluster
        .apply_secret(
            &destination,
            SecretView {
                name: name.to_string(),
                data: source.data,
                labels: source.labels,
            },
        )
        .await?;

    let outcome = match &previous {
        None => MirrorOutcome::Created,
        Some(prev) if prev.data == applied.data && prev.labels == applied.labels => {
            MirrorOutcome::Unchanged
        }
        Some(_) => MirrorOutcome::Updated,
    };
    match outcome {
        MirrorOutcome::Unchanged => {
            debug!("mirrored secret {} in {}: {}", applied.name, destination, outcome);
        }
        _ => {
            info!("mirrored secret {} in {}: {}", applied.name, destination, outcome);
        }
    }

    Ok(outcome)
}
