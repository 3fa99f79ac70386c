use crate::kubernetes::Cluster;
use crate::mirror::resolve_destination;
use crate::types::MirrorConfig;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Field selector for the source secrets the validator audits.
pub const SECRET_TYPE_SELECTOR: &str = "type=Opaque";

/// A mismatch between a source secret and its mirrored copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    /// The mirrored copy does not exist in its destination namespace.
    Missing { name: String, namespace: String },
    /// The mirrored copy's data or labels differ from the source.
    Diverged { name: String, namespace: String },
}

/// One audit pass over every source secret. Reports are returned as well as
/// logged; validation never creates or corrects anything.
pub async fn validate_pass<C: Cluster>(
    cluster: &C,
    config: &MirrorConfig,
) -> Result<Vec<Drift>> {
    let sources = cluster
        .list_secrets(&config.source_namespace, SECRET_TYPE_SELECTOR)
        .await?;

    let mut drifts = Vec::new();
    for source in sources {
        let destination = resolve_destination(&source.labels, &config.destination_namespace);
        match cluster.get_secret(destination, &source.name).await {
            Ok(Some(copy)) => {
                if copy.data != source.data || copy.labels != source.labels {
                    warn!(
                        "mirrored secret {} in {} has drifted from its source",
                        source.name, destination
                    );
                    drifts.push(Drift::Diverged {
                        name: source.name,
                        namespace: destination.to_string(),
                    });
                }
            }
            Ok(None) => {
                warn!(
                    "mirrored secret {} is missing in {}",
                    source.name, destination
                );
                drifts.push(Drift::Missing {
                    name: source.name,
                    namespace: destination.to_string(),
                });
            }
            Err(e) => {
                warn!(
                    "failed to fetch mirrored secret {} in {}: {:#}",
                    source.name, destination, e
                );
            }
        }
    }
    Ok(drifts)
}

/// Periodic audit loop; runs until the control loop aborts it on drain.
/// A failed source list only skips the current pass.
pub async fn run<C: Cluster>(cluster: C, config: Arc<MirrorConfig>) {
    info!(
        "started drift validator with period {:?}",
        config.validate_interval
    );
    loop {
        match validate_pass(&cluster, &config).await {
            Ok(drifts) if drifts.is_empty() => debug!("validation pass found no drift"),
            Ok(drifts) => debug!("validation pass found {} drifted secret(s)", drifts.len()),
            Err(e) => warn!("validation pass failed: {:#}", e),
        }
        tokio::time::sleep(config.validate_interval).await;
    }
}
