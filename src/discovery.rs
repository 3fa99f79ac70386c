use crate::kubernetes::Cluster;
use crate::types::ControllerTarget;
use anyhow::{Context, Result};
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Poll the cluster until every desired controller replica has a pod.
///
/// The deployment's declared replica count is the completion criterion: the
/// poll only returns once the number of name-matched pods equals it. A
/// failed deployment lookup is fatal. A failed pod list is transient: it
/// counts as an empty observation and the next tick retries. There is no
/// give-up policy; cancellation comes from the control loop dropping this
/// future.
pub async fn await_pods<C: Cluster>(
    cluster: &C,
    target: &ControllerTarget,
    pattern: &Regex,
    poll_interval: Duration,
) -> Result<Vec<String>> {
    let replicas = cluster
        .deployment_replicas(&target.namespace, &target.name)
        .await
        .with_context(|| {
            format!(
                "failed to look up deployment {}/{}",
                target.namespace, target.name
            )
        })?;
    debug!(
        "deployment {} declares {} replica(s)",
        target.name, replicas
    );

    loop {
        let pods = match cluster.list_pods(&target.namespace).await {
            Ok(pods) => pods,
            Err(e) => {
                warn!("failed to list pods in {}: {:#}", target.namespace, e);
                Vec::new()
            }
        };
        let matched: Vec<String> = pods
            .into_iter()
            .filter(|pod| pattern.is_match(pod))
            .collect();
        if matched.len() == replicas as usize {
            info!("found {} controller pod(s)", matched.len());
            return Ok(matched);
        }

        debug!(
            "searching for controller pods ({}/{} present)",
            matched.len(),
            replicas
        );
        tokio::time::sleep(poll_interval).await;
    }
}
