use crate::control::{ControlEvent, StreamMap};
use crate::kubernetes::{Cluster, PodLogStream};
use crate::mirror;
use crate::parser::{self, UNSEAL_MARKER};
use crate::types::MirrorConfig;
use futures::io::AsyncBufReadExt;
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Tail one pod's log stream until it closes.
///
/// Each line containing the unseal marker is parsed for its attribute block
/// and the named secret is mirrored. When the stream ends (pod restart or
/// termination), the tailer releases its entry in the live stream map and,
/// unless the process is shutting down, re-arms the control loop so a fresh
/// discovery cycle picks up the replacement pod.
pub async fn run<C: Cluster>(
    cluster: C,
    stream: PodLogStream,
    pod: String,
    config: Arc<MirrorConfig>,
    streams: StreamMap,
    events: mpsc::Sender<ControlEvent>,
    shutdown: watch::Receiver<bool>,
) {
    info!("scanning log stream of {}", pod);

    let mut lines = stream.lines();
    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("error reading log line from pod {}: {}", pod, e);
                break;
            }
        };
        if !line.contains(UNSEAL_MARKER) {
            continue;
        }
        let Some(attrs) = parser::parse_event_attrs(&line) else {
            warn!("skipping malformed unseal event line: {}", line);
            continue;
        };
        let Some(name) = attrs.get("Name") else {
            warn!("skipping unseal event without a Name attribute: {}", line);
            continue;
        };
        if let Err(e) = mirror::mirror_secret(&cluster, &config, name).await {
            warn!("failed to mirror secret {}: {:#}", name, e);
        }
    }

    info!("log stream of {} closed", pod);
    streams.lock().await.remove(&pod);

    // A closed stream means the pod restarted or went away; re-enter
    // discovery unless the process is draining. A full event slot means a
    // discovery run is already pending.
    if !*shutdown.borrow() && events.try_send(ControlEvent::Rearm).is_ok() {
        debug!("re-armed discovery after stream closure of {}", pod);
    }
}
