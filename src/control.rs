use crate::discovery;
use crate::kubernetes::Cluster;
use crate::tailer;
use crate::types::{ControllerTarget, MirrorConfig};
use crate::validator;
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

/// Live mapping from pod name to its tail task. Discovery reads it to avoid
/// re-tailing a pod; each tailer removes its own entry on teardown.
pub type StreamMap = Arc<Mutex<HashMap<String, AbortHandle>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Idle,
    Running,
    Draining,
    Terminated,
}

#[derive(Debug, Clone, Copy)]
pub enum ControlEvent {
    /// Re-enter pod discovery; sent by tailers when their stream closes.
    Rearm,
}

/// Top-level orchestrator: owns the state machine, the re-arm event queue,
/// the live stream map, and the validator task.
pub struct ControlLoop<C: Cluster> {
    cluster: C,
    config: Arc<MirrorConfig>,
    pod_pattern: Regex,
    streams: StreamMap,
    events_tx: mpsc::Sender<ControlEvent>,
    events_rx: mpsc::Receiver<ControlEvent>,
    shutdown: watch::Receiver<bool>,
    state: LoopState,
    validator: Option<AbortHandle>,
}

impl<C: Cluster> ControlLoop<C> {
    pub fn new(
        cluster: C,
        config: MirrorConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let pod_pattern = Regex::new(&config.controller_name)
            .with_context(|| format!("invalid controller name pattern {}", config.controller_name))?;
        // Capacity 1: concurrent stream closures coalesce into one
        // discovery run.
        let (events_tx, events_rx) = mpsc::channel(1);
        Ok(Self {
            cluster,
            config: Arc::new(config),
            pod_pattern,
            streams: Arc::new(Mutex::new(HashMap::new())),
            events_tx,
            events_rx,
            shutdown,
            state: LoopState::Idle,
            validator: None,
        })
    }

    /// Drive the state machine until termination. A fatal discovery error
    /// (deployment lookup failure) terminates without draining; external
    /// cancellation drains every open stream first.
    pub async fn run(mut self) -> Result<()> {
        loop {
            match self.state {
                LoopState::Idle => {
                    // Self-trigger the first discovery cycle and start the
                    // one validator this process will ever run.
                    let _ = self.events_tx.try_send(ControlEvent::Rearm);
                    self.validator = Some(
                        tokio::spawn(validator::run(
                            self.cluster.clone(),
                            Arc::clone(&self.config),
                        ))
                        .abort_handle(),
                    );
                    self.state = LoopState::Running;
                }
                LoopState::Running => {
                    let mut shutdown = self.shutdown.clone();
                    tokio::select! {
                        _ = shutdown.wait_for(|stop| *stop) => {
                            self.state = LoopState::Draining;
                        }
                        event = self.events_rx.recv() => {
                            if let Some(ControlEvent::Rearm) = event {
                                if let Err(e) = self.rearm().await {
                                    error!("discovery failed fatally: {:#}", e);
                                    self.state = LoopState::Terminated;
                                    return Err(e);
                                }
                            }
                        }
                    }
                }
                LoopState::Draining => {
                    self.drain().await;
                    self.state = LoopState::Terminated;
                }
                LoopState::Terminated => return Ok(()),
            }
        }
    }

    /// One discovery cycle, cancellable by the shutdown signal.
    async fn rearm(&mut self) -> Result<()> {
        info!("starting discovery cycle");
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => {
                self.state = LoopState::Draining;
                Ok(())
            }
            result = self.run_cycle() => result,
        }
    }

    /// Discover the controller pods and attach a tailer to every pod that
    /// does not already have an open stream.
    async fn run_cycle(&self) -> Result<()> {
        let target = ControllerTarget {
            name: self.config.controller_name.clone(),
            namespace: self.config.source_namespace.clone(),
        };
        let pods = discovery::await_pods(
            &self.cluster,
            &target,
            &self.pod_pattern,
            self.config.poll_interval,
        )
        .await?;

        for pod in pods {
            if self.streams.lock().await.contains_key(&pod) {
                continue;
            }
            let stream = match self
                .cluster
                .open_log_stream(&self.config.source_namespace, &pod, &self.config.container)
                .await
            {
                Ok(stream) => stream,
                Err(e) => {
                    // Stays absent from the map, so a future cycle retries.
                    warn!("failed to open log stream for pod {}: {:#}", pod, e);
                    continue;
                }
            };
            let task = tokio::spawn(tailer::run(
                self.cluster.clone(),
                stream,
                pod.clone(),
                Arc::clone(&self.config),
                Arc::clone(&self.streams),
                self.events_tx.clone(),
                self.shutdown.clone(),
            ));
            self.streams.lock().await.insert(pod, task.abort_handle());
        }
        Ok(())
    }

    /// Close every tracked stream, stop the validator, and give in-flight
    /// teardown a fixed grace window.
    async fn drain(&mut self) {
        if let Some(validator) = self.validator.take() {
            validator.abort();
        }
        let mut streams = self.streams.lock().await;
        info!("draining {} open log stream(s)", streams.len());
        for (pod, task) in streams.drain() {
            info!("closing log stream of {}", pod);
            task.abort();
        }
        drop(streams);
        tokio::time::sleep(self.config.drain_grace).await;
    }
}
