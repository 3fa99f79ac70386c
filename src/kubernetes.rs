use crate::types::SecretView;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::io::AsyncBufRead;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::{ListParams, LogParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use std::pin::Pin;

/// Field manager identity attached to every server-side apply.
pub const FIELD_MANAGER: &str = "sealed-secrets-mirror";

/// A follow-mode pod log stream, exclusively owned by the tailer reading it.
pub type PodLogStream = Pin<Box<dyn AsyncBufRead + Send>>;

/// The cluster capability surface the core consumes. Implemented for the
/// real API server by [`KubeCluster`] and by an in-memory fake in tests.
#[async_trait]
pub trait Cluster: Clone + Send + Sync + 'static {
    /// Desired replica count declared by the deployment spec.
    async fn deployment_replicas(&self, namespace: &str, name: &str) -> Result<i32>;

    /// Names of all pods in the namespace.
    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>>;

    /// Open a follow-mode log stream for one container of one pod.
    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<PodLogStream>;

    /// Fetch a secret; `None` when it does not exist.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretView>>;

    /// List secrets in the namespace matching a type field selector.
    async fn list_secrets(&self, namespace: &str, type_selector: &str) -> Result<Vec<SecretView>>;

    /// Create-or-update a secret via server-side apply, returning the
    /// resulting state.
    async fn apply_secret(&self, namespace: &str, secret: SecretView) -> Result<SecretView>;
}

impl From<Secret> for SecretView {
    fn from(secret: Secret) -> Self {
        Self {
            name: secret.name_any(),
            data: secret.data.unwrap_or_default(),
            labels: secret.metadata.labels.unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn deployment_replicas(&self, namespace: &str, name: &str) -> Result<i32> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let deployment = api
            .get(name)
            .await
            .with_context(|| format!("failed to get deployment {}/{}", namespace, name))?;
        Ok(deployment.spec.and_then(|s| s.replicas).unwrap_or(1))
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("failed to list pods in {}", namespace))?;
        Ok(pods.iter().map(|pod| pod.name_any()).collect())
    }

    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<PodLogStream> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = LogParams {
            follow: true,
            container: Some(container.to_string()),
            ..Default::default()
        };
        let stream = api
            .log_stream(pod, &lp)
            .await
            .with_context(|| format!("failed to open log stream for pod {}/{}", namespace, pod))?;
        Ok(Box::pin(stream))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretView>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get_opt(name)
            .await
            .with_context(|| format!("failed to get secret {}/{}", namespace, name))?;
        Ok(secret.map(SecretView::from))
    }

    async fn list_secrets(&self, namespace: &str, type_selector: &str) -> Result<Vec<SecretView>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secrets = api
            .list(&ListParams::default().fields(type_selector))
            .await
            .with_context(|| format!("failed to list secrets in {}", namespace))?;
        Ok(secrets.items.into_iter().map(SecretView::from).collect())
    }

    async fn apply_secret(&self, namespace: &str, secret: SecretView) -> Result<SecretView> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        // Server-side apply requires apiVersion and kind in the patch body.
        let patch = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": &secret.name,
                "namespace": namespace,
                "labels": &secret.labels,
            },
            "data": &secret.data,
        });
        let applied = api
            .patch(
                &secret.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Apply(&patch),
            )
            .await
            .with_context(|| {
                format!("failed to apply secret {}/{}", namespace, secret.name)
            })?;
        Ok(SecretView::from(applied))
    }
}
