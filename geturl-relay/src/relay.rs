use crate::cleanup;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::forward;
use crate::provisioning;
use crate::shutdown::ShutdownSignal;
use crate::wait;
use axum::body::Bytes;
use chrono::Utc;
use geturl_common::RelayRequest;
use geturl_providers::ContainerProvider;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// One ephemeral container per request: create, wait, forward, delete.
pub struct Relay {
    config: Arc<RelayConfig>,
    provider: Arc<dyn ContainerProvider>,
    client: Client,
    shutdown: ShutdownSignal,
}

impl Relay {
    pub fn new(
        config: Arc<RelayConfig>,
        provider: Arc<dyn ContainerProvider>,
        shutdown: ShutdownSignal,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            config,
            provider,
            client,
            shutdown,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Validate the body, then run the job on its own task so a dropped
    /// client connection cannot abort it before cleanup.
    pub async fn handle(self: &Arc<Self>, body: Value) -> Result<Bytes, RelayError> {
        let request = RelayRequest::from_value(&body)?;
        let relay = Arc::clone(self);
        tokio::spawn(async move { relay.run(request, body).await })
            .await
            .map_err(|e| RelayError::Unexpected(format!("relay job aborted: {}", e)))?
    }

    async fn run(&self, request: RelayRequest, body: Value) -> Result<Bytes, RelayError> {
        let job_id = Uuid::new_v4();
        let name = provisioning::instance_name(&job_id);
        let spec = provisioning::build_spec(&self.config, &name, &job_id, &request, Utc::now());

        tracing::info!(
            job_id = %job_id,
            instance = %name,
            resource = %request.name,
            "🚀 [relay] provisioning instance"
        );
        if let Err(e) = self.provider.create_container_group(&spec).await {
            // Nothing was accepted, so there is nothing to delete.
            return Err(RelayError::ProvisioningFailed(format!("{:#}", e)));
        }

        let outcome = self.wait_and_forward(&name, &body).await;
        cleanup::delete_instance(self.provider.as_ref(), &name).await;

        match &outcome {
            Ok(_) => tracing::info!(job_id = %job_id, "✅ [relay] request served by {}", name),
            Err(e) => tracing::warn!(job_id = %job_id, "⚠️ [relay] request failed: {}", e),
        }
        outcome
    }

    async fn wait_and_forward(&self, name: &str, body: &Value) -> Result<Bytes, RelayError> {
        let mut shutdown = self.shutdown.clone();
        let ip = wait::wait_until_running(
            self.provider.as_ref(),
            name,
            &self.config.poll,
            &mut shutdown,
        )
        .await?;

        let url = forward::instance_endpoint(&ip, self.config.container_port);
        let bytes = forward::forward(&self.client, &url, body, self.config.forward_timeout).await?;
        Ok(bytes)
    }
}
