use crate::config::{ProviderKind, RelayConfig};
use geturl_providers::ContainerProvider;
use std::sync::Arc;

pub struct ProviderManager;

impl ProviderManager {
    pub fn get_provider(config: &RelayConfig) -> anyhow::Result<Arc<dyn ContainerProvider>> {
        match config.provider {
            ProviderKind::Azure => Self::azure(config),
            ProviderKind::Mock => Self::mock(config),
        }
    }

    #[cfg(feature = "provider-azure")]
    fn azure(config: &RelayConfig) -> anyhow::Result<Arc<dyn ContainerProvider>> {
        use geturl_providers::azure::AzureContainerProvider;
        use geturl_providers::identity::{IdentitySource, ManagedIdentityCredential};

        let client = AzureContainerProvider::default_client()?;
        let source = IdentitySource::from_env();
        tracing::info!("🔑 using managed identity via {}", source_kind(&source));
        let credential =
            ManagedIdentityCredential::new(client.clone(), source, config.client_id.clone());
        Ok(Arc::new(AzureContainerProvider::new(
            client,
            credential,
            config.subscription_id.clone(),
            config.resource_group.clone(),
        )))
    }

    #[cfg(not(feature = "provider-azure"))]
    fn azure(_config: &RelayConfig) -> anyhow::Result<Arc<dyn ContainerProvider>> {
        anyhow::bail!("RELAY_PROVIDER=azure but the relay was built without `provider-azure`")
    }

    #[cfg(feature = "provider-mock")]
    fn mock(config: &RelayConfig) -> anyhow::Result<Arc<dyn ContainerProvider>> {
        tracing::warn!("🧪 using mock provider, instances resolve to {}", config.mock_private_ip);
        let provider = geturl_providers::mock::MockProvider::new()
            .with_private_ip(Some(&config.mock_private_ip));
        Ok(Arc::new(provider))
    }

    #[cfg(not(feature = "provider-mock"))]
    fn mock(_config: &RelayConfig) -> anyhow::Result<Arc<dyn ContainerProvider>> {
        anyhow::bail!("RELAY_PROVIDER=mock but the relay was built without `provider-mock`")
    }
}

// The endpoint itself is not secret, but the header is; only log the kind.
#[cfg(feature = "provider-azure")]
fn source_kind(source: &geturl_providers::identity::IdentitySource) -> &'static str {
    match source {
        geturl_providers::identity::IdentitySource::AppService { .. } => "app-service",
        geturl_providers::identity::IdentitySource::Imds { .. } => "imds",
    }
}
