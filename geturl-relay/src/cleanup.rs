use geturl_providers::ContainerProvider;

/// Delete a relay-created group. Failures are logged, never propagated: the
/// caller's response does not depend on cleanup. Returns whether the delete
/// call itself succeeded.
pub async fn delete_instance(provider: &dyn ContainerProvider, name: &str) -> bool {
    match provider.delete_container_group(name).await {
        Ok(true) => {
            tracing::info!("🗑️ [cleanup] deleted container group {}", name);
            true
        }
        Ok(false) => {
            tracing::info!("🗑️ [cleanup] container group {} was already gone", name);
            true
        }
        Err(e) => {
            tracing::warn!("⚠️ [cleanup] failed to delete container group {}: {:#}", name, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geturl_providers::mock::MockProvider;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn reports_delete_outcome() {
        let provider = MockProvider::new();
        provider.insert_group("geturl-1", BTreeMap::new());
        assert!(delete_instance(&provider, "geturl-1").await);
        assert!(delete_instance(&provider, "geturl-1").await);

        let failing = MockProvider::new().failing_delete("conflict");
        assert!(!delete_instance(&failing, "geturl-2").await);
        assert_eq!(failing.deleted(), vec!["geturl-2".to_string()]);
    }
}
