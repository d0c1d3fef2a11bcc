use crate::cleanup;
use crate::config::SweepPolicy;
use crate::provisioning::{TAG_CREATED_AT, TAG_MANAGED_BY};
use crate::shutdown::ShutdownSignal;
use chrono::{DateTime, Utc};
use geturl_common::MANAGED_BY;
use geturl_providers::inventory::ContainerGroupSummary;
use geturl_providers::ContainerProvider;
use std::sync::Arc;
use std::time::Duration;

/// Periodically delete relay-created groups that outlived any request.
/// Catches groups left behind by crashes or failed deletes.
pub async fn run(
    provider: Arc<dyn ContainerProvider>,
    policy: SweepPolicy,
    mut shutdown: ShutdownSignal,
) {
    let mut interval = tokio::time::interval(policy.interval);
    tracing::info!(
        "🧹 job-sweep started (every {:?}, max age {:?})",
        policy.interval,
        policy.max_age
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.cancelled() => {
                tracing::info!("🧹 job-sweep stopping");
                return;
            }
        }

        match sweep_orphans(provider.as_ref(), policy.max_age, Utc::now()).await {
            Ok(count) if count > 0 => tracing::info!("🧹 job-sweep: deleted {} orphan(s)", count),
            Ok(_) => {}
            Err(e) => tracing::error!("❌ job-sweep error: {:#}", e),
        }
    }
}

pub async fn sweep_orphans(
    provider: &dyn ContainerProvider,
    max_age: Duration,
    now: DateTime<Utc>,
) -> anyhow::Result<usize> {
    let groups = provider.list_container_groups().await?;
    let mut deleted = 0;
    for group in groups.iter().filter(|g| is_stale(g, max_age, now)) {
        if cleanup::delete_instance(provider, &group.name).await {
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Only groups tagged as ours with a parseable creation time qualify.
pub fn is_stale(group: &ContainerGroupSummary, max_age: Duration, now: DateTime<Utc>) -> bool {
    if group.tags.get(TAG_MANAGED_BY).map(String::as_str) != Some(MANAGED_BY) {
        return false;
    }
    let Some(created_at) = group
        .tags
        .get(TAG_CREATED_AT)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
    else {
        return false;
    };
    let Ok(max_age) = chrono::Duration::from_std(max_age) else {
        return false;
    };
    now.signed_duration_since(created_at.with_timezone(&Utc)) > max_age
}
