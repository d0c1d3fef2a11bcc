use crate::config::RelayConfig;
use chrono::{DateTime, Utc};
use geturl_common::{RelayRequest, MANAGED_BY};
use geturl_providers::inventory::{ContainerGroupSpec, EnvVar};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const TAG_MANAGED_BY: &str = "managed-by";
pub const TAG_JOB_ID: &str = "job-id";
pub const TAG_CREATED_AT: &str = "created-at";

const INSTANCE_CPU: f64 = 1.0;
const INSTANCE_MEMORY_GB: f64 = 1.0;

/// `geturl-` plus the first 8 hex chars of the job id. Lowercase, so it is a
/// valid container group name.
pub fn instance_name(job_id: &Uuid) -> String {
    let simple = job_id.simple().to_string();
    format!("geturl-{}", &simple[..8])
}

pub fn build_spec(
    config: &RelayConfig,
    name: &str,
    job_id: &Uuid,
    request: &RelayRequest,
    now: DateTime<Utc>,
) -> ContainerGroupSpec {
    let mut tags = BTreeMap::new();
    tags.insert(TAG_MANAGED_BY.to_string(), MANAGED_BY.to_string());
    tags.insert(TAG_JOB_ID.to_string(), job_id.to_string());
    tags.insert(TAG_CREATED_AT.to_string(), now.to_rfc3339());

    ContainerGroupSpec {
        name: name.to_string(),
        location: config.location.clone(),
        image: config.container_image.clone(),
        cpu: INSTANCE_CPU,
        memory_gb: INSTANCE_MEMORY_GB,
        port: config.container_port,
        environment: vec![EnvVar {
            name: "PAYLOAD".to_string(),
            value: request.to_payload(),
        }],
        subnet_id: config.subnet_id.clone(),
        registry: Some(config.registry.clone()),
        tags,
    }
}
