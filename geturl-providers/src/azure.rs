use crate::identity::ManagedIdentityCredential;
use crate::{inventory, ContainerProvider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use geturl_common::InstanceState;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

pub const ARM_ENDPOINT: &str = "https://management.azure.com";
const ARM_RESOURCE: &str = "https://management.azure.com/";
const API_VERSION: &str = "2023-05-01";
const GROUPS_PROVIDER: &str = "Microsoft.ContainerInstance/containerGroups";

/// Azure Container Instances through the Resource Manager REST API.
pub struct AzureContainerProvider {
    client: Client,
    credential: ManagedIdentityCredential,
    endpoint: String,
    subscription_id: String,
    resource_group: String,
}

impl AzureContainerProvider {
    pub fn new(
        client: Client,
        credential: ManagedIdentityCredential,
        subscription_id: String,
        resource_group: String,
    ) -> Self {
        Self::with_endpoint(
            client,
            credential,
            ARM_ENDPOINT.to_string(),
            subscription_id,
            resource_group,
        )
    }

    /// Same as `new` but against another management endpoint (sovereign clouds, tests).
    pub fn with_endpoint(
        client: Client,
        credential: ManagedIdentityCredential,
        endpoint: String,
        subscription_id: String,
        resource_group: String,
    ) -> Self {
        Self {
            client,
            credential,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            subscription_id: subscription_id.trim().to_string(),
            resource_group: resource_group.trim().to_string(),
        }
    }

    /// Client used for management calls. ARM can stall; never wait forever.
    pub fn default_client() -> Result<Client> {
        Ok(Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(crate::MANAGEMENT_REQUEST_TIMEOUT)
            .build()?)
    }

    fn groups_url(&self) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.endpoint, self.subscription_id, self.resource_group, GROUPS_PROVIDER
        )
    }

    fn group_url(&self, name: &str) -> String {
        format!("{}/{}", self.groups_url(), name)
    }

    async fn bearer(&self) -> Result<String> {
        self.credential.token(ARM_RESOURCE).await
    }
}

/// ARM request body for a single-container group on a private subnet.
pub fn container_group_body(spec: &inventory::ContainerGroupSpec) -> Value {
    let env: Vec<Value> = spec
        .environment
        .iter()
        .map(|e| json!({ "name": e.name, "value": e.value }))
        .collect();

    let mut properties = json!({
        "containers": [{
            "name": spec.name,
            "properties": {
                "image": spec.image,
                "resources": {
                    "requests": { "cpu": spec.cpu, "memoryInGB": spec.memory_gb }
                },
                "ports": [{ "protocol": "TCP", "port": spec.port }],
                "environmentVariables": env,
            }
        }],
        "osType": "Linux",
        "restartPolicy": "Never",
        "subnetIds": [{ "id": spec.subnet_id }],
        "ipAddress": {
            "type": "Private",
            "ports": [{ "protocol": "TCP", "port": spec.port }]
        },
    });

    if let Some(reg) = &spec.registry {
        properties["imageRegistryCredentials"] = json!([{
            "server": reg.server,
            "username": reg.username,
            "password": reg.password,
        }]);
    }

    json!({
        "location": spec.location,
        "identity": { "type": "SystemAssigned" },
        "tags": spec.tags,
        "properties": properties,
    })
}

fn parse_tags(v: &Value) -> BTreeMap<String, String> {
    v.as_object()
        .map(|o| {
            o.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_group_status(json: &Value) -> inventory::ContainerGroupStatus {
    let props = &json["properties"];
    let private_ip = props["ipAddress"]["ip"]
        .as_str()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    inventory::ContainerGroupStatus {
        state: InstanceState::from_provider(props["instanceView"]["state"].as_str()),
        provisioning_state: props["provisioningState"].as_str().map(|s| s.to_string()),
        private_ip,
    }
}

#[async_trait]
impl ContainerProvider for AzureContainerProvider {
    async fn create_container_group(&self, spec: &inventory::ContainerGroupSpec) -> Result<()> {
        let url = self.group_url(&spec.name);
        let body = container_group_body(spec);
        tracing::info!(
            "🔵 [Azure API] PUT {} - Creating container group: image={}, location={}",
            url,
            spec.image,
            spec.location
        );

        let token = self.bearer().await?;
        let resp = self
            .client
            .put(&url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::error!(
                "❌ [Azure API] PUT {} failed: status={}, response={}",
                url,
                status.as_u16(),
                text
            );
            return Err(anyhow!(
                "Azure create_container_group failed: status={} body={}",
                status.as_u16(),
                text
            ));
        }

        tracing::info!("✅ [Azure API] PUT {} accepted: status={}", url, status.as_u16());
        Ok(())
    }

    async fn get_container_group(
        &self,
        name: &str,
    ) -> Result<Option<inventory::ContainerGroupStatus>> {
        let url = self.group_url(name);
        let token = self.bearer().await?;
        let resp = self
            .client
            .get(&url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!("⚠️ [Azure API] GET {} - not found", url);
            return Ok(None);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Azure get_container_group failed: status={} body={}",
                status.as_u16(),
                text
            ));
        }

        let json: Value = resp.json().await?;
        let group = parse_group_status(&json);
        tracing::debug!(
            "✅ [Azure API] GET {} succeeded: state={}, provisioning_state={:?}, ip={:?}",
            url,
            group.state,
            group.provisioning_state,
            group.private_ip
        );
        Ok(Some(group))
    }

    async fn delete_container_group(&self, name: &str) -> Result<bool> {
        let url = self.group_url(name);
        tracing::info!("🔵 [Azure API] DELETE {} - Deleting container group", url);

        let token = self.bearer().await?;
        let resp = self
            .client
            .delete(&url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            tracing::info!("ℹ️ [Azure API] DELETE {} - group already gone", url);
            return Ok(false);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::error!(
                "❌ [Azure API] DELETE {} failed: status={}, response={}",
                url,
                status.as_u16(),
                text
            );
            return Err(anyhow!(
                "Azure delete_container_group failed: status={} body={}",
                status.as_u16(),
                text
            ));
        }

        tracing::info!("✅ [Azure API] DELETE {} succeeded: status={}", url, status.as_u16());
        Ok(true)
    }

    async fn list_container_groups(&self) -> Result<Vec<inventory::ContainerGroupSummary>> {
        let mut groups = Vec::new();
        let mut next: Option<String> = Some(format!(
            "{}?api-version={}",
            self.groups_url(),
            API_VERSION
        ));

        while let Some(url) = next.take() {
            let token = self.bearer().await?;
            let resp = self.client.get(&url).bearer_auth(token).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(anyhow!(
                    "Azure list_container_groups failed: status={} body={}",
                    status.as_u16(),
                    text
                ));
            }

            let json: Value = resp.json().await?;
            if let Some(items) = json["value"].as_array() {
                for item in items {
                    if let Some(name) = item["name"].as_str() {
                        groups.push(inventory::ContainerGroupSummary {
                            name: name.to_string(),
                            tags: parse_tags(&item["tags"]),
                        });
                    }
                }
            }
            next = json["nextLink"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());
        }

        tracing::debug!("✅ [Azure API] Found {} container group(s)", groups.len());
        Ok(groups)
    }
}
