use crate::{inventory, ContainerProvider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use geturl_common::InstanceState;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// In-memory provider for local runs and tests.
///
/// Each status query pops the next state from the script; the last state
/// repeats once the script is exhausted. Every call is recorded so callers
/// can assert on what was created, queried and deleted.
pub struct MockProvider {
    private_ip: Option<String>,
    provisioning_state: String,
    create_error: Option<String>,
    delete_error: Option<String>,
    script: Mutex<VecDeque<InstanceState>>,
    groups: Mutex<BTreeMap<String, inventory::ContainerGroupSummary>>,
    created: Mutex<Vec<inventory::ContainerGroupSpec>>,
    deleted: Mutex<Vec<String>>,
    status_queries: Mutex<usize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Reports Running on the first query, at 127.0.0.1.
    pub fn new() -> Self {
        Self {
            private_ip: Some("127.0.0.1".to_string()),
            provisioning_state: "Succeeded".to_string(),
            create_error: None,
            delete_error: None,
            script: Mutex::new(VecDeque::from([InstanceState::Running])),
            groups: Mutex::new(BTreeMap::new()),
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            status_queries: Mutex::new(0),
        }
    }

    pub fn with_private_ip(mut self, ip: Option<&str>) -> Self {
        self.private_ip = ip.map(|s| s.to_string());
        self
    }

    /// Management-plane state reported alongside every instance state.
    pub fn with_provisioning_state(mut self, state: &str) -> Self {
        self.provisioning_state = state.to_string();
        self
    }

    pub fn with_states(self, states: Vec<InstanceState>) -> Self {
        *lock(&self.script) = states.into();
        self
    }

    pub fn never_running(self) -> Self {
        self.with_states(vec![InstanceState::Pending])
    }

    pub fn failing_create(mut self, message: &str) -> Self {
        self.create_error = Some(message.to_string());
        self
    }

    pub fn failing_delete(mut self, message: &str) -> Self {
        self.delete_error = Some(message.to_string());
        self
    }

    /// Seed a group that was not created through this provider (sweep fixtures).
    pub fn insert_group(&self, name: &str, tags: BTreeMap<String, String>) {
        lock(&self.groups).insert(
            name.to_string(),
            inventory::ContainerGroupSummary {
                name: name.to_string(),
                tags,
            },
        );
    }

    pub fn created(&self) -> Vec<inventory::ContainerGroupSpec> {
        lock(&self.created).clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }

    pub fn status_queries(&self) -> usize {
        *lock(&self.status_queries)
    }

    fn next_state(&self) -> InstanceState {
        let mut script = lock(&self.script);
        if script.len() > 1 {
            script.pop_front().unwrap_or(InstanceState::Pending)
        } else {
            script.front().cloned().unwrap_or(InstanceState::Pending)
        }
    }
}

// A poisoned lock only means another test thread panicked; the data is still usable.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl ContainerProvider for MockProvider {
    async fn create_container_group(&self, spec: &inventory::ContainerGroupSpec) -> Result<()> {
        if let Some(msg) = &self.create_error {
            return Err(anyhow!("mock create_container_group failed: {}", msg));
        }
        tracing::info!("🧪 [mock] created container group {}", spec.name);
        lock(&self.created).push(spec.clone());
        lock(&self.groups).insert(
            spec.name.clone(),
            inventory::ContainerGroupSummary {
                name: spec.name.clone(),
                tags: spec.tags.clone(),
            },
        );
        Ok(())
    }

    async fn get_container_group(
        &self,
        name: &str,
    ) -> Result<Option<inventory::ContainerGroupStatus>> {
        *lock(&self.status_queries) += 1;
        if !lock(&self.groups).contains_key(name) {
            return Ok(None);
        }
        let state = self.next_state();
        let private_ip = if state.is_running() {
            self.private_ip.clone()
        } else {
            None
        };
        Ok(Some(inventory::ContainerGroupStatus {
            state,
            provisioning_state: Some(self.provisioning_state.clone()),
            private_ip,
        }))
    }

    async fn delete_container_group(&self, name: &str) -> Result<bool> {
        lock(&self.deleted).push(name.to_string());
        if let Some(msg) = &self.delete_error {
            return Err(anyhow!("mock delete_container_group failed: {}", msg));
        }
        tracing::info!("🧪 [mock] deleted container group {}", name);
        Ok(lock(&self.groups).remove(name).is_some())
    }

    async fn list_container_groups(&self) -> Result<Vec<inventory::ContainerGroupSummary>> {
        Ok(lock(&self.groups).values().cloned().collect())
    }
}
