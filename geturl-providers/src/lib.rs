use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Upper bound on a single management-plane request (token fetch included).
pub const MANAGEMENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Management-plane operations the relay needs from a container platform.
///
/// Every call maps to one request against the provider; implementations must
/// not retry on their own.
#[async_trait]
pub trait ContainerProvider: Send + Sync {
    /// Submit a container group for creation. Returns once the provider has
    /// accepted the request, not once the container is running.
    async fn create_container_group(&self, spec: &inventory::ContainerGroupSpec) -> Result<()>;

    /// Current view of a container group. `Ok(None)` when the provider does not
    /// know the name (not yet visible, or already deleted).
    async fn get_container_group(
        &self,
        name: &str,
    ) -> Result<Option<inventory::ContainerGroupStatus>>;

    /// Request deletion. Returns false when the group did not exist.
    async fn delete_container_group(&self, name: &str) -> Result<bool>;

    // Optional: used by the orphan sweep.
    // Default implementation returns an empty list (nothing to reconcile).
    async fn list_container_groups(&self) -> Result<Vec<inventory::ContainerGroupSummary>> {
        Ok(vec![])
    }
}

pub mod inventory {
    use geturl_common::InstanceState;
    use std::collections::BTreeMap;
    use std::fmt;

    #[derive(Clone)]
    pub struct RegistryCredential {
        pub server: String,
        pub username: String,
        pub password: String,
    }

    // Keep the password out of logs.
    impl fmt::Debug for RegistryCredential {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("RegistryCredential")
                .field("server", &self.server)
                .field("username", &self.username)
                .field("password", &"***")
                .finish()
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct EnvVar {
        pub name: String,
        pub value: String,
    }

    /// Everything needed to create one single-container group on a private subnet.
    /// Restart policy is always `Never` and no public address is requested.
    #[derive(Clone, Debug)]
    pub struct ContainerGroupSpec {
        pub name: String,
        pub location: String,
        pub image: String,
        pub cpu: f64,
        pub memory_gb: f64,
        pub port: u16,
        pub environment: Vec<EnvVar>,
        pub subnet_id: String,
        pub registry: Option<RegistryCredential>,
        pub tags: BTreeMap<String, String>,
    }

    #[derive(Clone, Debug)]
    pub struct ContainerGroupStatus {
        pub state: InstanceState,
        pub provisioning_state: Option<String>,
        pub private_ip: Option<String>,
    }

    impl ContainerGroupStatus {
        /// The management plane gave up on the group (e.g. image pull denied).
        /// The instance view is usually empty then, so `state` alone reads as pending.
        pub fn provisioning_failed(&self) -> bool {
            self.provisioning_state.as_deref().is_some_and(|p| {
                p.eq_ignore_ascii_case("failed") || p.eq_ignore_ascii_case("canceled")
            })
        }
    }

    #[derive(Clone, Debug)]
    pub struct ContainerGroupSummary {
        pub name: String,
        pub tags: BTreeMap<String, String>,
    }
}

#[cfg(feature = "azure")]
pub mod azure;

#[cfg(feature = "azure")]
pub mod identity;

#[cfg(feature = "mock")]
pub mod mock;
