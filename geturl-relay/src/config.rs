use geturl_providers::inventory::RegistryCredential;
use geturl_providers::MANAGEMENT_REQUEST_TIMEOUT;
use std::time::Duration;

pub const DEFAULT_LOCATION: &str = "centralus";
pub const DEFAULT_CONTAINER_PORT: u16 = 8080;
pub const DEFAULT_LISTEN_PORT: u16 = 7071;
pub const DEFAULT_MOCK_PRIVATE_IP: &str = "127.0.0.1";

/// `created-at` is stamped before the token fetch and the PUT, each bounded
/// by `MANAGEMENT_REQUEST_TIMEOUT`, so the wait deadline starts up to this late.
pub const CREATE_BUDGET: Duration = Duration::from_secs(MANAGEMENT_REQUEST_TIMEOUT.as_secs() * 2);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable(s): {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Azure,
    Mock,
}

/// Readiness wait: exponential backoff between status queries, bounded by a deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub factor: f64,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(5),
            factor: 2.0,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepPolicy {
    pub interval: Duration,
    pub max_age: Duration,
}

/// Deployment settings for the relay, validated once at startup.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub provider: ProviderKind,
    pub location: String,
    pub resource_group: String,
    pub subscription_id: String,
    pub container_image: String,
    pub subnet_id: String,
    pub container_port: u16,
    pub registry: RegistryCredential,
    /// User-assigned identity; system-assigned when unset.
    pub client_id: Option<String>,
    pub poll: PollPolicy,
    pub forward_timeout: Duration,
    pub sweep: Option<SweepPolicy>,
    pub mock_private_ip: String,
    pub listen_port: u16,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match get("RELAY_PROVIDER").as_deref().map(str::to_ascii_lowercase) {
            None => ProviderKind::Azure,
            Some(p) if p == "azure" => ProviderKind::Azure,
            Some(p) if p == "mock" => ProviderKind::Mock,
            Some(p) => {
                return Err(ConfigError::Invalid {
                    key: "RELAY_PROVIDER",
                    value: p,
                    reason: "expected \"azure\" or \"mock\"".to_string(),
                })
            }
        };

        // Required for the real provider. The mock never talks to Azure, so it
        // runs with placeholders.
        let mut missing = Vec::new();
        let mut required = |key: &'static str| match get(key) {
            Some(v) => v,
            None => {
                if provider == ProviderKind::Azure {
                    missing.push(key);
                }
                format!("mock-{}", key.to_ascii_lowercase().replace('_', "-"))
            }
        };
        let resource_group = required("RESOURCE_GROUP");
        let subscription_id = required("AZURE_SUBSCRIPTION_ID");
        let container_image = required("CONTAINER_IMAGE");
        let subnet_id = required("ACI_SUBNET_ID");
        let registry = RegistryCredential {
            server: required("ACR_SERVER"),
            username: required("ACR_USERNAME"),
            password: required("ACR_PASSWORD"),
        };
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let defaults = PollPolicy::default();
        let poll = PollPolicy {
            initial_interval: millis(&get, "RELAY_POLL_INITIAL_MS", defaults.initial_interval)?,
            max_interval: millis(&get, "RELAY_POLL_MAX_MS", defaults.max_interval)?,
            factor: defaults.factor,
            timeout: secs(&get, "RELAY_PROVISION_TIMEOUT_SECS", defaults.timeout)?,
        };
        let forward_timeout = secs(&get, "RELAY_FORWARD_TIMEOUT_SECS", Duration::from_secs(10))?;

        let sweep_interval = secs(&get, "RELAY_SWEEP_INTERVAL_SECS", Duration::ZERO)?;
        let sweep = if sweep_interval.is_zero() {
            None
        } else {
            Some(SweepPolicy {
                interval: sweep_interval,
                max_age: secs(&get, "RELAY_ORPHAN_MAX_AGE_SECS", Duration::from_secs(600))?,
            })
        };

        let config = Self {
            provider,
            location: get("AZURE_LOCATION").unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            resource_group,
            subscription_id,
            container_image,
            subnet_id,
            container_port: port(&get, "CONTAINER_PORT", DEFAULT_CONTAINER_PORT)?,
            registry,
            client_id: get("AZURE_CLIENT_ID"),
            poll,
            forward_timeout,
            sweep,
            mock_private_ip: get("RELAY_MOCK_PRIVATE_IP")
                .unwrap_or_else(|| DEFAULT_MOCK_PRIVATE_IP.to_string()),
            listen_port: port(&get, "FUNCTIONS_CUSTOMHANDLER_PORT", DEFAULT_LISTEN_PORT)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Longest time a live request can own its instance, measured from the
    /// `created-at` tag: create, wait, forward.
    pub fn max_request_lifetime(&self) -> Duration {
        CREATE_BUDGET + self.poll.timeout + self.forward_timeout
    }

    /// Cross-field checks that no single variable can catch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &'static str, value: Duration, reason: &str| ConfigError::Invalid {
            key,
            value: format!("{:?}", value),
            reason: reason.to_string(),
        };
        if self.poll.initial_interval.is_zero() {
            return Err(invalid(
                "RELAY_POLL_INITIAL_MS",
                self.poll.initial_interval,
                "must be > 0",
            ));
        }
        if self.poll.max_interval < self.poll.initial_interval {
            return Err(invalid(
                "RELAY_POLL_MAX_MS",
                self.poll.max_interval,
                "must be >= RELAY_POLL_INITIAL_MS",
            ));
        }
        if self.poll.timeout.is_zero() {
            return Err(invalid(
                "RELAY_PROVISION_TIMEOUT_SECS",
                self.poll.timeout,
                "must be > 0",
            ));
        }
        if self.forward_timeout.is_zero() {
            return Err(invalid(
                "RELAY_FORWARD_TIMEOUT_SECS",
                self.forward_timeout,
                "must be > 0",
            ));
        }
        if let Some(sweep) = &self.sweep {
            if sweep.max_age <= self.max_request_lifetime() {
                return Err(invalid(
                    "RELAY_ORPHAN_MAX_AGE_SECS",
                    sweep.max_age,
                    "must exceed create budget (60s) + RELAY_PROVISION_TIMEOUT_SECS \
                     + RELAY_FORWARD_TIMEOUT_SECS",
                ));
            }
        }
        Ok(())
    }
}

fn parse_u64(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    get(key)
        .map(|raw| {
            raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn millis(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    Ok(parse_u64(get, key)?.map(Duration::from_millis).unwrap_or(default))
}

fn secs(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    Ok(parse_u64(get, key)?.map(Duration::from_secs).unwrap_or(default))
}

fn port(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u16,
) -> Result<u16, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    const AZURE_ENV: &[(&str, &str)] = &[
        ("RESOURCE_GROUP", "rg-geturl"),
        ("AZURE_SUBSCRIPTION_ID", "0000-sub"),
        ("CONTAINER_IMAGE", "myregistry.azurecr.io/geturl:1"),
        ("ACI_SUBNET_ID", "/subscriptions/0000-sub/.../subnets/aci"),
        ("ACR_SERVER", "myregistry.azurecr.io"),
        ("ACR_USERNAME", "puller"),
        ("ACR_PASSWORD", "hunter2"),
    ];

    #[test]
    fn azure_defaults() {
        let cfg = RelayConfig::from_lookup(lookup(AZURE_ENV)).unwrap();
        assert_eq!(cfg.provider, ProviderKind::Azure);
        assert_eq!(cfg.location, "centralus");
        assert_eq!(cfg.container_port, 8080);
        assert_eq!(cfg.listen_port, 7071);
        assert_eq!(cfg.poll, PollPolicy::default());
        assert_eq!(cfg.forward_timeout, Duration::from_secs(10));
        assert!(cfg.sweep.is_none());
        assert!(cfg.client_id.is_none());
        assert_eq!(cfg.registry.password, "hunter2");
    }

    #[test]
    fn reports_every_missing_variable() {
        let err = RelayConfig::from_lookup(lookup(&[
            ("RESOURCE_GROUP", "rg"),
            ("ACR_PASSWORD", "  "),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing(vec![
                "AZURE_SUBSCRIPTION_ID",
                "CONTAINER_IMAGE",
                "ACI_SUBNET_ID",
                "ACR_SERVER",
                "ACR_USERNAME",
                "ACR_PASSWORD",
            ])
        );
        assert!(err.to_string().contains("AZURE_SUBSCRIPTION_ID, CONTAINER_IMAGE"));
    }

    #[test]
    fn mock_provider_needs_no_azure_settings() {
        let cfg = RelayConfig::from_lookup(lookup(&[("RELAY_PROVIDER", "Mock")])).unwrap();
        assert_eq!(cfg.provider, ProviderKind::Mock);
        assert_eq!(cfg.mock_private_ip, "127.0.0.1");
    }

    #[test]
    fn overrides_and_sweep() {
        let mut env = AZURE_ENV.to_vec();
        env.extend([
            ("AZURE_LOCATION", "westeurope"),
            ("CONTAINER_PORT", "9000"),
            ("RELAY_POLL_INITIAL_MS", "250"),
            ("RELAY_POLL_MAX_MS", "2000"),
            ("RELAY_PROVISION_TIMEOUT_SECS", "60"),
            ("RELAY_SWEEP_INTERVAL_SECS", "300"),
            ("RELAY_ORPHAN_MAX_AGE_SECS", "900"),
        ]);
        let cfg = RelayConfig::from_lookup(lookup(&env)).unwrap();
        assert_eq!(cfg.location, "westeurope");
        assert_eq!(cfg.container_port, 9000);
        assert_eq!(cfg.poll.initial_interval, Duration::from_millis(250));
        assert_eq!(cfg.poll.max_interval, Duration::from_secs(2));
        assert_eq!(cfg.poll.timeout, Duration::from_secs(60));
        assert_eq!(
            cfg.sweep,
            Some(SweepPolicy {
                interval: Duration::from_secs(300),
                max_age: Duration::from_secs(900),
            })
        );
    }

    #[test]
    fn orphan_age_must_outlast_create_wait_and_forward() {
        let sweep_env = |max_age: &'static str| {
            let mut env = AZURE_ENV.to_vec();
            env.extend([
                ("RELAY_SWEEP_INTERVAL_SECS", "60"),
                ("RELAY_ORPHAN_MAX_AGE_SECS", max_age),
            ]);
            env
        };

        // 60s create budget + 120s wait + 10s forward.
        let cfg = RelayConfig::from_lookup(lookup(AZURE_ENV)).unwrap();
        assert_eq!(cfg.max_request_lifetime(), Duration::from_secs(190));

        // Wait + forward alone would have allowed this one.
        assert!(matches!(
            RelayConfig::from_lookup(lookup(&sweep_env("131"))),
            Err(ConfigError::Invalid { key: "RELAY_ORPHAN_MAX_AGE_SECS", .. })
        ));
        assert!(matches!(
            RelayConfig::from_lookup(lookup(&sweep_env("190"))),
            Err(ConfigError::Invalid { key: "RELAY_ORPHAN_MAX_AGE_SECS", .. })
        ));
        let cfg = RelayConfig::from_lookup(lookup(&sweep_env("191"))).unwrap();
        assert_eq!(cfg.sweep.unwrap().max_age, Duration::from_secs(191));
    }

    #[test]
    fn rejects_unparseable_and_inconsistent_values() {
        let mut env = AZURE_ENV.to_vec();
        env.push(("CONTAINER_PORT", "eighty"));
        assert!(matches!(
            RelayConfig::from_lookup(lookup(&env)),
            Err(ConfigError::Invalid { key: "CONTAINER_PORT", .. })
        ));

        let mut env = AZURE_ENV.to_vec();
        env.extend([("RELAY_POLL_INITIAL_MS", "5000"), ("RELAY_POLL_MAX_MS", "1000")]);
        assert!(matches!(
            RelayConfig::from_lookup(lookup(&env)),
            Err(ConfigError::Invalid { key: "RELAY_POLL_MAX_MS", .. })
        ));

        let mut env = AZURE_ENV.to_vec();
        env.extend([("RELAY_SWEEP_INTERVAL_SECS", "60"), ("RELAY_ORPHAN_MAX_AGE_SECS", "100")]);
        assert!(matches!(
            RelayConfig::from_lookup(lookup(&env)),
            Err(ConfigError::Invalid { key: "RELAY_ORPHAN_MAX_AGE_SECS", .. })
        ));

        let env = [("RELAY_PROVIDER", "gcp")];
        assert!(matches!(
            RelayConfig::from_lookup(lookup(&env)),
            Err(ConfigError::Invalid { key: "RELAY_PROVIDER", .. })
        ));
    }
}
