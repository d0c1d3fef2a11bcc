use geturl_common::DEFAULT_URL_BASE;
use std::net::SocketAddr;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub port: u16,
    pub url_base: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            url_base: DEFAULT_URL_BASE.to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("GETURL_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| {
                anyhow::anyhow!("GETURL_PORT must be a port number, got {:?}: {}", raw, e)
            })?,
            None => DEFAULT_PORT,
        };
        let url_base = get("GETURL_URL_BASE")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_URL_BASE.to_string());

        Ok(Self { port, url_base })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
