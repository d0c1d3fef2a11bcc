use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;

const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Refresh this many seconds before the token actually expires.
const EXPIRY_SKEW_SECS: i64 = 300;

#[derive(Clone, Debug, PartialEq)]
pub enum IdentitySource {
    /// App Service / Functions hosting: `IDENTITY_ENDPOINT` + `IDENTITY_HEADER`.
    AppService { endpoint: String, header: String },
    /// VM / container hosting: the instance metadata service.
    Imds { endpoint: String },
}

impl IdentitySource {
    pub fn from_env() -> Self {
        let endpoint = std::env::var("IDENTITY_ENDPOINT").ok().filter(|s| !s.trim().is_empty());
        let header = std::env::var("IDENTITY_HEADER").ok().filter(|s| !s.trim().is_empty());
        match (endpoint, header) {
            (Some(endpoint), Some(header)) => IdentitySource::AppService { endpoint, header },
            _ => IdentitySource::Imds {
                endpoint: IMDS_TOKEN_ENDPOINT.to_string(),
            },
        }
    }
}

struct CachedToken {
    access_token: String,
    expires_on: i64,
}

/// Managed identity token source. No secrets are configured; the hosting
/// platform hands out tokens for the identity assigned to it.
pub struct ManagedIdentityCredential {
    client: Client,
    source: IdentitySource,
    client_id: Option<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl ManagedIdentityCredential {
    pub fn new(client: Client, source: IdentitySource, client_id: Option<String>) -> Self {
        let client_id = client_id
            .as_deref()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        Self {
            client,
            source,
            client_id,
            cached: Mutex::new(None),
        }
    }

    /// Bearer token for `resource`, served from cache while still fresh.
    pub async fn token(&self, resource: &str) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = chrono::Utc::now().timestamp();
        if let Some(tok) = cached.as_ref() {
            if tok.expires_on - EXPIRY_SKEW_SECS > now {
                return Ok(tok.access_token.clone());
            }
        }

        let fresh = self.fetch(resource).await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn fetch(&self, resource: &str) -> Result<CachedToken> {
        let mut query: Vec<(&str, &str)> = vec![("resource", resource)];
        let request = match &self.source {
            IdentitySource::AppService { endpoint, header } => {
                query.push(("api-version", "2019-08-01"));
                if let Some(cid) = self.client_id.as_deref() {
                    query.push(("client_id", cid));
                }
                self.client
                    .get(endpoint)
                    .query(&query)
                    .header("X-IDENTITY-HEADER", header)
            }
            IdentitySource::Imds { endpoint } => {
                query.push(("api-version", "2018-02-01"));
                if let Some(cid) = self.client_id.as_deref() {
                    query.push(("client_id", cid));
                }
                self.client
                    .get(endpoint)
                    .query(&query)
                    .header("Metadata", "true")
            }
        };

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::error!(
                "❌ [identity] token request failed: status={} body={}",
                status.as_u16(),
                text
            );
            return Err(anyhow!(
                "managed identity token request failed: status={} body={}",
                status.as_u16(),
                text
            ));
        }

        let json: Value = resp.json().await?;
        parse_token_response(&json)
    }
}

fn parse_token_response(json: &Value) -> Result<CachedToken> {
    let access_token = json["access_token"]
        .as_str()
        .ok_or_else(|| anyhow!("No access_token in identity response"))?
        .to_string();
    // Both endpoints send expires_on as a string of epoch seconds; accept numbers too.
    let expires_on = match &json["expires_on"] {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
    .ok_or_else(|| anyhow!("No usable expires_on in identity response"))?;
    Ok(CachedToken {
        access_token,
        expires_on,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_and_numeric_expiry() {
        let t = parse_token_response(&json!({"access_token": "abc", "expires_on": "1700000000"}))
            .unwrap();
        assert_eq!(t.access_token, "abc");
        assert_eq!(t.expires_on, 1_700_000_000);

        let t = parse_token_response(&json!({"access_token": "abc", "expires_on": 42})).unwrap();
        assert_eq!(t.expires_on, 42);
    }

    #[test]
    fn rejects_incomplete_response() {
        assert!(parse_token_response(&json!({"expires_on": "1"})).is_err());
        assert!(parse_token_response(&json!({"access_token": "abc"})).is_err());
    }
}
