use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default template base for generated resource URLs.
pub const DEFAULT_URL_BASE: &str = "https://cdn.example.com/resources";

/// Tag value put on every container group the relay creates.
pub const MANAGED_BY: &str = "geturl-relay";

// --- Enums ---

/// Lifecycle state of a provisioned instance, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Stopped,
    Terminated,
    Other(String),
}

impl InstanceState {
    /// Parse a provider state string. A missing state means the instance view
    /// is not populated yet, which we treat as pending.
    pub fn from_provider(state: Option<&str>) -> Self {
        let Some(raw) = state.map(str::trim).filter(|s| !s.is_empty()) else {
            return InstanceState::Pending;
        };
        match raw.to_ascii_lowercase().as_str() {
            "pending" | "creating" | "waiting" => InstanceState::Pending,
            "running" => InstanceState::Running,
            "succeeded" => InstanceState::Succeeded,
            "failed" => InstanceState::Failed,
            "stopped" => InstanceState::Stopped,
            "terminated" => InstanceState::Terminated,
            _ => InstanceState::Other(raw.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, InstanceState::Running)
    }

    /// The container will never reach Running from here (restart policy is Never).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstanceState::Succeeded
                | InstanceState::Failed
                | InstanceState::Stopped
                | InstanceState::Terminated
        )
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Pending => f.write_str("Pending"),
            InstanceState::Running => f.write_str("Running"),
            InstanceState::Succeeded => f.write_str("Succeeded"),
            InstanceState::Failed => f.write_str("Failed"),
            InstanceState::Stopped => f.write_str("Stopped"),
            InstanceState::Terminated => f.write_str("Terminated"),
            InstanceState::Other(s) => f.write_str(s),
        }
    }
}

// --- Errors ---

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("Missing \"{0}\" in request body")]
    Missing(&'static str),
    #[error("Field \"{0}\" must be a string")]
    NotAString(&'static str),
    #[error("Request body must be a JSON object")]
    NotAnObject,
}

// --- DTOs ---

/// Body of `POST /get_url` on the resource name service.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NameRequest {
    pub name: String,
}

/// Body accepted by the provisioning relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RelayRequest {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UrlResponse {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

fn as_object(body: &Value) -> Result<&serde_json::Map<String, Value>, FieldError> {
    body.as_object().ok_or(FieldError::NotAnObject)
}

impl NameRequest {
    /// Any string is accepted, including the empty string.
    pub fn from_value(body: &Value) -> Result<Self, FieldError> {
        let obj = as_object(body)?;
        match obj.get("name") {
            None => Err(FieldError::Missing("name")),
            Some(Value::String(name)) => Ok(Self { name: name.clone() }),
            Some(_) => Err(FieldError::NotAString("name")),
        }
    }
}

impl RelayRequest {
    /// Both fields must be present, non-empty strings.
    pub fn from_value(body: &Value) -> Result<Self, FieldError> {
        let obj = as_object(body)?;
        let name = required_str(obj, "name")?;
        let id = required_str(obj, "id")?;
        Ok(Self { name, id })
    }

    /// Compact JSON handed to the container through its environment.
    pub fn to_payload(&self) -> String {
        serde_json::json!({ "name": self.name, "id": self.id }).to_string()
    }
}

fn required_str(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<String, FieldError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(FieldError::Missing(field)),
        Some(Value::String(s)) if s.is_empty() => Err(FieldError::Missing(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(FieldError::NotAString(field)),
    }
}

/// Build the public URL for a resource. The name is interpolated as-is.
pub fn resource_url(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}
