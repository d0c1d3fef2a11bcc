use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use geturl_common::{ErrorBody, FieldError, InstanceState};
use std::time::Duration;

/// Why an instance never became reachable.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WaitError {
    #[error("instance did not reach Running within {0:?}")]
    TimedOut(Duration),
    #[error("instance reached terminal state {0}")]
    Terminal(InstanceState),
    #[error("provisioning ended in state {0}")]
    ProvisioningFailed(String),
    #[error("instance is Running but has no private address")]
    NoPrivateAddress,
    #[error("wait cancelled by shutdown")]
    Cancelled,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ForwardError {
    #[error("instance answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("instance unreachable: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    MissingField(#[from] FieldError),
    #[error("Request body must be valid JSON: {0}")]
    MalformedBody(String),
    #[error("Failed to create container instance: {0}")]
    ProvisioningFailed(String),
    #[error("ACI did not start properly: {0}")]
    ProvisioningTimeout(#[from] WaitError),
    #[error("Failed to reach ACI: {0}")]
    ForwardingFailure(#[from] ForwardError),
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingField(_) | RelayError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            RelayError::ForwardingFailure(_) => StatusCode::BAD_GATEWAY,
            RelayError::ProvisioningFailed(_)
            | RelayError::ProvisioningTimeout(_)
            | RelayError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("❌ [relay] {} ({})", self, status.as_u16());
        }
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}
