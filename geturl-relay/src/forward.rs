use crate::error::ForwardError;
use axum::body::Bytes;
use reqwest::Client;
use serde_json::Value;
use std::net::IpAddr;
use std::time::Duration;

/// URL of the resource name endpoint on a provisioned instance.
pub fn instance_endpoint(ip: &str, port: u16) -> String {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => format!("http://[{}]:{}/get_url", v6, port),
        _ => format!("http://{}:{}/get_url", ip, port),
    }
}

/// POST the original request body to the instance and return its response
/// body untouched. Any non-2xx answer is a failure.
pub async fn forward(
    client: &Client,
    url: &str,
    body: &Value,
    timeout: Duration,
) -> Result<Bytes, ForwardError> {
    tracing::info!("➡️ [forward] POST {}", url);
    let response = client
        .post(url)
        .json(body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ForwardError::Transport(e.to_string()))?;

    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ForwardError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(ForwardError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        instance_endpoint(&addr.ip().to_string(), addr.port())
    }

    #[test]
    fn endpoint_from_private_ip() {
        assert_eq!(instance_endpoint("10.0.0.5", 8080), "http://10.0.0.5:8080/get_url");
        assert_eq!(instance_endpoint("fd00::5", 8080), "http://[fd00::5]:8080/get_url");
    }

    #[tokio::test]
    async fn returns_body_verbatim() {
        let url = serve(Router::new().route(
            "/get_url",
            post(|Json(v): Json<Value>| async move { Json(json!({ "echo": v })) }),
        ))
        .await;

        let body = forward(
            &Client::new(),
            &url,
            &json!({"name": "a", "id": "b"}),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v, json!({"echo": {"name": "a", "id": "b"}}));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let url = serve(Router::new().route(
            "/get_url",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        ))
        .await;

        let err = forward(&Client::new(), &url, &json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ForwardError::Status {
                status: 500,
                body: "boom".into()
            }
        );
    }

    #[tokio::test]
    async fn unreachable_instance_is_a_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = forward(
            &Client::new(),
            &instance_endpoint("127.0.0.1", port),
            &json!({}),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ForwardError::Transport(_)));
    }
}
