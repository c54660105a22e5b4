//! HTTP plumbing shared by the REST-based adapters

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use crate::error::PlatformError;

/// Per-request timeout for platform API calls
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the client every adapter uses
pub fn build_client() -> Client {
    build_client_with_timeout(REQUEST_TIMEOUT)
}

/// Client for adapters whose calls outlast [`REQUEST_TIMEOUT`], like video uploads
pub fn build_client_with_timeout(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("fanout/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        })
}

/// Map a transport-level reqwest error to a platform error
pub fn map_transport_error(platform: &str, context: &str, error: reqwest::Error) -> PlatformError {
    if error.is_timeout() {
        return PlatformError::Network(format!(
            "{} request timed out during {}",
            platform, context
        ));
    }
    if error.is_connect() {
        return PlatformError::Network(format!(
            "Could not connect to {} during {}: {}",
            platform, context, error
        ));
    }
    PlatformError::Network(format!("{} {} failed: {}", platform, context, error))
}

/// Classify a non-success HTTP status, keeping the body for diagnosis
pub fn map_status_error(
    platform: &str,
    context: &str,
    status: StatusCode,
    body: &str,
) -> PlatformError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Authentication(
            format!("{} rejected the token during {} ({})", platform, context, detail),
        ),
        StatusCode::TOO_MANY_REQUESTS => PlatformError::RateLimit(format!(
            "{} rate limit hit during {} ({})",
            platform, context, detail
        )),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => PlatformError::Validation(
            format!("{} rejected the request during {} ({})", platform, context, detail),
        ),
        _ => PlatformError::Posting(format!("{} {} failed ({})", platform, context, detail)),
    }
}

/// Read a JSON body, returning a `Posting` error on malformed payloads
pub async fn read_json(
    platform: &str,
    context: &str,
    response: Response,
) -> Result<Value, PlatformError> {
    response.json::<Value>().await.map_err(|e| {
        PlatformError::Posting(format!(
            "{} returned an unreadable response during {}: {}",
            platform, context, e
        ))
    })
}

/// Pull a non-empty string `id` field out of a JSON object
pub fn extract_id(body: &Value) -> Option<String> {
    match body.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a counter that may be encoded as a number or a numeric string
pub fn read_counter(body: &Value, field: &str) -> u64 {
    match body.get(field) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}
