//! Shared HTTP plumbing for provider adapters.

use reqwest::{Client, StatusCode};
use std::time::Duration;

use researchhub_common::{Error, Result};

const USER_AGENT: &str = "ResearchHub/0.1";

/// Build an HTTP client whose every request is bounded by `timeout`.
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::ProviderUnavailable(format!("Failed to create HTTP client: {}", e)))
}

/// Map a transport failure to the error taxonomy.
pub(crate) fn transport_error(context: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(format!("{}: {}", context, err))
    } else {
        Error::ProviderUnavailable(format!("{}: {}", context, err))
    }
}

/// Map a non-success HTTP status to the error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: &str) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(format!("Resource not found: {}", body)),
        StatusCode::UNAUTHORIZED => {
            Error::Authentication("Invalid or expired token".to_string())
        }
        StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST | StatusCode::CONFLICT => {
            Error::ProviderRejected(format!("{} - {}", status, body))
        }
        s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
            Error::ProviderUnavailable(format!("{} - {}", status, body))
        }
        _ => Error::ProviderRejected(format!("Unexpected status: {} - {}", status, body)),
    }
}

/// Decode a successful JSON response or classify the failure.
pub(crate) async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("Failed to parse response: {}", e)))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}
