//! Shared HTTP plumbing for the concrete adapters.
//!
//! Maps transport and status failures onto the error taxonomy: network
//! errors, 429, and 5xx are transient (retryable); other 4xx are client
//! errors; an undecodable body is a parse error.

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;

use super::provider::SourceError;
use super::{HTTP_TIMEOUT, USER_AGENT};

/// Build the blocking HTTP client every adapter uses.
pub(crate) fn build_client() -> Result<Client, SourceError> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SourceError::Config(format!("failed to build HTTP client: {e}")))
}

/// GET `url` with `query` and decode the JSON body into `T`.
pub(crate) fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, SourceError> {
    tracing::debug!(url, "provider request");

    let resp = client
        .get(url)
        .query(query)
        .send()
        .map_err(|e| SourceError::Transient(format!("network error: {e}")))?;

    let status = resp.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(SourceError::Transient("rate limited (HTTP 429)".into()));
    }
    if status.is_server_error() {
        return Err(SourceError::Transient(format!("server error (HTTP {status})")));
    }
    if !status.is_success() {
        return Err(SourceError::Client {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        });
    }

    resp.json::<T>()
        .map_err(|e| SourceError::Parse(format!("undecodable response body: {e}")))
}
