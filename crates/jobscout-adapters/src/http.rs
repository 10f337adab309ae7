//! Shared HTTP plumbing for adapters: one client, one error mapping.

use bytes::Bytes;
use jobscout_core::{Error, Result};

/// Build the client adapters share. Career sites occasionally block
/// default library user agents.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("jobscout/0.1")
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

/// GET a URL and return the raw body, mapping transport failures and
/// HTTP statuses onto the pipeline error taxonomy: 429 is
/// `RateLimited`, other non-success is `Unavailable`.
pub async fn get_bytes(client: &reqwest::Client, url: &str) -> Result<Bytes> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Unavailable(format!("GET {url}: {e}")))?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(Error::RateLimited);
    }
    if !status.is_success() {
        return Err(Error::Unavailable(format!("GET {url}: HTTP {status}")));
    }

    response
        .bytes()
        .await
        .map_err(|e| Error::Unavailable(format!("GET {url}: body read: {e}")))
}

/// GET a URL and decode a JSON body, mapping decode failures to
/// `Format` (the transport succeeded; the shape is wrong).
pub async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T> {
    let body = get_bytes(client, url).await?;
    serde_json::from_slice(&body).map_err(|e| Error::Format(format!("GET {url}: {e}")))
}
