//! HTTP fetching behind the [`HttpClient`] seam.
//!
//! Every helper is fail-fast: a non-success status or an unreadable body is
//! returned as a [`FetchError`] and never retried.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::{FetchError, HttpClient};

use reqwest::{Method, Request, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Parses `url` and appends `params` as query pairs.
pub fn build_url(url: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
    let mut parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !params.is_empty() {
        let mut pairs = parsed.query_pairs_mut();
        for (name, value) in params {
            pairs.append_pair(name, value);
        }
    }
    Ok(parsed)
}

/// Issues a GET and returns the body of a successful response.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: Url) -> Result<Vec<u8>, FetchError> {
    let req = Request::new(Method::GET, url);
    let resp = client.execute(req).await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FetchError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = resp.bytes().await?.to_vec();
    debug!(bytes = bytes.len(), "Response body received");
    Ok(bytes)
}

/// Issues a GET and decodes the JSON body into `T`.
pub async fn fetch_json<C: HttpClient, T: DeserializeOwned>(
    client: &C,
    url: Url,
) -> Result<T, FetchError> {
    let bytes = fetch_bytes(client, url).await?;
    serde_json::from_slice(&bytes).map_err(|e| FetchError::Payload(e.to_string()))
}
