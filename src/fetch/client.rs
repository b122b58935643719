use async_trait::async_trait;
use reqwest::{Request, Response};
use thiserror::Error;

/// Transport seam for every outbound HTTP call (station API, geocoder,
/// Overpass). Tests substitute canned responses through this trait.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Why a remote fetch produced no usable data.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed payload: {0}")]
    Payload(String),
}
