use super::client::{FetchError, HttpClient};
use async_trait::async_trait;
use std::time::Duration;

/// Plain `reqwest` client with the timeouts and user agent the public
/// endpoints expect.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
