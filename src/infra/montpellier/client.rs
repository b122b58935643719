use async_trait::async_trait;
use tracing::{debug, info};

use crate::fetch::{FetchError, HttpClient, build_url, fetch_bytes};
use crate::parser::parse_stations;
use crate::services::StationApi;
use crate::stations::StationMap;

pub const DEFAULT_STATION_URL: &str =
    "https://portail-api-data.montpellier3m.fr/bikestation?limit=1000";

/// Station listing from the Montpellier Méditerranée Métropole open-data portal.
pub struct Montpellier3mClient<C> {
    http: C,
    url: String,
}

impl<C: HttpClient> Montpellier3mClient<C> {
    pub fn new(http: C) -> Self {
        Self::with_url(http, DEFAULT_STATION_URL)
    }

    pub fn with_url(http: C, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> StationApi for Montpellier3mClient<C> {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn list_stations(&self) -> Result<StationMap, FetchError> {
        let url = build_url(&self.url, &[])?;
        debug!("Requesting station listing");
        let bytes = fetch_bytes(&self.http, url).await?;
        let stations = parse_stations(&bytes)?;
        info!(count = stations.len(), "Station listing fetched");
        Ok(stations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubClient;

    #[tokio::test]
    async fn test_list_stations_parses_payload() {
        let body = r#"[{"id": "urn:ngsi-ld:station:001",
                        "location": {"value": {"coordinates": [3.88, 43.61]}}}]"#;
        let client = Montpellier3mClient::new(StubClient::new(200, body));
        let stations = client.list_stations().await.unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(
            client.http.seen.lock().unwrap().as_slice(),
            &[DEFAULT_STATION_URL.to_string()]
        );
    }

    #[tokio::test]
    async fn test_list_stations_non_success_is_status_error() {
        let client = Montpellier3mClient::with_url(
            StubClient::new(500, "oops"),
            "https://example.org/bikestation",
        );
        let err = client.list_stations().await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
    }
}
