use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::fetch::{FetchError, HttpClient, build_url, fetch_bytes, fetch_json};
use crate::network::osm::{OverpassResponse, bike_ways_query, build_street_graph};
use crate::network::{GraphProvider, NetworkError, StreetGraph};

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Overpass derives area ids from OSM ids with these offsets.
const RELATION_AREA_OFFSET: i64 = 3_600_000_000;
const WAY_AREA_OFFSET: i64 = 2_400_000_000;

#[derive(Deserialize)]
struct GeocodeHit {
    osm_type: String,
    osm_id: i64,
}

/// Builds the bike network of a place the way `osmnx.graph_from_place`
/// does: geocode with Nominatim, then download the area's ways from Overpass.
pub struct OverpassGraphProvider<C> {
    http: C,
    nominatim_url: String,
    overpass_url: String,
    timeout_secs: u64,
}

impl<C: HttpClient> OverpassGraphProvider<C> {
    pub fn new(http: C) -> Self {
        Self::with_urls(http, DEFAULT_NOMINATIM_URL, DEFAULT_OVERPASS_URL)
    }

    pub fn with_urls(
        http: C,
        nominatim_url: impl Into<String>,
        overpass_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            nominatim_url: nominatim_url.into(),
            overpass_url: overpass_url.into(),
            timeout_secs: 180,
        }
    }

    /// Overpass area id of the first polygonal geocoding hit for `place`.
    #[tracing::instrument(skip(self))]
    pub async fn geocode_area(&self, place: &str) -> Result<i64, NetworkError> {
        let url = build_url(
            &self.nominatim_url,
            &[("q", place), ("format", "json"), ("limit", "5")],
        )?;
        let hits: Vec<GeocodeHit> = fetch_json(&self.http, url).await?;

        hits.iter()
            .find_map(|hit| match hit.osm_type.as_str() {
                "relation" => Some(RELATION_AREA_OFFSET + hit.osm_id),
                "way" => Some(WAY_AREA_OFFSET + hit.osm_id),
                _ => None,
            })
            .ok_or_else(|| NetworkError::PlaceNotFound(place.to_string()))
    }
}

#[async_trait]
impl<C: HttpClient> GraphProvider for OverpassGraphProvider<C> {
    #[tracing::instrument(skip(self))]
    async fn graph(&self, place: &str) -> Result<Arc<StreetGraph>, NetworkError> {
        let area_id = self.geocode_area(place).await?;
        debug!(area_id, "Place geocoded");

        let query = bike_ways_query(area_id, self.timeout_secs);
        let url = build_url(&self.overpass_url, &[("data", query.as_str())])?;
        let bytes = fetch_bytes(&self.http, url).await?;
        let response: OverpassResponse = serde_json::from_slice(&bytes)
            .map_err(|e| NetworkError::Fetch(FetchError::Payload(e.to_string())))?;

        let graph = build_street_graph(response)?;
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Street graph built"
        );
        Ok(Arc::new(graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubClient;

    #[tokio::test]
    async fn test_geocode_prefers_polygonal_hits() {
        let body = r#"[
            {"osm_type": "node", "osm_id": 1},
            {"osm_type": "relation", "osm_id": 28722}
        ]"#;
        let provider = OverpassGraphProvider::new(StubClient::new(200, body));
        let area = provider.geocode_area("Montpellier, France").await.unwrap();
        assert_eq!(area, 3_600_028_722);
    }

    #[tokio::test]
    async fn test_geocode_without_area_is_place_not_found() {
        let provider = OverpassGraphProvider::new(StubClient::new(200, "[]"));
        let err = provider.geocode_area("Nowhere").await.unwrap_err();
        assert!(matches!(err, NetworkError::PlaceNotFound(p) if p == "Nowhere"));
    }

    #[tokio::test]
    async fn test_graph_propagates_http_status() {
        let provider = OverpassGraphProvider::new(StubClient::new(429, "slow down"));
        let err = provider.graph("Montpellier, France").await.unwrap_err();
        assert!(matches!(
            err,
            NetworkError::Fetch(FetchError::Status { status: 429, .. })
        ));
    }
}
