//! Trait for station-location providers.

use crate::fetch::FetchError;
use crate::stations::StationMap;

/// Abstraction over a bike-share station listing (e.g. Montpellier 3M).
#[async_trait::async_trait]
pub trait StationApi: Send + Sync {
    /// Returns every currently published station with its coordinates.
    async fn list_stations(&self) -> Result<StationMap, FetchError>;
}
