//! Decoder for the Montpellier Méditerranée Métropole `bikestation` payload.

use serde_json::Value;
use tracing::{debug, warn};

use crate::fetch::FetchError;
use crate::stations::StationMap;

/// Decodes the station listing into a [`StationMap`].
///
/// Each entry's code is the part of its `id` after the last `:` and its
/// position is `location.value.coordinates` as `[lon, lat]`.
///
/// # Errors
///
/// Returns [`FetchError::Payload`] if the body is not a JSON array. Entries
/// lacking an id or a coordinate pair are skipped.
pub fn parse_stations(bytes: &[u8]) -> Result<StationMap, FetchError> {
    let json: Value =
        serde_json::from_slice(bytes).map_err(|e| FetchError::Payload(e.to_string()))?;
    let entries = json
        .as_array()
        .ok_or_else(|| FetchError::Payload("expected a JSON array of stations".to_string()))?;

    let mut stations = StationMap::new();
    for entry in entries {
        match parse_entry(entry) {
            Some((code, lon, lat)) => stations.insert(code, lon, lat),
            None => warn!(entry = %entry, "Skipping station without id or coordinates"),
        }
    }

    debug!(count = stations.len(), "Stations decoded");
    Ok(stations)
}

fn parse_entry(entry: &Value) -> Option<(String, f64, f64)> {
    let id = entry["id"].as_str()?;
    let code = id.rsplit(':').next()?.to_string();
    let coordinates = entry["location"]["value"]["coordinates"].as_array()?;
    let lon = coordinates.first()?.as_f64()?;
    let lat = coordinates.get(1)?.as_f64()?;
    Some((code, lon, lat))
}
