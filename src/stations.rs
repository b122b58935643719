//! Bike-share dock locations keyed by their short code.

use geo::Point;
use serde::Serialize;
use std::collections::BTreeMap;

/// A dock identified by its short code (e.g. `"001"`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub code: String,
    /// x = longitude, y = latitude
    pub location: Point<f64>,
}

/// Immutable code→coordinate lookup populated once per run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationMap {
    stations: BTreeMap<String, Point<f64>>,
}

impl StationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the location of `code`. The last occurrence wins.
    pub fn insert(&mut self, code: impl Into<String>, lon: f64, lat: f64) {
        self.stations.insert(code.into(), Point::new(lon, lat));
    }

    pub fn get(&self, code: &str) -> Option<Point<f64>> {
        self.stations.get(code).copied()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.stations.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Station> + '_ {
        self.stations.iter().map(|(code, location)| Station {
            code: code.clone(),
            location: *location,
        })
    }
}

impl FromIterator<Station> for StationMap {
    fn from_iter<I: IntoIterator<Item = Station>>(iter: I) -> Self {
        let mut map = StationMap::new();
        for station in iter {
            map.stations.insert(station.code, station.location);
        }
        map
    }
}
