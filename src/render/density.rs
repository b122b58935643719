//! Segment-frequency map rendered as a Leaflet page.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use super::{LatLon, RenderError, escape_script};
use crate::routes::BikeRoute;

/// Montpellier city center.
pub const DEFAULT_CENTER: LatLon = [43.6119, 3.8772];
pub const DEFAULT_ZOOM: u8 = 15;
pub const SEGMENT_WEIGHT: f64 = 5.0;
pub const SEGMENT_OPACITY: f64 = 0.7;

/// Band colors, ordered from least to most traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DensityColor {
    Green,
    Yellow,
    Orange,
    Red,
    Black,
}

impl DensityColor {
    /// Bands a tally against the busiest segment's tally.
    ///
    /// | tally vs max  | color  |
    /// |---------------|--------|
    /// | > 90%         | black  |
    /// | > 75%         | red    |
    /// | > 50%         | orange |
    /// | > 25%         | yellow |
    /// | otherwise     | green  |
    pub fn classify(frequency: usize, max_frequency: usize) -> Self {
        let f = frequency as f64;
        let max = max_frequency as f64;
        match f {
            f if f > max * 0.90 => DensityColor::Black,
            f if f > max * 0.75 => DensityColor::Red,
            f if f > max * 0.50 => DensityColor::Orange,
            f if f > max * 0.25 => DensityColor::Yellow,
            _ => DensityColor::Green,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DensityColor::Green => "green",
            DensityColor::Yellow => "yellow",
            DensityColor::Orange => "orange",
            DensityColor::Red => "red",
            DensityColor::Black => "black",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityOptions {
    pub center: LatLon,
    pub zoom: u8,
    /// Count A→B and B→A as the same segment.
    pub merge_reversed: bool,
}

impl Default for DensityOptions {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            merge_reversed: false,
        }
    }
}

/// One drawn polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DensitySegment {
    pub start: LatLon,
    pub end: LatLon,
    pub frequency: usize,
    pub color: DensityColor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DensityMap {
    pub center: LatLon,
    pub zoom: u8,
    pub max_frequency: usize,
    pub segments: Vec<DensitySegment>,
}

type SegmentKey = [u64; 4];

fn key(start: LatLon, end: LatLon) -> SegmentKey {
    [
        start[0].to_bits(),
        start[1].to_bits(),
        end[0].to_bits(),
        end[1].to_bits(),
    ]
}

/// Counts consecutive point pairs over all routes, in first-seen order.
/// Endpoints come out as (lat, lon).
pub fn tally_segments(routes: &[BikeRoute], merge_reversed: bool) -> Vec<(LatLon, LatLon, usize)> {
    let mut index: HashMap<SegmentKey, usize> = HashMap::new();
    let mut tallies: Vec<(LatLon, LatLon, usize)> = Vec::new();

    for route in routes {
        for pair in route.route.windows(2) {
            let mut start = [pair[0].y, pair[0].x];
            let mut end = [pair[1].y, pair[1].x];
            if merge_reversed && end < start {
                std::mem::swap(&mut start, &mut end);
            }

            match index.get(&key(start, end)) {
                Some(&i) => tallies[i].2 += 1,
                None => {
                    index.insert(key(start, end), tallies.len());
                    tallies.push((start, end, 1));
                }
            }
        }
    }

    tallies
}

/// Colors every distinct segment by how often it was ridden.
///
/// # Errors
///
/// [`RenderError::NoSegments`] if no route has two points.
#[tracing::instrument(skip_all, fields(routes = routes.len(), merge_reversed = options.merge_reversed))]
pub fn create_density_map(
    routes: &[BikeRoute],
    options: &DensityOptions,
) -> Result<DensityMap, RenderError> {
    let tallies = tally_segments(routes, options.merge_reversed);
    let max_frequency = tallies
        .iter()
        .map(|(_, _, f)| *f)
        .max()
        .ok_or(RenderError::NoSegments)?;

    let segments: Vec<DensitySegment> = tallies
        .into_iter()
        .map(|(start, end, frequency)| DensitySegment {
            start,
            end,
            frequency,
            color: DensityColor::classify(frequency, max_frequency),
        })
        .collect();

    debug!(max_frequency, "Segment tallies computed");
    info!(segments = segments.len(), "Density map built");

    Ok(DensityMap {
        center: options.center,
        zoom: options.zoom,
        max_frequency,
        segments,
    })
}

const LEAFLET_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Bike traffic density</title>
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map { width: 100%; height: 100%; margin: 0; padding: 0; }</style>
</head>
<body>
<div id="map"></div>
<script>
const map = L.map("map").setView(__CENTER__, __ZOOM__);
L.tileLayer("https://tile.openstreetmap.org/{z}/{x}/{y}.png", {
  maxZoom: 19,
  attribution: "&copy; OpenStreetMap contributors"
}).addTo(map);
const segments = __SEGMENTS__;
for (const s of segments) {
  L.polyline([s.start, s.end], {color: s.color, weight: __WEIGHT__, opacity: __OPACITY__})
    .bindTooltip(String(s.frequency))
    .addTo(map);
}
</script>
</body>
</html>
"#;

impl DensityMap {
    pub fn segments_with(&self, color: DensityColor) -> impl Iterator<Item = &DensitySegment> {
        self.segments.iter().filter(move |s| s.color == color)
    }

    /// Self-contained HTML page drawing the map over OpenStreetMap tiles.
    pub fn to_html(&self) -> String {
        let segments = serde_json::to_string(&self.segments).unwrap_or_else(|_| "[]".to_string());
        LEAFLET_PAGE
            .replace("__CENTER__", &format!("[{}, {}]", self.center[0], self.center[1]))
            .replace("__ZOOM__", &self.zoom.to_string())
            .replace("__WEIGHT__", &SEGMENT_WEIGHT.to_string())
            .replace("__OPACITY__", &SEGMENT_OPACITY.to_string())
            .replace("__SEGMENTS__", &escape_script(segments))
    }
}
