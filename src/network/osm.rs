//! Building a [`StreetGraph`] from Overpass `out:json` elements.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::NetworkError;
use super::graph::{NetworkEdge, NetworkNode, StreetGraph};

/// osmnx's `bike` network filter plus its default access clause.
pub const BIKE_WAY_FILTER: &str = concat!(
    r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
    r#"["highway"!~"abandoned|bus_guideway|construction|corridor|elevator|escalator|footway|motor|no|planned|platform|proposed|raceway|razed|steps"]"#,
    r#"["bicycle"!~"no"]["service"!~"private"]"#,
);

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OsmElement>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OsmElement {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    #[serde(other)]
    Other,
}

/// Travel directions allowed on a way, relative to its node order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WayDirection {
    Both,
    Forward,
    Backward,
}

impl WayDirection {
    pub fn from_tags(tags: &HashMap<String, String>) -> Self {
        match tags.get("oneway").map(String::as_str) {
            Some("yes" | "true" | "1" | "F") => WayDirection::Forward,
            Some("-1" | "reverse" | "T") => WayDirection::Backward,
            _ if tags.get("junction").map(String::as_str) == Some("roundabout") => {
                WayDirection::Forward
            }
            _ => WayDirection::Both,
        }
    }
}

/// Overpass QL selecting bike-navigable ways inside an area, with their nodes.
pub fn bike_ways_query(area_id: i64, timeout_secs: u64) -> String {
    format!(
        "[out:json][timeout:{timeout_secs}];area({area_id})->.searchArea;\
         (way{BIKE_WAY_FILTER}(area.searchArea););(._;>;);out body;"
    )
}

/// Turns ways into directed edges and keeps the largest weakly connected
/// component. Only nodes referenced by a way become graph nodes.
pub fn build_street_graph(response: OverpassResponse) -> Result<StreetGraph, NetworkError> {
    let mut positions: HashMap<i64, NetworkNode> = HashMap::new();
    let mut ways = Vec::new();

    for element in response.elements {
        match element {
            OsmElement::Node { id, lat, lon } => {
                positions.insert(id, NetworkNode { osm_id: id, x: lon, y: lat });
            }
            OsmElement::Way { nodes, tags, .. } => ways.push((nodes, WayDirection::from_tags(&tags))),
            OsmElement::Other => {}
        }
    }

    let mut used: HashMap<i64, NetworkNode> = HashMap::new();
    let mut edges = Vec::new();
    let mut skipped = 0usize;

    for (nodes, direction) in ways {
        for pair in nodes.windows(2) {
            let (Some(a), Some(b)) = (positions.get(&pair[0]), positions.get(&pair[1])) else {
                skipped += 1;
                continue;
            };
            if a.osm_id == b.osm_id {
                continue;
            }
            used.insert(a.osm_id, *a);
            used.insert(b.osm_id, *b);
            match direction {
                WayDirection::Forward => edges.push(NetworkEdge::between(a, b)),
                WayDirection::Backward => edges.push(NetworkEdge::between(b, a)),
                WayDirection::Both => {
                    edges.push(NetworkEdge::between(a, b));
                    edges.push(NetworkEdge::between(b, a));
                }
            }
        }
    }

    let mut nodes: Vec<NetworkNode> = used.into_values().collect();
    nodes.sort_by_key(|n| n.osm_id);
    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        skipped,
        "Overpass elements converted"
    );

    Ok(StreetGraph::new(nodes, edges)?.largest_component())
}
