//! Second pipeline stage: one approximate route per trip.

use chrono::NaiveDateTime;
use geo::Coord;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::network::StreetGraph;
use crate::stations::StationMap;
use crate::trips::TripRecord;

/// Length of the station code at the start of a textual station field.
pub const STATION_CODE_LEN: usize = 3;

/// Why a route has (or lacks) geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOutcome {
    Routed,
    /// an endpoint field was blank
    MissingStation,
    /// a derived code is not in the station listing
    UnknownStation,
    /// both stations snap to the same graph node
    SameNode,
    /// the graph has no path between the two nodes
    NoPath,
}

/// The path one bike is assumed to have ridden.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BikeRoute {
    pub id: Uuid,
    pub departure_time: NaiveDateTime,
    pub return_time: NaiveDateTime,
    /// (x = longitude, y = latitude), departure to arrival
    pub route: Vec<Coord<f64>>,
    pub outcome: RouteOutcome,
}

impl BikeRoute {
    fn empty(trip: &TripRecord, outcome: RouteOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            departure_time: trip.departure,
            return_time: trip.return_time,
            route: Vec::new(),
            outcome,
        }
    }
}

/// Reduces a raw station field to the code used by the listing.
///
/// Blank and `NaN` fields have no code. Numeric fields are taken as they
/// are; any other text keeps its first [`STATION_CODE_LEN`] characters, so
/// `"001 Rue Jules Ferry"` becomes `"001"`.
pub fn normalize_station_code(raw: Option<&str>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_nan() => None,
        Ok(value) if value.is_finite() => Some(raw.to_string()),
        _ => Some(raw.chars().take(STATION_CODE_LEN).collect()),
    }
}

/// Maps every trip onto `graph`, keeping input order.
///
/// A trip that cannot be routed yields an empty route tagged with the
/// reason; the batch never fails.
#[tracing::instrument(skip_all, fields(trips = trips.len(), stations = stations.len()))]
pub fn reconstruct_routes(
    stations: &StationMap,
    trips: &[TripRecord],
    graph: &StreetGraph,
) -> Vec<BikeRoute> {
    let routes: Vec<BikeRoute> = trips
        .iter()
        .map(|trip| reconstruct_route(stations, trip, graph))
        .collect();

    let routed = routes
        .iter()
        .filter(|r| r.outcome == RouteOutcome::Routed)
        .count();
    info!(total = routes.len(), routed, "Routes reconstructed");
    routes
}

/// Routes a single trip. See [`reconstruct_routes`].
pub fn reconstruct_route(stations: &StationMap, trip: &TripRecord, graph: &StreetGraph) -> BikeRoute {
    let departure = normalize_station_code(trip.departure_station.as_deref());
    let arrival = normalize_station_code(trip.return_station.as_deref());
    let (Some(departure), Some(arrival)) = (departure, arrival) else {
        return BikeRoute::empty(trip, RouteOutcome::MissingStation);
    };

    let (Some(origin), Some(destination)) = (stations.get(&departure), stations.get(&arrival))
    else {
        debug!(%departure, %arrival, "Station code not in listing");
        return BikeRoute::empty(trip, RouteOutcome::UnknownStation);
    };

    let (Some(origin_node), Some(destination_node)) =
        (graph.nearest_node(origin), graph.nearest_node(destination))
    else {
        return BikeRoute::empty(trip, RouteOutcome::NoPath);
    };
    if origin_node == destination_node {
        return BikeRoute::empty(trip, RouteOutcome::SameNode);
    }

    match graph.shortest_path(origin_node, destination_node) {
        Some(path) => BikeRoute {
            route: graph.path_coords(&path),
            ..BikeRoute::empty(trip, RouteOutcome::Routed)
        },
        None => {
            debug!(%departure, %arrival, "Stations are not connected");
            BikeRoute::empty(trip, RouteOutcome::NoPath)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::fixtures::{line_graph, node, two_way};
    use crate::network::{NetworkEdge, StreetGraph};
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn trip(from: Option<&str>, to: Option<&str>) -> TripRecord {
        TripRecord {
            departure_station: from.map(String::from),
            return_station: to.map(String::from),
            departure: at(8, 0),
            return_time: at(8, 20),
        }
    }

    fn stations() -> StationMap {
        let mut map = StationMap::new();
        map.insert("001", 3.88, 43.61);
        map.insert("002", 3.90, 43.62);
        map.insert("003", 3.8801, 43.6101);
        map
    }

    #[test]
    fn test_normalize_station_code() {
        assert_eq!(normalize_station_code(Some("001 Rue Jules Ferry")), Some("001".into()));
        assert_eq!(normalize_station_code(Some("Comédie")), Some("Com".into()));
        assert_eq!(normalize_station_code(Some("57")), Some("57".into()));
        assert_eq!(normalize_station_code(Some("1234")), Some("1234".into()));
        assert_eq!(normalize_station_code(Some("  ")), None);
        assert_eq!(normalize_station_code(Some("NaN")), None);
        assert_eq!(normalize_station_code(None), None);
    }

    #[test]
    fn test_routed_trip_follows_graph() {
        let graph = line_graph();
        let route = reconstruct_route(&stations(), &trip(Some("001 Gare"), Some("002 Corum")), &graph);
        assert_eq!(route.outcome, RouteOutcome::Routed);
        assert_eq!(route.route.len(), 5);
        assert_eq!(route.route.first(), Some(&Coord { x: 3.88, y: 43.61 }));
        assert_eq!(route.route.last(), Some(&Coord { x: 3.90, y: 43.62 }));
        assert_eq!(route.departure_time, at(8, 0));
        assert_eq!(route.return_time, at(8, 20));
    }

    #[test]
    fn test_unknown_numeric_code_gives_empty_route() {
        let graph = line_graph();
        let route = reconstruct_route(&stations(), &trip(Some("999"), Some("002")), &graph);
        assert_eq!(route.outcome, RouteOutcome::UnknownStation);
        assert!(route.route.is_empty());
        assert_eq!(route.departure_time, at(8, 0));
        assert_eq!(route.return_time, at(8, 20));
    }

    #[test]
    fn test_missing_station_gives_empty_route() {
        let graph = line_graph();
        let route = reconstruct_route(&stations(), &trip(None, Some("002")), &graph);
        assert_eq!(route.outcome, RouteOutcome::MissingStation);
        assert!(route.route.is_empty());
    }

    #[test]
    fn test_same_node_gives_empty_route() {
        let graph = line_graph();
        // 001 and 003 both snap to the first node
        let route = reconstruct_route(&stations(), &trip(Some("001"), Some("003")), &graph);
        assert_eq!(route.outcome, RouteOutcome::SameNode);
        assert!(route.route.is_empty());
    }

    #[test]
    fn test_disconnected_pair_gives_empty_route() {
        let a = node(1, 3.88, 43.61);
        let b = node(2, 3.90, 43.62);
        let graph = StreetGraph::new(vec![a, b], vec![NetworkEdge::between(&b, &a)]).unwrap();
        let route = reconstruct_route(&stations(), &trip(Some("001"), Some("002")), &graph);
        assert_eq!(route.outcome, RouteOutcome::NoPath);
        assert!(route.route.is_empty());
    }

    #[test]
    fn test_batch_keeps_order_and_fresh_ids() {
        let nodes = vec![node(0, 3.88, 43.61), node(1, 3.89, 43.615), node(2, 3.90, 43.62)];
        let graph = StreetGraph::new(nodes.clone(), two_way(&nodes)).unwrap();
        let trips = vec![
            trip(Some("001"), Some("002")),
            trip(Some("abc"), Some("002")),
            trip(Some("002"), Some("001")),
        ];
        let routes = reconstruct_routes(&stations(), &trips, &graph);
        let outcomes: Vec<_> = routes.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![RouteOutcome::Routed, RouteOutcome::UnknownStation, RouteOutcome::Routed]
        );
        assert_eq!(routes[2].route.first(), Some(&Coord { x: 3.90, y: 43.62 }));
        let ids: HashSet<_> = routes.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 3);
    }
}
