use chrono::{NaiveDate, NaiveDateTime};
use geo::Coord;
use velomagg_flow::network::{NetworkEdge, NetworkNode, StreetGraph};
use velomagg_flow::parser::parse_stations;
use velomagg_flow::render::animation::{FRAME_COUNT, create_animation, position_index};
use velomagg_flow::render::density::{DensityOptions, create_density_map};
use velomagg_flow::routes::{RouteOutcome, reconstruct_routes};
use velomagg_flow::stats::RouteStats;
use velomagg_flow::trips::{TripLogOptions, load_trips};

fn analysis_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}

fn at(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Five nodes along one street, ridable both ways.
fn street() -> StreetGraph {
    let nodes = vec![
        NetworkNode { osm_id: 1, x: 3.88, y: 43.61 },
        NetworkNode { osm_id: 2, x: 3.885, y: 43.6125 },
        NetworkNode { osm_id: 3, x: 3.89, y: 43.615 },
        NetworkNode { osm_id: 4, x: 3.895, y: 43.6175 },
        NetworkNode { osm_id: 5, x: 3.90, y: 43.62 },
    ];
    let edges = nodes
        .windows(2)
        .flat_map(|w| [NetworkEdge::between(&w[0], &w[1]), NetworkEdge::between(&w[1], &w[0])])
        .collect();
    StreetGraph::new(nodes, edges).unwrap()
}

#[test]
fn test_full_pipeline() {
    let stations = parse_stations(include_bytes!("fixtures/stations.json")).unwrap();
    assert_eq!(stations.len(), 3, "entry without coordinates is skipped");

    let trips = load_trips(
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/trips.csv"),
        analysis_date(),
        TripLogOptions::default(),
    )
    .unwrap();
    assert_eq!(trips.len(), 7, "trip of the following day is filtered out");

    let graph = street();
    let routes = reconstruct_routes(&stations, &trips, &graph);
    assert_eq!(routes.len(), trips.len());

    let outcomes: Vec<RouteOutcome> = routes.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            RouteOutcome::Routed,
            RouteOutcome::Routed,
            RouteOutcome::Routed,
            RouteOutcome::MissingStation,
            RouteOutcome::UnknownStation,
            RouteOutcome::SameNode,
            RouteOutcome::UnknownStation,
        ]
    );

    let first = &routes[0];
    assert_eq!(first.route.len(), 5);
    assert_eq!(first.route[0], Coord { x: 3.88, y: 43.61 });
    assert_eq!(first.route[4], Coord { x: 3.90, y: 43.62 });

    let back = &routes[2];
    assert_eq!(back.route[0], Coord { x: 3.90, y: 43.62 });
    assert_eq!(back.route[4], Coord { x: 3.88, y: 43.61 });

    let stats = RouteStats::from_routes(&routes);
    assert_eq!(stats.total_trips, 7);
    assert_eq!(stats.routed, 3);
    assert_eq!(stats.missing_station, 1);
    assert_eq!(stats.unknown_station, 2);
    assert_eq!(stats.same_node, 1);
    assert_eq!(stats.no_path, 0);
    assert_eq!(stats.empty_routes(), 4);
}

#[test]
fn test_density_counts_directions_apart_unless_merged() {
    let stations = parse_stations(include_bytes!("fixtures/stations.json")).unwrap();
    let trips = load_trips(
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/trips.csv"),
        analysis_date(),
        TripLogOptions::default(),
    )
    .unwrap();
    let routes = reconstruct_routes(&stations, &trips, &street());

    let split = create_density_map(&routes, &DensityOptions::default()).unwrap();
    assert_eq!(split.segments.len(), 8);
    assert_eq!(split.max_frequency, 2);

    let merged = create_density_map(
        &routes,
        &DensityOptions {
            merge_reversed: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(merged.segments.len(), 4);
    assert_eq!(merged.max_frequency, 3);
    assert!(merged.segments.iter().all(|s| s.frequency == 3));

    let html = merged.to_html();
    assert!(html.contains("leaflet"));
}

#[test]
fn test_animation_follows_the_morning_trip() {
    let stations = parse_stations(include_bytes!("fixtures/stations.json")).unwrap();
    let trips = load_trips(
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/trips.csv"),
        analysis_date(),
        TripLogOptions::default(),
    )
    .unwrap();
    let graph = street();
    let routes = reconstruct_routes(&stations, &trips, &graph);
    let morning = &routes[0];

    assert_eq!(position_index(at("2024-03-04 08:10:00"), morning), Some(2));
    assert_eq!(position_index(at("2024-03-04 07:59:00"), morning), None);
    assert_eq!(position_index(at("2024-03-04 08:20:00"), morning), Some(4));

    let animation = create_animation(&routes, analysis_date(), &graph).unwrap();
    assert_eq!(animation.frame_count(), FRAME_COUNT);

    // 08:15 is frame 33: three quarters of the way, fourth node.
    let frame = animation.frame(33);
    assert_eq!(frame, vec![(morning.id, Coord { x: 3.895, y: 43.6175 })]);

    // nobody rides at 03:00
    assert!(animation.frame(12).is_empty());

    let svg = animation.to_svg();
    assert!(svg.starts_with("<svg"));
}
