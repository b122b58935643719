use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::routes::{BikeRoute, RouteOutcome};

/// Per-run summary of the route stage, one CSV row per run.
#[derive(Debug, Default, Serialize)]
pub struct RouteStats {
    pub timestamp: DateTime<Utc>,
    pub analysis_date: Option<NaiveDate>,
    pub place: Option<String>,
    pub total_trips: usize,

    // outcomes
    pub routed: usize,
    pub missing_station: usize,
    pub unknown_station: usize,
    pub same_node: usize,
    pub no_path: usize,

    // geometry
    pub total_points: usize,
    pub total_segments: usize,
    pub longest_route_points: usize,
}

impl RouteStats {
    pub fn from_routes(routes: &[BikeRoute]) -> Self {
        let mut s = RouteStats {
            timestamp: Utc::now(),
            total_trips: routes.len(),
            ..Default::default()
        };

        for r in routes {
            match r.outcome {
                RouteOutcome::Routed => s.routed += 1,
                RouteOutcome::MissingStation => s.missing_station += 1,
                RouteOutcome::UnknownStation => s.unknown_station += 1,
                RouteOutcome::SameNode => s.same_node += 1,
                RouteOutcome::NoPath => s.no_path += 1,
            }

            s.total_points += r.route.len();
            s.total_segments += r.route.len().saturating_sub(1);
            s.longest_route_points = s.longest_route_points.max(r.route.len());
        }

        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn routed_pct(&self) -> f64 {
        Self::pct(self.routed, self.total_trips)
    }

    pub fn empty_routes(&self) -> usize {
        self.total_trips - self.routed
    }

    /// Set run metadata (date and place)
    pub fn with_run_info(mut self, date: NaiveDate, place: &str) -> Self {
        self.analysis_date = Some(date);
        self.place = Some(place.to_string());
        self
    }
}
