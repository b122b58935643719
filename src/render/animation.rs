//! One-day animation of bikes moving along their routes.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use geo::Coord;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::RenderError;
use crate::network::StreetGraph;
use crate::routes::BikeRoute;

pub const FRAME_COUNT: usize = 96;
pub const FRAME_STEP_MINUTES: i64 = 15;
/// Wall-clock time per frame on playback.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(100);
/// Degrees added on each side of the routes' bounding box.
pub const VIEWPORT_MARGIN: f64 = 0.01;

const SVG_WIDTH: f64 = 1000.0;
const BACKGROUND_COLOR: &str = "#111111";
const EDGE_COLOR: &str = "#999999";
const BIKE_COLOR: &str = "blue";
const BIKE_RADIUS: f64 = 3.0;

/// Lon/lat bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Viewport {
    /// Box around every route point, padded by [`VIEWPORT_MARGIN`].
    pub fn around(routes: &[BikeRoute]) -> Option<Self> {
        let mut points = routes.iter().flat_map(|r| r.route.iter());
        let first = points.next()?;
        let mut vp = Viewport {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in points {
            vp.min_x = vp.min_x.min(p.x);
            vp.min_y = vp.min_y.min(p.y);
            vp.max_x = vp.max_x.max(p.x);
            vp.max_y = vp.max_y.max(p.y);
        }
        Some(Viewport {
            min_x: vp.min_x - VIEWPORT_MARGIN,
            min_y: vp.min_y - VIEWPORT_MARGIN,
            max_x: vp.max_x + VIEWPORT_MARGIN,
            max_y: vp.max_y + VIEWPORT_MARGIN,
        })
    }

    pub fn contains(&self, c: Coord<f64>) -> bool {
        c.x >= self.min_x && c.x <= self.max_x && c.y >= self.min_y && c.y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Index of the route point a bike is shown at, or `None` when the bike is
/// not riding at `time`.
///
/// Progress through the trip is linear in time and truncated onto the
/// point list. A zero-duration trip is shown at its first point.
pub fn position_index(time: NaiveDateTime, route: &BikeRoute) -> Option<usize> {
    let n = route.route.len();
    if n == 0 || time < route.departure_time || time > route.return_time {
        return None;
    }

    let total = (route.return_time - route.departure_time).num_milliseconds();
    if total == 0 {
        return Some(0);
    }
    let elapsed = (time - route.departure_time).num_milliseconds();
    let progress = elapsed as f64 / total as f64;
    let index = (progress * (n - 1) as f64) as usize;
    Some(index.min(n - 1))
}

pub fn position_at(time: NaiveDateTime, route: &BikeRoute) -> Option<Coord<f64>> {
    position_index(time, route).map(|i| route.route[i])
}

/// Frame timestamps: every [`FRAME_STEP_MINUTES`] from midnight of `date`.
pub fn frame_times(date: NaiveDate) -> Vec<NaiveDateTime> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..FRAME_COUNT as i64)
        .map(|i| midnight + TimeDelta::minutes(FRAME_STEP_MINUTES * i))
        .collect()
}

/// Where one bike is on each frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BikeTrack {
    pub bike_id: Uuid,
    pub positions: Vec<Option<Coord<f64>>>,
}

#[derive(Debug, Clone)]
pub struct Animation {
    pub frame_times: Vec<NaiveDateTime>,
    pub interval: Duration,
    pub viewport: Viewport,
    /// street edges inside the viewport, drawn once
    pub background: Vec<(Coord<f64>, Coord<f64>)>,
    pub tracks: Vec<BikeTrack>,
}

/// Computes bike positions for every frame of `date`.
///
/// # Errors
///
/// [`RenderError::NoPoints`] if no route has geometry.
#[tracing::instrument(skip_all, fields(routes = routes.len(), date = %date))]
pub fn create_animation(
    routes: &[BikeRoute],
    date: NaiveDate,
    graph: &StreetGraph,
) -> Result<Animation, RenderError> {
    let viewport = Viewport::around(routes).ok_or(RenderError::NoPoints)?;
    let frame_times = frame_times(date);

    let tracks: Vec<BikeTrack> = routes
        .iter()
        .map(|route| BikeTrack {
            bike_id: route.id,
            positions: frame_times.iter().map(|t| position_at(*t, route)).collect(),
        })
        .collect();

    let background = background_edges(graph, &viewport);

    info!(
        frames = frame_times.len(),
        bikes = tracks.len(),
        background_edges = background.len(),
        "Animation built"
    );

    Ok(Animation {
        frame_times,
        interval: FRAME_INTERVAL,
        viewport,
        background,
        tracks,
    })
}

/// Graph edges touching the viewport; two-way streets appear once.
fn background_edges(graph: &StreetGraph, viewport: &Viewport) -> Vec<(Coord<f64>, Coord<f64>)> {
    let mut seen = HashSet::new();
    graph
        .edge_lines()
        .filter(|(a, b)| viewport.contains(*a) || viewport.contains(*b))
        .filter(|(a, b)| {
            let (lo, hi) = if (a.x, a.y) <= (b.x, b.y) { (a, b) } else { (b, a) };
            seen.insert([lo.x.to_bits(), lo.y.to_bits(), hi.x.to_bits(), hi.y.to_bits()])
        })
        .collect()
}

impl Animation {
    pub fn frame_count(&self) -> usize {
        self.frame_times.len()
    }

    /// Total playback time of one loop.
    pub fn duration(&self) -> Duration {
        self.interval * self.frame_count() as u32
    }

    /// Visible bikes on frame `index`.
    pub fn frame(&self, index: usize) -> Vec<(Uuid, Coord<f64>)> {
        self.tracks
            .iter()
            .filter_map(|t| t.positions.get(index).copied().flatten().map(|c| (t.bike_id, c)))
            .collect()
    }

    /// Looping SMIL animation: street background, a clock, one dot per bike.
    pub fn to_svg(&self) -> String {
        let projection = Projection::new(&self.viewport);
        let (width, height) = (projection.width, projection.height);
        let dur = format!("{}ms", self.duration().as_millis());

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.2} {height:.2}">"#
        );
        let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="{BACKGROUND_COLOR}"/>"#);

        let mut d = String::new();
        for (a, b) in &self.background {
            let (ax, ay) = projection.apply(*a);
            let (bx, by) = projection.apply(*b);
            let _ = write!(d, "M{ax:.2} {ay:.2}L{bx:.2} {by:.2}");
        }
        let _ = writeln!(
            svg,
            r#"<path d="{d}" stroke="{EDGE_COLOR}" stroke-width="1" fill="none"/>"#
        );

        for (i, time) in self.frame_times.iter().enumerate() {
            let visibility = discrete_values(self.frame_count(), |f| {
                (if f == i { "visible" } else { "hidden" }).to_string()
            });
            let _ = writeln!(
                svg,
                r#"<text x="10" y="24" fill="white" font-family="monospace" font-size="18" visibility="hidden">{}<animate attributeName="visibility" values="{visibility}" dur="{dur}" calcMode="discrete" repeatCount="indefinite"/></text>"#,
                time.format("%Y-%m-%d %H:%M")
            );
        }

        for track in &self.tracks {
            if track.positions.iter().all(Option::is_none) {
                continue;
            }
            let projected: Vec<Option<(f64, f64)>> = track
                .positions
                .iter()
                .map(|p| p.map(|c| projection.apply(c)))
                .collect();
            let cx = discrete_values(projected.len(), |f| {
                projected[f].map_or("0".to_string(), |(x, _)| format!("{x:.2}"))
            });
            let cy = discrete_values(projected.len(), |f| {
                projected[f].map_or("0".to_string(), |(_, y)| format!("{y:.2}"))
            });
            let visibility = discrete_values(projected.len(), |f| {
                (if projected[f].is_some() { "visible" } else { "hidden" }).to_string()
            });
            let _ = writeln!(
                svg,
                r#"<circle id="bike-{id}" r="{BIKE_RADIUS}" fill="{BIKE_COLOR}" visibility="hidden"><animate attributeName="cx" values="{cx}" dur="{dur}" calcMode="discrete" repeatCount="indefinite"/><animate attributeName="cy" values="{cy}" dur="{dur}" calcMode="discrete" repeatCount="indefinite"/><animate attributeName="visibility" values="{visibility}" dur="{dur}" calcMode="discrete" repeatCount="indefinite"/></circle>"#,
                id = track.bike_id
            );
        }

        svg.push_str("</svg>\n");
        svg
    }
}

fn discrete_values(count: usize, value: impl Fn(usize) -> String) -> String {
    (0..count).map(value).collect::<Vec<_>>().join(";")
}

/// Lon/lat to pixels, latitude stretched by 1/cos(mid latitude).
struct Projection {
    min_x: f64,
    max_y: f64,
    scale_x: f64,
    scale_y: f64,
    width: f64,
    height: f64,
}

impl Projection {
    fn new(vp: &Viewport) -> Self {
        let mid_lat = ((vp.min_y + vp.max_y) / 2.0).to_radians();
        let scale_x = SVG_WIDTH / vp.width();
        let scale_y = scale_x / mid_lat.cos();
        Self {
            min_x: vp.min_x,
            max_y: vp.max_y,
            scale_x,
            scale_y,
            width: SVG_WIDTH,
            height: vp.height() * scale_y,
        }
    }

    fn apply(&self, c: Coord<f64>) -> (f64, f64) {
        ((c.x - self.min_x) * self.scale_x, (self.max_y - c.y) * self.scale_y)
    }
}
