//! Third pipeline stage: the density map and the day animation.

pub mod animation;
pub mod density;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("no route has at least two points, nothing to tally")]
    NoSegments,
    #[error("no route has any point, viewport is undefined")]
    NoPoints,
}

/// `(latitude, longitude)`, the order map surfaces expect.
pub type LatLon = [f64; 2];

fn escape_script(json: String) -> String {
    json.replace("</", "<\\/")
}
