mod client;

pub use client::{DEFAULT_NOMINATIM_URL, DEFAULT_OVERPASS_URL, OverpassGraphProvider};
