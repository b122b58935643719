mod client;

pub use client::{DEFAULT_STATION_URL, Montpellier3mClient};
