pub mod station_api;

pub use station_api::StationApi;
