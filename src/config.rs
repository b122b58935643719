//! Environment-driven settings (a `.env` file is honored by the binary).

use thiserror::Error;

use crate::infra::montpellier::DEFAULT_STATION_URL;
use crate::infra::overpass::{DEFAULT_NOMINATIM_URL, DEFAULT_OVERPASS_URL};

pub const DEFAULT_TRIPS_PATH: &str = "data/TAM_MMM_CoursesVelomagg.csv";
pub const DEFAULT_PLACE: &str = "Montpellier, France";
pub const DEFAULT_USER_AGENT: &str = concat!("velomagg_flow/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub station_url: String,
    pub trips_path: String,
    pub nominatim_url: String,
    pub overpass_url: String,
    pub place: String,
    pub csv_delimiter: u8,
    pub user_agent: String,
    pub http_timeout_secs: u64,
}

impl AppConfig {
    /// Reads `STATION_API_URL`, `TRIPS_CSV_PATH`, `NOMINATIM_URL`,
    /// `OVERPASS_URL`, `NETWORK_PLACE`, `CSV_DELIMITER`, `HTTP_USER_AGENT`
    /// and `HTTP_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let delimiter = get("CSV_DELIMITER", ",");
        let csv_delimiter = match delimiter.as_bytes() {
            [b] => *b,
            _ => {
                return Err(ConfigError::InvalidValue {
                    name: "CSV_DELIMITER",
                    value: delimiter,
                    reason: "expected a single ASCII character",
                });
            }
        };

        let timeout = get("HTTP_TIMEOUT_SECS", "300");
        let http_timeout_secs = timeout.parse().map_err(|_| ConfigError::InvalidValue {
            name: "HTTP_TIMEOUT_SECS",
            value: timeout.clone(),
            reason: "expected a whole number of seconds",
        })?;

        Ok(Self {
            station_url: get("STATION_API_URL", DEFAULT_STATION_URL),
            trips_path: get("TRIPS_CSV_PATH", DEFAULT_TRIPS_PATH),
            nominatim_url: get("NOMINATIM_URL", DEFAULT_NOMINATIM_URL),
            overpass_url: get("OVERPASS_URL", DEFAULT_OVERPASS_URL),
            place: get("NETWORK_PLACE", DEFAULT_PLACE),
            csv_delimiter,
            user_agent: get("HTTP_USER_AGENT", DEFAULT_USER_AGENT),
            http_timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.station_url, DEFAULT_STATION_URL);
        assert_eq!(config.trips_path, DEFAULT_TRIPS_PATH);
        assert_eq!(config.place, "Montpellier, France");
        assert_eq!(config.csv_delimiter, b',');
        assert_eq!(config.http_timeout_secs, 300);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("CSV_DELIMITER", ";"),
            ("NETWORK_PLACE", "Sète, France"),
            ("HTTP_TIMEOUT_SECS", "60"),
        ]))
        .unwrap();
        assert_eq!(config.csv_delimiter, b';');
        assert_eq!(config.place, "Sète, France");
        assert_eq!(config.http_timeout_secs, 60);
    }

    #[test]
    fn test_invalid_delimiter() {
        let err = AppConfig::from_lookup(lookup(&[("CSV_DELIMITER", ";;")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "CSV_DELIMITER", .. }));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = AppConfig::from_lookup(lookup(&[("HTTP_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "HTTP_TIMEOUT_SECS", .. }));
    }
}
