//! Historical trip log loading and per-day filtering.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d"];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

#[derive(Debug, Error)]
pub enum TripLogError {
    #[error("cannot open trip log '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("trip log parse failure: {0}")]
    Csv(#[from] csv::Error),
    #[error("unrecognized date '{0}'")]
    InvalidDate(String),
}

/// A single rental: where it left from, where it came back, and when.
///
/// Station fields are kept raw; see [`crate::routes::normalize_station_code`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TripRecord {
    #[serde(rename = "Departure station", default)]
    pub departure_station: Option<String>,
    #[serde(rename = "Return station", default)]
    pub return_station: Option<String>,
    #[serde(rename = "Departure", deserialize_with = "deserialize_timestamp")]
    pub departure: NaiveDateTime,
    #[serde(rename = "Return", deserialize_with = "deserialize_timestamp")]
    pub return_time: NaiveDateTime,
}

impl TripRecord {
    /// True when the trip leaves or comes back on `date`.
    pub fn touches(&self, date: NaiveDate) -> bool {
        self.departure.date() == date || self.return_time.date() == date
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TripLogOptions {
    pub delimiter: u8,
}

impl Default for TripLogOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Parses a calendar date written as `YYYY-MM-DD`, `YYYY/MM/DD`,
/// `DD/MM/YYYY`, `YYYYMMDD`, or as a full timestamp.
pub fn parse_date(value: &str) -> Result<NaiveDate, TripLogError> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| parse_timestamp(value).map(|ts| ts.date()))
        .ok_or_else(|| TripLogError::InvalidDate(value.to_string()))
}

/// Parses a log timestamp. RFC 3339 values keep their local wall time.
/// A bare date is read as midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unparseable timestamp '{raw}'")))
}

/// Reads the trip log at `path` and keeps the trips touching `date`.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display(), date = %date))]
pub fn load_trips(
    path: impl AsRef<Path>,
    date: NaiveDate,
    options: TripLogOptions,
) -> Result<Vec<TripRecord>, TripLogError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| TripLogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let trips = read_trips(file, date, options)?;
    info!(count = trips.len(), "Trips loaded for analysis date");
    Ok(trips)
}

/// Same as [`load_trips`] over any reader.
pub fn read_trips<R: Read>(
    reader: R,
    date: NaiveDate,
    options: TripLogOptions,
) -> Result<Vec<TripRecord>, TripLogError> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(Trim::All)
        .from_reader(reader);

    let mut total = 0usize;
    let mut kept = Vec::new();
    for result in rdr.deserialize() {
        let record: TripRecord = result?;
        total += 1;
        if record.touches(date) {
            kept.push(record);
        }
    }

    debug!(total, kept = kept.len(), "Trip log scanned");
    Ok(kept)
}
