//! First pipeline stage: stations from the remote listing, trips from the log.

use chrono::NaiveDate;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};

use crate::fetch::FetchError;
use crate::services::StationApi;
use crate::stations::StationMap;
use crate::trips::{TripLogError, TripLogOptions, TripRecord, load_trips};

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("station retrieval failed: {0}")]
    Stations(#[from] FetchError),
    #[error(transparent)]
    Trips(#[from] TripLogError),
}

/// Everything the route stage needs for one analysis date.
#[derive(Debug, Clone)]
pub struct BikeData {
    pub stations: StationMap,
    pub trips: Vec<TripRecord>,
}

/// Fetches the station listing, then loads the trips touching `date`.
///
/// A failed station fetch aborts before the trip log is read.
#[tracing::instrument(skip_all, fields(trips = %trips_path.as_ref().display(), date = %date))]
pub async fn acquire<A: StationApi + ?Sized>(
    api: &A,
    trips_path: impl AsRef<Path>,
    date: NaiveDate,
    options: TripLogOptions,
) -> Result<BikeData, AcquisitionError> {
    let stations = match api.list_stations().await {
        Ok(stations) => stations,
        Err(e) => {
            error!(error = %e, "Station retrieval failed, aborting acquisition");
            return Err(e.into());
        }
    };

    let trips = load_trips(trips_path, date, options)?;
    info!(
        stations = stations.len(),
        trips = trips.len(),
        "Bike data acquired"
    );
    Ok(BikeData { stations, trips })
}
