//! CLI entry point for velomagg_flow.
//!
//! Provides subcommands for listing stations, reconstructing the routes of
//! one day, and rendering the density map and the day animation.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use velomagg_flow::{
    acquisition::acquire,
    config::AppConfig,
    fetch::BasicClient,
    infra::{montpellier::Montpellier3mClient, overpass::OverpassGraphProvider},
    network::{CachedGraphProvider, FileGraphProvider, GraphProvider, StreetGraph},
    output::{append_record, print_pretty, write_artifact, write_routes_json},
    render::{
        LatLon,
        animation::create_animation,
        density::{DEFAULT_ZOOM, DensityOptions, create_density_map},
    },
    routes::{BikeRoute, reconstruct_routes},
    services::StationApi,
    stats::RouteStats,
    trips::{TripLogOptions, parse_date},
};

#[derive(Parser)]
#[command(name = "velomagg_flow")]
#[command(about = "Reconstruct bike-share trips and render traffic maps", long_about = None)]
struct Cli {
    /// Trip log CSV (overrides TRIPS_CSV_PATH)
    #[arg(long, global = true)]
    trips: Option<String>,

    /// Place whose bike network is downloaded (overrides NETWORK_PLACE)
    #[arg(long, global = true)]
    place: Option<String>,

    /// JSON snapshot of the street graph; read if present, written otherwise
    #[arg(long, global = true)]
    graph_cache: Option<String>,

    /// Gzip compress written artifacts
    #[arg(long, global = true, default_value_t = false)]
    gzip: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and log the current station listing
    Stations,
    /// Reconstruct the routes of one day and dump them as JSON
    Routes {
        /// Analysis date (e.g. 2024-03-04)
        #[arg(short, long)]
        date: String,

        /// JSON file to write routes to
        #[arg(short, long, default_value = "routes.json")]
        output: String,

        /// CSV file to append run statistics to
        #[arg(long)]
        stats_csv: Option<String>,
    },
    /// Render the segment density map of one day
    Density {
        /// Analysis date (e.g. 2024-03-04)
        #[arg(short, long)]
        date: String,

        /// HTML file to write the map to
        #[arg(short, long, default_value = "density.html")]
        output: String,

        /// Map center as LAT,LON
        #[arg(long, value_parser = parse_center)]
        center: Option<LatLon>,

        /// Initial zoom level
        #[arg(long, default_value_t = DEFAULT_ZOOM)]
        zoom: u8,

        /// Count both directions of a street segment together
        #[arg(long, default_value_t = false)]
        merge_reversed: bool,
    },
    /// Render the animation of one day
    Animate {
        /// Analysis date (e.g. 2024-03-04)
        #[arg(short, long)]
        date: String,

        /// SVG file to write the animation to
        #[arg(short, long, default_value = "animation.svg")]
        output: String,
    },
    /// Produce routes, density map and animation with a single graph build
    Run {
        /// Analysis date (e.g. 2024-03-04)
        #[arg(short, long)]
        date: String,

        /// Directory for all artifacts
        #[arg(short = 'd', long, default_value = "out")]
        output_dir: String,

        /// CSV file to append run statistics to
        #[arg(long)]
        stats_csv: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing()?;

    let cli = Cli::parse();
    let app = App::new(AppConfig::from_env()?, &cli)?;

    match cli.command {
        Commands::Stations => {
            let stations = app.stations.list_stations().await?;
            for station in stations.iter() {
                info!(
                    code = %station.code,
                    lon = station.location.x(),
                    lat = station.location.y(),
                    "Station"
                );
            }
            info!(total = stations.len(), "Station list summary");
        }
        Commands::Routes {
            date,
            output,
            stats_csv,
        } => {
            let date = parse_date(&date)?;
            let (routes, _, stats) = app.routes(date).await?;
            write_routes_json(&output, &routes, app.gzip)?;
            app.record_stats(stats_csv.as_deref(), &stats)?;
        }
        Commands::Density {
            date,
            output,
            center,
            zoom,
            merge_reversed,
        } => {
            let date = parse_date(&date)?;
            let (routes, _, _) = app.routes(date).await?;
            let mut options = DensityOptions {
                zoom,
                merge_reversed,
                ..Default::default()
            };
            if let Some(center) = center {
                options.center = center;
            }
            let map = create_density_map(&routes, &options)?;
            write_artifact(&output, map.to_html().as_bytes(), app.gzip)?;
        }
        Commands::Animate { date, output } => {
            let date = parse_date(&date)?;
            let (routes, graph, _) = app.routes(date).await?;
            let animation = create_animation(&routes, date, &graph)?;
            write_artifact(&output, animation.to_svg().as_bytes(), app.gzip)?;
        }
        Commands::Run {
            date,
            output_dir,
            stats_csv,
        } => {
            let date = parse_date(&date)?;
            app.run(date, Path::new(&output_dir), stats_csv.as_deref())
                .await?;
        }
    }

    Ok(())
}

/// Logging setup: colored stderr + JSON rolling log file
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/velomagg_flow.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("velomagg_flow.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(file_guard)
}

fn parse_center(value: &str) -> Result<LatLon, String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{value}'"))?;
    let lat = lat.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let lon = lon.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok([lat, lon])
}

/// Wiring shared by every subcommand.
struct App {
    trips_path: String,
    place: String,
    gzip: bool,
    trip_options: TripLogOptions,
    stations: Montpellier3mClient<BasicClient>,
    graphs: Box<dyn GraphProvider>,
}

impl App {
    fn new(config: AppConfig, cli: &Cli) -> Result<Self> {
        let timeout = Duration::from_secs(config.http_timeout_secs);

        let stations = Montpellier3mClient::with_url(
            BasicClient::new(&config.user_agent, timeout)?,
            &config.station_url,
        );

        let overpass = OverpassGraphProvider::with_urls(
            BasicClient::new(&config.user_agent, timeout)?,
            &config.nominatim_url,
            &config.overpass_url,
        );
        let graphs: Box<dyn GraphProvider> = match &cli.graph_cache {
            Some(path) => {
                info!(path = %path, "Street graph snapshot enabled");
                Box::new(CachedGraphProvider::new(FileGraphProvider::new(
                    path, overpass,
                )))
            }
            None => Box::new(CachedGraphProvider::new(overpass)),
        };

        Ok(Self {
            trips_path: cli.trips.clone().unwrap_or(config.trips_path),
            place: cli.place.clone().unwrap_or(config.place),
            gzip: cli.gzip,
            trip_options: TripLogOptions {
                delimiter: config.csv_delimiter,
            },
            stations,
            graphs,
        })
    }

    /// Acquisition then route reconstruction for `date`.
    #[tracing::instrument(skip(self), fields(place = %self.place))]
    async fn routes(
        &self,
        date: NaiveDate,
    ) -> Result<(Vec<BikeRoute>, Arc<StreetGraph>, RouteStats)> {
        let data = acquire(
            &self.stations,
            &self.trips_path,
            date,
            self.trip_options,
        )
        .await?;

        let graph = self.graphs.graph(&self.place).await?;
        let routes = reconstruct_routes(&data.stations, &data.trips, &graph);

        let stats = RouteStats::from_routes(&routes).with_run_info(date, &self.place);
        print_pretty(&stats);
        info!(
            trips = stats.total_trips,
            routed = stats.routed,
            routed_pct = stats.routed_pct(),
            missing_station = stats.missing_station,
            unknown_station = stats.unknown_station,
            same_node = stats.same_node,
            no_path = stats.no_path,
            "Route summary"
        );

        Ok((routes, graph, stats))
    }

    fn record_stats(&self, stats_csv: Option<&str>, stats: &RouteStats) -> Result<()> {
        if let Some(path) = stats_csv {
            append_record(path, stats)?;
        }
        Ok(())
    }

    /// Every artifact for `date` into `output_dir`. A date without any
    /// drawable route skips the map and the animation.
    #[tracing::instrument(skip_all, fields(date = %date, output_dir = %output_dir.display()))]
    async fn run(
        &self,
        date: NaiveDate,
        output_dir: &Path,
        stats_csv: Option<&str>,
    ) -> Result<()> {
        let (routes, graph, stats) = self.routes(date).await?;
        let stem = date.format("%Y-%m-%d").to_string();

        write_routes_json(
            output_dir.join(format!("routes_{stem}.json")),
            &routes,
            self.gzip,
        )?;

        match create_density_map(&routes, &DensityOptions::default()) {
            Ok(map) => {
                write_artifact(
                    output_dir.join(format!("density_{stem}.html")),
                    map.to_html().as_bytes(),
                    self.gzip,
                )?;
            }
            Err(e) => warn!(error = %e, "Density map skipped"),
        }

        match create_animation(&routes, date, &graph) {
            Ok(animation) => {
                write_artifact(
                    output_dir.join(format!("animation_{stem}.svg")),
                    animation.to_svg().as_bytes(),
                    self.gzip,
                )?;
            }
            Err(e) => warn!(error = %e, "Animation skipped"),
        }

        self.record_stats(stats_csv, &stats)?;
        info!(routes = routes.len(), "Run complete");
        Ok(())
    }
}
