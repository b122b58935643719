//! Persistence for rendered artifacts and run summaries.
//!
//! Supports pretty-printing, gzip-or-plain artifact files, JSON route dumps
//! and CSV append of run statistics.

use anyhow::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, info};

use crate::routes::BikeRoute;
use crate::stats::RouteStats;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Logs run statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &RouteStats) {
    debug!("{:#?}", stats);
}

/// Writes `contents` to `path`, creating parent directories.
///
/// With `gzip`, the bytes are compressed and `.gz` is appended to the file
/// name. Returns the path actually written.
pub fn write_artifact(path: impl AsRef<Path>, contents: &[u8], gzip: bool) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let (target, body) = if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(contents)?;
        let mut name = path.as_os_str().to_owned();
        name.push(".gz");
        (PathBuf::from(name), encoder.finish()?)
    } else {
        (path.to_path_buf(), contents.to_vec())
    };

    std::fs::write(&target, &body)?;
    info!(path = %target.display(), bytes = body.len(), "Artifact written");
    Ok(target)
}

/// Dumps routes as pretty JSON.
pub fn write_routes_json(path: impl AsRef<Path>, routes: &[BikeRoute], gzip: bool) -> Result<PathBuf> {
    let body = serde_json::to_vec_pretty(routes)?;
    write_artifact(path, &body, gzip)
}

/// Appends a [`RouteStats`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, stats: &RouteStats) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(stats)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::RouteOutcome;
    use chrono::NaiveDate;
    use flate2::read::GzDecoder;
    use geo::Coord;
    use std::env;
    use std::fs;
    use std::io::Read;
    use uuid::Uuid;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        let stats = RouteStats::default();
        print_pretty(&stats);
    }

    #[test]
    fn test_write_artifact_plain() {
        let path = temp_path("velomagg_flow_test_plain/map.html");
        let _ = fs::remove_file(&path);

        let written = write_artifact(&path, b"<html></html>", false).unwrap();
        assert_eq!(written, PathBuf::from(&path));
        assert_eq!(fs::read_to_string(&path).unwrap(), "<html></html>");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_artifact_gzip_appends_extension() {
        let path = temp_path("velomagg_flow_test_anim.svg");
        let written = write_artifact(&path, b"<svg/>", true).unwrap();
        assert_eq!(written, PathBuf::from(format!("{path}.gz")));

        let mut decoded = String::new();
        GzDecoder::new(fs::File::open(&written).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "<svg/>");

        fs::remove_file(&written).unwrap();
    }

    #[test]
    fn test_write_routes_json() {
        let path = temp_path("velomagg_flow_test_routes.json");
        let t = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let routes = vec![BikeRoute {
            id: Uuid::new_v4(),
            departure_time: t,
            return_time: t,
            route: vec![Coord { x: 3.88, y: 43.61 }],
            outcome: RouteOutcome::SameNode,
        }];
        write_routes_json(&path, &routes, false).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json[0]["outcome"], "same_node");
        assert_eq!(json[0]["route"][0]["x"], 3.88);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("velomagg_flow_test_header.csv");
        let _ = fs::remove_file(&path);

        let stats = RouteStats::default();
        append_record(&path, &stats).unwrap();
        append_record(&path, &stats).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // Header line should appear exactly once
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);
        // 1 header + 2 data rows
        assert_eq!(content.lines().count(), 3);

        fs::remove_file(&path).unwrap();
    }
}
