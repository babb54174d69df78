use log::info;

use snafu::{prelude::*, Snafu};
use station_geocoding::*;

use std::path::{Path, PathBuf};

use crate::geocode::config_reader::*;
use crate::geocode::stations::*;

pub mod batch;
pub mod checkpoint;
pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
pub mod nominatim;
pub mod report;
pub mod stations;

#[derive(Debug, Snafu)]
pub enum GeoError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Worksheet {name} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("The spreadsheet {path} has no header row"))]
    EmptySheet { path: String },
    #[snafu(display("Column {column} not found in the header of {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error reading {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Could not build the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Invalid configuration: {message}"))]
    InvalidConfig { message: String },
    #[snafu(display("Unknown input provider {provider:?} for {path}"))]
    UnknownProvider { provider: String, path: String },
    #[snafu(display(
        "The checkpoint in {path} was written for a different input (sha256 {found}, expected {expected}). Use --fresh to discard it."
    ))]
    CheckpointMismatch {
        path: String,
        found: String,
        expected: String,
    },
    #[snafu(display(
        "The checkpoint in {path} covers stations {found_start}-{found_end}, not {start}-{end}. Use --fresh to discard it."
    ))]
    CheckpointRange {
        path: String,
        found_start: usize,
        found_end: usize,
        start: usize,
        end: usize,
    },
    #[snafu(display("Station range {start}-{end} is invalid for {total} stations"))]
    InvalidRange {
        start: usize,
        end: usize,
        total: usize,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type GeoResult<T> = Result<T, GeoError>;

/// Geocodes a spreadsheet of stations. See [`batch::run_batch`].
pub fn run_geocode(
    config: &GeocodeConfig,
    client: &dyn GeocodingClient,
    options: &batch::BatchOptions,
) -> GeoResult<()> {
    let summary = batch::run_batch(config, client, options)?;
    info!(
        "Geocoding complete: {} stations, {} success, {} failed ({} lookups, resumed at {})",
        summary.processed, summary.success, summary.failed, summary.lookups, summary.resumed_from
    );
    Ok(())
}

/// Re-resolves the stations of `input` that have no geocoded address.
pub fn run_reprocess(
    config: &GeocodeConfig,
    client: &dyn GeocodingClient,
    input: &Path,
    output: &Path,
) -> GeoResult<()> {
    let summary = batch::reprocess_failed(config, client, input, output)?;
    info!(
        "Reprocessing complete: {} reprocessed, {} new successes, {} still failed",
        summary.reprocessed, summary.new_successes, summary.still_failed
    );
    for line in report::report_lines(&read_stations(output)?) {
        info!("{}", line);
    }
    Ok(())
}

/// Merges result files, later files taking precedence for identical ids.
pub fn run_merge(inputs: &[PathBuf], output: &Path) -> GeoResult<()> {
    if inputs.is_empty() {
        whatever!("No input file to merge");
    }
    let mut sets: Vec<Vec<PollingStation>> = Vec::new();
    for p in inputs {
        let stations = read_stations(p)?;
        info!("Loaded {} stations from {}", stations.len(), p.display());
        sets.push(stations);
    }
    let merged = merge_stations(sets);
    write_stations(output, &merged)?;
    info!("Merged {} stations into {}", merged.len(), output.display());
    for line in report::report_lines(&merged) {
        info!("{}", line);
    }
    Ok(())
}

/// Prints the success statistics of a result file, optionally saving them as JSON.
pub fn run_report(input: &Path, output: Option<&Path>) -> GeoResult<()> {
    let stations = read_stations(input)?;
    for line in report::report_lines(&stations) {
        println!("{}", line);
    }
    if let Some(out) = output {
        let stats = report::compute_stats(&stations, None);
        io_common::write_json(out, &stats)?;
        info!("Report saved to {}", out.display());
    }
    Ok(())
}
