//! Geocoding of a whole station list, and of the stations a previous run missed.

use crate::geocode::checkpoint::*;
use crate::geocode::io_common::{read_rows, simplify_file_name};
use crate::geocode::*;

use chrono::Utc;
use log::{debug, error, info};
use snafu::ensure;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const STATIONS_FILE: &str = "stations.json";
pub const STATS_FILE: &str = "geocoding_stats.json";
pub const ERROR_BACKUP_FILE: &str = "stations.error-backup.json";

const REPROCESS_LOG_EVERY: usize = 20;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// 1-based, inclusive. Defaults to the first station.
    pub start: Option<usize>,
    /// 1-based, inclusive. Defaults to the last station.
    pub end: Option<usize>,
    /// Discard any existing checkpoint.
    pub fresh: bool,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
    /// Number of stations taken from a checkpoint.
    pub resumed_from: usize,
    /// Number of addresses sent to the resolver (cache misses).
    pub lookups: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ReprocessSummary {
    pub reprocessed: usize,
    pub new_successes: usize,
    pub still_failed: usize,
}

type AddressKey = (String, String, String);

/// Resolves addresses, at most once per distinct (province, district, neighborhood).
struct StationResolver<'a> {
    client: &'a dyn GeocodingClient,
    rules: ResolverRules,
    pacer: Pacer,
    cache: HashMap<AddressKey, Option<GeocodeResult>>,
    lookups: usize,
}

impl<'a> StationResolver<'a> {
    fn new(config: &GeocodeConfig, client: &'a dyn GeocodingClient) -> GeoResult<Self> {
        Ok(StationResolver {
            client,
            rules: config.geocoder.rules()?,
            pacer: Pacer::new(config.geocoder.rate_limit()),
            cache: HashMap::new(),
            lookups: 0,
        })
    }

    fn resolve(&mut self, record: &RawAddressRecord) -> Option<GeocodeResult> {
        let key = (
            record.province.clone(),
            record.city_district.clone(),
            record.neighborhood.clone(),
        );
        if let Some(cached) = self.cache.get(&key) {
            debug!("resolve: cache hit for {:?}", key);
            return cached.clone();
        }
        self.lookups += 1;
        let res = station_geocoding::resolve(self.client, record, &self.rules, &mut self.pacer);
        self.cache.insert(key, res.clone());
        res
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

fn log_progress(stations: &[PollingStation], total: usize, resumed_from: usize, started: Instant) {
    let processed = stations.len();
    let success = stations.iter().filter(|s| s.is_geocoded()).count();
    let elapsed = started.elapsed();
    let done_here = processed.saturating_sub(resumed_from);
    let remaining = if done_here == 0 {
        Duration::ZERO
    } else {
        elapsed.mul_f64((total - processed) as f64 / done_here as f64)
    };
    info!(
        "Progress: {}/{} ({} success, {} failed, {}%), elapsed {}, remaining about {}",
        processed,
        total,
        success,
        processed - success,
        report::success_rate(success, processed),
        format_duration(elapsed),
        format_duration(remaining)
    );
}

/// Best effort: the error that got us here is the one reported.
fn write_error_backup(output_dir: &Path, stations: &[PollingStation]) {
    let path = output_dir.join(ERROR_BACKUP_FILE);
    match write_stations(&path, stations) {
        Ok(()) => info!("Saved {} stations to {}", stations.len(), path.display()),
        Err(e) => error!("Could not save the error backup {}: {}", path.display(), e),
    }
}

/// Geocodes the stations of `options.input`, writing the stations and their
/// statistics in `options.output_dir`.
///
/// Unresolved stations get the fallback coordinates. The run resumes from
/// the checkpoint in the output directory, if there is one for this input.
pub fn run_batch(
    config: &GeocodeConfig,
    client: &dyn GeocodingClient,
    options: &BatchOptions,
) -> GeoResult<BatchSummary> {
    let rows = read_rows(&options.input, &config.input)?;
    let start = options.start.unwrap_or(1);
    let end = options.end.unwrap_or(rows.len());
    ensure!(
        start >= 1 && start <= end && end <= rows.len(),
        InvalidRangeSnafu {
            start,
            end,
            total: rows.len(),
        }
    );
    let total = end - start + 1;
    info!(
        "Geocoding stations {}-{} of {} from {}",
        start,
        end,
        rows.len(),
        options.input.display()
    );

    let source_sha256 = file_sha256(&options.input)?;
    let checkpoint = Checkpoint::new(&options.output_dir);
    let mut stations = checkpoint.resume(&source_sha256, start, end, options.fresh)?;
    let resumed_from = stations.len();

    let fallback = config.output.fallback_coordinates();
    let checkpoint_every = config.output.checkpoint_every()?;
    let mut resolver = StationResolver::new(config, client)?;
    let manifest = |processed: usize, complete: bool| CheckpointManifest {
        source_file: simplify_file_name(&options.input),
        source_sha256: source_sha256.clone(),
        range_start: start,
        range_end: end,
        processed,
        total,
        updated_at: Utc::now(),
        snapshot: checkpoint.snapshot_path().display().to_string(),
        complete,
    };

    let started = Instant::now();
    for (offset, row) in rows[start - 1..end].iter().enumerate().skip(resumed_from) {
        let number = start + offset;
        let mut station = PollingStation::from_row(number, row, fallback, &timestamp_now());
        match resolver.resolve(&station.address_record()) {
            Some(res) => station.apply_result(&res),
            None => station.mark_unresolved(fallback),
        }
        stations.push(station);

        let processed = stations.len();
        if processed % checkpoint_every == 0 && processed < total {
            log_progress(&stations, total, resumed_from, started);
            if let Err(e) = checkpoint.save(&manifest(processed, false), &stations) {
                write_error_backup(&options.output_dir, &stations);
                return Err(e);
            }
        }
    }

    let stats = report::compute_stats(&stations, Some(started.elapsed()));
    let written = write_stations(&options.output_dir.join(STATIONS_FILE), &stations)
        .and_then(|_| io_common::write_json(&options.output_dir.join(STATS_FILE), &stats))
        .and_then(|_| checkpoint.save(&manifest(stations.len(), true), &stations));
    if let Err(e) = written {
        write_error_backup(&options.output_dir, &stations);
        return Err(e);
    }

    let success = stations.iter().filter(|s| s.is_geocoded()).count();
    Ok(BatchSummary {
        processed: stations.len(),
        success,
        failed: stations.len() - success,
        resumed_from,
        lookups: resolver.lookups,
    })
}

/// Resolves again the stations of `input` without a geocoded address and
/// writes all the stations to `output`.
pub fn reprocess_failed(
    config: &GeocodeConfig,
    client: &dyn GeocodingClient,
    input: &Path,
    output: &Path,
) -> GeoResult<ReprocessSummary> {
    let mut stations = read_stations(input)?;
    let failed: Vec<usize> = stations
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_geocoded())
        .map(|(idx, _)| idx)
        .collect();
    info!(
        "{} of {} stations in {} have no geocoded address",
        failed.len(),
        stations.len(),
        input.display()
    );

    let fallback = config.output.fallback_coordinates();
    let mut resolver = StationResolver::new(config, client)?;
    let mut summary = ReprocessSummary::default();
    for idx in failed.iter() {
        let station = &mut stations[*idx];
        match resolver.resolve(&station.address_record()) {
            Some(res) => {
                station.apply_result(&res);
                summary.new_successes += 1;
            }
            None => station.mark_unresolved(fallback),
        }
        station.reprocessed = true;
        station.last_updated = timestamp_now();
        summary.reprocessed += 1;
        if summary.reprocessed % REPROCESS_LOG_EVERY == 0 {
            info!(
                "Reprocessed {}/{} ({} new successes)",
                summary.reprocessed,
                failed.len(),
                summary.new_successes
            );
        }
    }
    summary.still_failed = summary.reprocessed - summary.new_successes;

    write_stations(output, &stations)?;
    info!(
        "Improvement: {}% of the failed stations now resolved",
        report::success_rate(summary.new_successes, summary.reprocessed)
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::testing::*;
    use std::fs;

    const HEADER: &str = "시도,구시군명,읍면동명,투표소명\n";

    fn setup(lines: &[&str]) -> (tempfile::TempDir, BatchOptions) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("list.csv");
        fs::write(&input, format!("{}{}\n", HEADER, lines.join("\n"))).unwrap();
        let options = BatchOptions {
            input,
            output_dir: dir.path().join("out"),
            start: None,
            end: None,
            fresh: false,
        };
        (dir, options)
    }

    fn output(options: &BatchOptions) -> Vec<PollingStation> {
        read_stations(&options.output_dir.join(STATIONS_FILE)).unwrap()
    }

    #[test]
    fn fallback_for_unresolved() {
        let (_dir, options) = setup(&["서울,종로구,청운효자동,A", "서울,종로구,없는동,B"]);
        let provider = FakeProvider::new(&[
            ("서울 종로구 청운효자동", "청운효자동, 종로구, 서울", "37.58", "126.97"),
            ("서울", "부산", "35.1", "129.0"),
        ]);
        let summary = run_batch(&unthrottled_config(), &provider, &options).unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.success, 2);

        // Nothing matches anywhere.
        let provider = FakeProvider::new(&[(
            "서울 종로구 청운효자동",
            "청운효자동, 종로구, 서울",
            "37.58",
            "126.97",
        )]);
        let options = BatchOptions {
            fresh: true,
            ..options
        };
        let summary = run_batch(&unthrottled_config(), &provider, &options).unwrap();
        assert_eq!(summary.success, 1);
        assert_eq!(summary.failed, 1);
        let stations = output(&options);
        assert_eq!(stations[0].coordinates.lat, 37.58);
        assert_eq!(stations[0].geocode_attempt, Some(1));
        assert_eq!(stations[1].id, "station_2");
        assert_eq!(stations[1].coordinates, DEFAULT_FALLBACK);
        assert!(stations[1].geocoded_address.is_none());
        assert!(options.output_dir.join(STATS_FILE).exists());

        let (manifest, _) = Checkpoint::new(&options.output_dir).load().unwrap().unwrap();
        assert!(manifest.complete);
        assert_eq!(manifest.processed, 2);
    }

    #[test]
    fn duplicate_addresses_are_resolved_once() {
        let (_dir, options) = setup(&[
            "서울,종로구,청운효자동,A",
            "서울,종로구,청운효자동,B",
            "서울,종로구,청운효자동,C",
        ]);
        let provider = FakeProvider::new(&[(
            "서울 종로구 청운효자동",
            "청운효자동, 종로구, 서울",
            "37.58",
            "126.97",
        )]);
        let summary = run_batch(&unthrottled_config(), &provider, &options).unwrap();
        assert_eq!(summary.success, 3);
        assert_eq!(summary.lookups, 1);
        assert_eq!(provider.query_count(), 1);
    }

    #[test]
    fn station_range() {
        let (_dir, mut options) = setup(&[
            "서울,종로구,청운효자동,A",
            "서울,종로구,사직동,B",
            "서울,중구,소공동,C",
        ]);
        options.start = Some(2);
        options.end = Some(3);
        let provider = FakeProvider::new(&[]);
        run_batch(&unthrottled_config(), &provider, &options).unwrap();
        let ids: Vec<String> = output(&options).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["station_2".to_string(), "station_3".to_string()]);

        options.end = Some(4);
        assert!(matches!(
            run_batch(&unthrottled_config(), &provider, &options),
            Err(GeoError::InvalidRange { .. })
        ));
    }

    #[test]
    fn resume_from_checkpoint() {
        let (_dir, options) = setup(&[
            "서울,종로구,청운효자동,A",
            "서울,종로구,사직동,B",
            "서울,중구,소공동,C",
        ]);
        let sha = file_sha256(&options.input).unwrap();
        let done: Vec<PollingStation> = ["A", "B"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let row = io_common::StationRow {
                    name: Some(format!("{} (checkpoint)", name)),
                    province: "서울".to_string(),
                    district: "종로구".to_string(),
                    neighborhood: "청운효자동".to_string(),
                };
                PollingStation::from_row(i + 1, &row, DEFAULT_FALLBACK, "now")
            })
            .collect();
        let checkpoint = Checkpoint::new(&options.output_dir);
        let manifest = CheckpointManifest {
            source_file: "list.csv".to_string(),
            source_sha256: sha,
            range_start: 1,
            range_end: 3,
            processed: 2,
            total: 3,
            updated_at: Utc::now(),
            snapshot: checkpoint.snapshot_path().display().to_string(),
            complete: false,
        };
        checkpoint.save(&manifest, &done).unwrap();

        let provider = FakeProvider::new(&[("서울 중구 소공동", "소공동, 중구, 서울", "37.56", "126.98")]);
        let summary = run_batch(&unthrottled_config(), &provider, &options).unwrap();
        assert_eq!(summary.resumed_from, 2);
        assert_eq!(summary.lookups, 1);
        assert_eq!(provider.query_count(), 1);
        let stations = output(&options);
        assert_eq!(stations.len(), 3);
        assert_eq!(stations[0].name, "A (checkpoint)");
        assert_eq!(stations[2].id, "station_3");
        assert!(stations[2].is_geocoded());
    }

    #[test]
    fn checkpoint_of_another_file_is_refused() {
        let (_dir, mut options) = setup(&["서울,종로구,청운효자동,A"]);
        let checkpoint = Checkpoint::new(&options.output_dir);
        let manifest = CheckpointManifest {
            source_file: "list.csv".to_string(),
            source_sha256: "0000".to_string(),
            range_start: 1,
            range_end: 1,
            processed: 0,
            total: 1,
            updated_at: Utc::now(),
            snapshot: checkpoint.snapshot_path().display().to_string(),
            complete: false,
        };
        checkpoint.save(&manifest, &[]).unwrap();
        let provider = FakeProvider::new(&[]);
        assert!(matches!(
            run_batch(&unthrottled_config(), &provider, &options),
            Err(GeoError::CheckpointMismatch { .. })
        ));
        options.fresh = true;
        assert!(run_batch(&unthrottled_config(), &provider, &options).is_ok());
    }

    #[test]
    fn interrupted_run_resumes_from_periodic_checkpoint() {
        let (_dir, options) = setup(&[
            "서울,종로구,청운효자동,A",
            "서울,종로구,사직동,B",
            "서울,중구,소공동,C",
        ]);
        let mut config = unthrottled_config();
        config.output.checkpoint_every = Some(2);
        // A directory in place of the final output makes the end of the run fail.
        let blocker = options.output_dir.join(STATIONS_FILE);
        fs::create_dir_all(&blocker).unwrap();

        let provider = FakeProvider::new(&[]);
        assert!(run_batch(&config, &provider, &options).is_err());
        let (manifest, stations) = Checkpoint::new(&options.output_dir).load().unwrap().unwrap();
        assert_eq!(manifest.processed, 2);
        assert!(!manifest.complete);
        assert_eq!(stations.len(), 2);

        fs::remove_dir_all(&blocker).unwrap();
        let provider = FakeProvider::new(&[("서울 중구 소공동", "소공동, 중구, 서울", "37.56", "126.98")]);
        let summary = run_batch(&config, &provider, &options).unwrap();
        assert_eq!(summary.resumed_from, 2);
        assert_eq!(summary.processed, 3);
        assert_eq!(provider.query_count(), 1);
        let (manifest, _) = Checkpoint::new(&options.output_dir).load().unwrap().unwrap();
        assert!(manifest.complete);
        assert_eq!(manifest.processed, 3);
    }

    #[test]
    fn failed_write_leaves_error_backup() {
        let (_dir, options) = setup(&["서울,종로구,청운효자동,A", "서울,중구,소공동,B"]);
        fs::create_dir_all(options.output_dir.join(STATIONS_FILE)).unwrap();
        let provider = FakeProvider::new(&[(
            "서울 종로구 청운효자동",
            "청운효자동, 종로구, 서울",
            "37.58",
            "126.97",
        )]);
        let res = run_batch(&unthrottled_config(), &provider, &options);
        assert!(matches!(res, Err(GeoError::WritingFile { .. })));

        let backup = read_stations(&options.output_dir.join(ERROR_BACKUP_FILE)).unwrap();
        assert_eq!(backup.len(), 2);
        assert!(backup[0].is_geocoded());
        assert_eq!(backup[1].id, "station_2");
        assert!(!backup[1].is_geocoded());
    }

    #[test]
    fn reprocess_only_failed_stations() {
        let dir = tempfile::tempdir().unwrap();
        let row = |n: &str| io_common::StationRow {
            name: Some(n.to_string()),
            province: "서울".to_string(),
            district: "종로구".to_string(),
            neighborhood: "청운제1동".to_string(),
        };
        let mut ok = PollingStation::from_row(1, &row("A"), DEFAULT_FALLBACK, "now");
        ok.geocoded_address = Some("somewhere".to_string());
        let failed = PollingStation::from_row(2, &row("B"), DEFAULT_FALLBACK, "now");
        let input = dir.path().join("stations.json");
        write_stations(&input, &[ok, failed]).unwrap();

        let provider = FakeProvider::new(&[("서울 종로구", "종로구, 서울", "37.57", "126.98")]);
        let out = dir.path().join("reprocessed.json");
        let summary = reprocess_failed(&unthrottled_config(), &provider, &input, &out).unwrap();
        assert_eq!(
            summary,
            ReprocessSummary {
                reprocessed: 1,
                new_successes: 1,
                still_failed: 0,
            }
        );
        // The original and the normalized variants failed first.
        assert_eq!(
            *provider.queries.borrow(),
            vec![
                "서울 종로구 청운제1동".to_string(),
                "서울 종로구 청운동".to_string(),
                "서울 종로구".to_string(),
            ]
        );
        let stations = read_stations(&out).unwrap();
        assert!(!stations[0].reprocessed);
        assert!(stations[1].reprocessed);
        assert_eq!(stations[1].geocode_attempt, Some(3));
        assert_eq!(stations[1].coordinates.lat, 37.57);
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(7260)), "2h 1m");
    }
}
