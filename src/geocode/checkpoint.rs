//! Partial results of a batch, and the manifest telling which input they belong to.

use crate::geocode::io_common::{read_json, write_json};
use crate::geocode::*;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use snafu::{ensure, whatever};
use std::fs;

const CHECKPOINT_DIR: &str = "checkpoint";
const MANIFEST_FILE: &str = "manifest.json";
const SNAPSHOT_FILE: &str = "stations.partial.json";

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointManifest {
    #[serde(rename = "sourceFile")]
    pub source_file: String,
    #[serde(rename = "sourceSha256")]
    pub source_sha256: String,
    /// 1-based, inclusive.
    #[serde(rename = "rangeStart")]
    pub range_start: usize,
    #[serde(rename = "rangeEnd")]
    pub range_end: usize,
    /// Number of stations of the range already in the snapshot.
    pub processed: usize,
    pub total: usize,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    pub snapshot: String,
    pub complete: bool,
}

pub struct Checkpoint {
    dir: PathBuf,
}

pub fn file_sha256(path: &Path) -> GeoResult<String> {
    let bytes = fs::read(path).context(ReadingFileSnafu {
        path: path.display().to_string(),
    })?;
    Ok(sha256::digest(bytes.as_slice()))
}

impl Checkpoint {
    pub fn new(output_dir: &Path) -> Checkpoint {
        Checkpoint {
            dir: output_dir.join(CHECKPOINT_DIR),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Writes the snapshot, then the manifest pointing to it.
    pub fn save(
        &self,
        manifest: &CheckpointManifest,
        stations: &[PollingStation],
    ) -> GeoResult<()> {
        write_json(&self.snapshot_path(), stations)?;
        write_json(&self.manifest_path(), manifest)?;
        debug!(
            "save: checkpoint at {}/{} in {:?}",
            manifest.processed, manifest.total, self.dir
        );
        Ok(())
    }

    pub fn load(&self) -> GeoResult<Option<(CheckpointManifest, Vec<PollingStation>)>> {
        let manifest_path = self.manifest_path();
        if !manifest_path.exists() {
            return Ok(None);
        }
        let manifest: CheckpointManifest = read_json(&manifest_path)?;
        let stations = read_stations(&self.snapshot_path())?;
        Ok(Some((manifest, stations)))
    }

    /// The stations already processed for this input and range.
    ///
    /// A checkpoint written for another file or another range is an error,
    /// unless `fresh` is set, in which case it is discarded.
    pub fn resume(
        &self,
        source_sha256: &str,
        start: usize,
        end: usize,
        fresh: bool,
    ) -> GeoResult<Vec<PollingStation>> {
        if fresh {
            self.clear()?;
            return Ok(Vec::new());
        }
        let (manifest, mut stations) = match self.load()? {
            Some(x) => x,
            None => return Ok(Vec::new()),
        };
        let path = self.manifest_path().display().to_string();
        ensure!(
            manifest.source_sha256 == source_sha256,
            CheckpointMismatchSnafu {
                path,
                found: manifest.source_sha256,
                expected: source_sha256,
            }
        );
        ensure!(
            manifest.range_start == start && manifest.range_end == end,
            CheckpointRangeSnafu {
                path,
                found_start: manifest.range_start,
                found_end: manifest.range_end,
                start,
                end,
            }
        );
        if stations.len() < manifest.processed {
            whatever!(
                "The checkpoint snapshot holds {} stations, the manifest expects {}",
                stations.len(),
                manifest.processed
            );
        }
        if stations.len() > manifest.processed {
            warn!(
                "Snapshot is ahead of its manifest, dropping {} stations",
                stations.len() - manifest.processed
            );
            stations.truncate(manifest.processed);
        }
        info!(
            "Resuming from checkpoint of {}: {}/{} stations done",
            manifest.updated_at, manifest.processed, manifest.total
        );
        Ok(stations)
    }

    pub fn clear(&self) -> GeoResult<()> {
        if self.dir.exists() {
            info!("Discarding checkpoint in {:?}", self.dir);
            fs::remove_dir_all(&self.dir).context(WritingFileSnafu {
                path: self.dir.display().to_string(),
            })?;
        }
        Ok(())
    }
}
