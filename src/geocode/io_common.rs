use crate::geocode::*;

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;

/// One station as read from the input spreadsheet, before geocoding.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct StationRow {
    pub name: Option<String>,
    pub province: String,
    pub district: String,
    pub neighborhood: String,
}

/// Positions of the configured columns in a header row.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnIndexes {
    pub name: Vec<usize>,
    pub province: usize,
    pub district: usize,
    pub neighborhood: usize,
}

impl ColumnIndexes {
    /// Builds a row from a cell accessor. Missing cells read as empty strings.
    pub fn row_from<F>(&self, cell: F) -> StationRow
    where
        F: Fn(usize) -> String,
    {
        let name = self
            .name
            .iter()
            .map(|idx| cell(*idx))
            .find(|s| !s.is_empty());
        StationRow {
            name,
            province: cell(self.province),
            district: cell(self.district),
            neighborhood: cell(self.neighborhood),
        }
    }
}

impl StationRow {
    pub fn is_blank(&self) -> bool {
        self.name.is_none()
            && self.province.is_empty()
            && self.district.is_empty()
            && self.neighborhood.is_empty()
    }
}

pub fn locate_columns(
    header: &[String],
    columns: &ColumnNames,
    path: &str,
) -> GeoResult<ColumnIndexes> {
    let find = |column: &String| -> GeoResult<usize> {
        header
            .iter()
            .position(|h| h == column)
            .context(MissingColumnSnafu {
                column: column.clone(),
                path,
            })
    };
    // The name columns are optional: stations get a generated name.
    let name: Vec<usize> = columns
        .name
        .iter()
        .filter_map(|c| header.iter().position(|h| h == c))
        .collect();
    let res = ColumnIndexes {
        name,
        province: find(&columns.province)?,
        district: find(&columns.district)?,
        neighborhood: find(&columns.neighborhood)?,
    };
    debug!("locate_columns: {:?} -> {:?}", header, res);
    Ok(res)
}

/// Header cells, trimmed and without a leading byte-order mark.
pub fn clean_header(cell: &str) -> String {
    cell.trim_start_matches('\u{feff}').trim().to_string()
}

/// Reads the stations of a spreadsheet, skipping blank rows.
pub fn read_rows(path: &Path, settings: &InputSettings) -> GeoResult<Vec<StationRow>> {
    let provider = settings.provider_for(path)?;
    info_read(path, provider);
    let path_s = path.display().to_string();
    let rows = match provider {
        InputProvider::Xlsx => io_excel::read_excel_rows(&path_s, settings)?,
        InputProvider::Csv => io_csv::read_csv_rows(&path_s, settings)?,
    };
    Ok(rows.into_iter().filter(|r| !r.is_blank()).collect())
}

fn info_read(path: &Path, provider: InputProvider) {
    log::info!("Attempting to read station file {:?} ({:?})", path, provider);
}

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> GeoResult<T> {
    let path_s = path.display().to_string();
    let contents = fs::read_to_string(path).context(ReadingFileSnafu {
        path: path_s.clone(),
    })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path: path_s })
}

/// Writes pretty JSON through a temporary file, so that an interrupted write
/// never leaves a truncated file behind.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> GeoResult<()> {
    let path_s = path.display().to_string();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(WritingFileSnafu {
                path: parent.display().to_string(),
            })?;
        }
    }
    let js = serde_json::to_string_pretty(value).context(SerializingJsonSnafu {})?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, js).context(WritingFileSnafu {
        path: tmp.display().to_string(),
    })?;
    fs::rename(&tmp, path).context(WritingFileSnafu { path: path_s })?;
    Ok(())
}
