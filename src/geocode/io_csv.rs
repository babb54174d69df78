// Primitives for reading CSV files.

use log::debug;

use crate::geocode::io_common::{clean_header, locate_columns, StationRow};
use crate::geocode::*;

pub fn read_csv_rows(path: &str, settings: &InputSettings) -> GeoResult<Vec<StationRow>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.into_records();

    let header: Vec<String> = match records.next() {
        Some(line_r) => line_r
            .context(CsvLineParseSnafu { lineno: 1_usize })?
            .iter()
            .map(clean_header)
            .collect(),
        None => return EmptySheetSnafu { path }.fail(),
    };
    debug!("read_csv_rows: header: {:?}", header);
    let indexes = locate_columns(&header, &settings.columns(), path)?;

    let mut res: Vec<StationRow> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let station = indexes.row_from(|i| line.get(i).unwrap_or("").to_string());
        res.push(station);
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn read_station_list() {
        let f = csv_file(
            "\u{feff}시도,구시군명,읍면동명,사전투표소명\n\
             서울, 종로구 ,청운효자동,청운효자동 사전투표소\n\
             ,,,\n\
             부산,중구,중앙동\n",
        );
        let path = f.path().display().to_string();
        let rows = read_csv_rows(&path, &InputSettings::default()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].district, "종로구");
        assert_eq!(rows[0].name.as_deref(), Some("청운효자동 사전투표소"));
        assert!(rows[1].is_blank());
        // Short lines are accepted, the missing cells are empty.
        assert_eq!(rows[2].neighborhood, "중앙동");
        assert_eq!(rows[2].name, None);

        let read = io_common::read_rows(f.path(), &InputSettings::default()).unwrap();
        assert_eq!(read.len(), 2);
    }

    #[test]
    fn empty_file() {
        let f = csv_file("");
        let path = f.path().display().to_string();
        let res = read_csv_rows(&path, &InputSettings::default());
        assert!(matches!(res, Err(GeoError::EmptySheet { .. })));
    }
}
