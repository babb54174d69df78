// Reading station lists from Excel workbooks.

use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::debug;

use crate::geocode::io_common::{clean_header, locate_columns, StationRow};
use crate::geocode::*;

pub fn read_excel_rows(path: &str, settings: &InputSettings) -> GeoResult<Vec<StationRow>> {
    let wrange = get_range(path, settings)?;

    let mut iter = wrange.rows();
    let header: Vec<String> = iter
        .next()
        .context(EmptySheetSnafu { path })?
        .iter()
        .map(|c| clean_header(&cell_to_string(c)))
        .collect();
    debug!("read_excel_rows: header: {:?}", header);
    let indexes = locate_columns(&header, &settings.columns(), path)?;

    let mut res: Vec<StationRow> = Vec::new();
    for row in iter {
        let station = indexes.row_from(|idx| row.get(idx).map(cell_to_string).unwrap_or_default());
        res.push(station);
    }
    debug!("read_excel_rows: {} rows read from {}", res.len(), path);
    Ok(res)
}

fn get_range(path: &str, settings: &InputSettings) -> GeoResult<calamine::Range<DataType>> {
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, &settings.worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    match &settings.worksheet_name {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { name, path })?
            .context(OpeningExcelSnafu { path }),
        // Station lists come with a single sheet: take the first one.
        None => workbook
            .worksheet_range_at(0)
            .context(EmptySheetSnafu { path })?
            .context(OpeningExcelSnafu { path }),
    }
}

/// Text of a cell. Codes stored as numbers come back without a trailing `.0`.
fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::Empty => "".to_string(),
        x => x.to_string(),
    }
}
