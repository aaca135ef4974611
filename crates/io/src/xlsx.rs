// Spreadsheet import (xlsx, xls, xlsb, ods)
//
// Every sheet becomes a RawSheet of cells. Values only: formulas, formatting and
// merges are not carried over.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets};
use tally_recon::table::is_blank_row;
use tally_recon::{Cell, RawSheet, Row};

use crate::error::IngestError;

/// Rows read per sheet. Exports past this size are not spreadsheet-sized.
const MAX_ROWS: usize = 1_048_576;

pub fn import(bytes: &[u8], file: &str) -> Result<Vec<RawSheet>, IngestError> {
    let workbook_err = |message: String| IngestError::Workbook {
        file: file.to_string(),
        message,
    };

    let mut workbook: Sheets<_> = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| workbook_err(e.to_string()))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(IngestError::NoSheets(file.to_string()));
    }

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| workbook_err(format!("sheet '{sheet_name}': {e}")))?;

        // Range start offset (data may not begin at A1). Leading rows are blank
        // and dropped anyway; leading columns are padded so indices match the sheet.
        let (_, start_col) = range.start().unwrap_or((0, 0));

        let mut rows: Vec<Row> = Vec::new();
        for row in range.rows().take(MAX_ROWS) {
            let mut cells: Row = vec![Cell::Empty; start_col as usize];
            cells.extend(row.iter().map(cell_from_data));
            rows.push(cells);
        }

        let before = rows.len();
        rows.retain(|r| !is_blank_row(r));
        log::debug!(
            "{file} [{sheet_name}]: {} rows ({} blank dropped)",
            rows.len(),
            before - rows.len()
        );

        sheets.push(RawSheet::new(sheet_name.clone(), rows));
    }

    Ok(sheets)
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        // Error cells carry no usable value.
        Data::Error(_) => Cell::Empty,
        // Serial in the 1900 date system
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) => Cell::from(s.as_str()),
        Data::DurationIso(s) => Cell::from(s.as_str()),
    }
}
