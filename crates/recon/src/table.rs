//! Rectangular table model shared by the ingestor and the engine.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Cells and rows
// ---------------------------------------------------------------------------

/// A raw cell value as handed back by a CSV parser or a spreadsheet decoder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Display form of the cell. Integral numbers render without a decimal
    /// point so `1012345678.0` reads the same as the text `"1012345678"`.
    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s)
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One row of raw cells. Rows of the same table may differ in length.
pub type Row = Vec<Cell>;

/// Read a cell by index; ragged rows read missing cells as empty.
pub fn cell(row: &Row, idx: usize) -> &Cell {
    static EMPTY: Cell = Cell::Empty;
    row.get(idx).unwrap_or(&EMPTY)
}

pub fn is_blank_row(row: &Row) -> bool {
    row.iter().all(Cell::is_blank)
}

// ---------------------------------------------------------------------------
// Sheets and tables
// ---------------------------------------------------------------------------

/// Every row of one sheet (or one CSV file), blank rows already removed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Row>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// Where a table came from, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub file: String,
    pub sheet: String,
    pub header_row: usize,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] header row {}", self.file, self.sheet, self.header_row)
    }
}

/// A header row plus the body rows beneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: Row,
    pub body: Vec<Row>,
    pub provenance: Provenance,
}

impl Table {
    /// Treat `header_row` of the sheet as the header and every later row as body.
    /// A header index past the end yields an empty header and body.
    pub fn from_sheet(file: &str, sheet: &RawSheet, header_row: usize) -> Self {
        let header = sheet.rows.get(header_row).cloned().unwrap_or_default();
        let body = sheet
            .rows
            .iter()
            .skip(header_row + 1)
            .filter(|r| !is_blank_row(r))
            .cloned()
            .collect();
        Self {
            header,
            body,
            provenance: Provenance {
                file: file.to_string(),
                sheet: sheet.name.clone(),
                header_row,
            },
        }
    }

    /// Widest row in the table (header included).
    pub fn width(&self) -> usize {
        self.body
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_display_without_decimal() {
        assert_eq!(Cell::Number(1012345678.0).display(), "1012345678");
        assert_eq!(Cell::Number(12.5).display(), "12.5");
        assert_eq!(Cell::Empty.display(), "");
    }

    #[test]
    fn ragged_rows_read_missing_cells_as_empty() {
        let row: Row = vec!["a".into()];
        assert_eq!(cell(&row, 0), &Cell::Text("a".into()));
        assert_eq!(cell(&row, 5), &Cell::Empty);
    }

    #[test]
    fn from_sheet_splits_header_and_drops_blank_rows() {
        let sheet = RawSheet::new(
            "Sheet1",
            vec![
                vec!["title".into()],
                vec!["name".into(), "phone".into()],
                vec!["kim".into(), "01011112222".into()],
                vec![Cell::Empty, Cell::Text("  ".into())],
                vec!["lee".into()],
            ],
        );
        let table = Table::from_sheet("a.xlsx", &sheet, 1);
        assert_eq!(table.header, vec![Cell::from("name"), Cell::from("phone")]);
        assert_eq!(table.body.len(), 2);
        assert_eq!(table.provenance.header_row, 1);
        assert_eq!(table.width(), 2);
    }
}
