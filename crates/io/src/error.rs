use std::fmt;

/// A file could not be turned into sheets. Fatal for that file only.
#[derive(Debug)]
pub enum IngestError {
    /// Extension is neither CSV nor a spreadsheet format.
    UnsupportedExtension(String),
    /// CSV bytes could not be parsed into records.
    Unreadable { file: String, message: String },
    /// Spreadsheet container could not be opened or a sheet could not be read.
    Workbook { file: String, message: String },
    /// Workbook opened but holds no sheets.
    NoSheets(String),
    /// Reading or writing a file failed.
    Io { path: String, message: String },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedExtension(file) => {
                write!(f, "{file}: unsupported file type (expected .csv, .tsv, .xlsx, .xls, .xlsb, .ods)")
            }
            Self::Unreadable { file, message } => write!(f, "{file}: cannot parse: {message}"),
            Self::Workbook { file, message } => write!(f, "{file}: cannot read workbook: {message}"),
            Self::NoSheets(file) => write!(f, "{file}: workbook contains no sheets"),
            Self::Io { path, message } => write!(f, "{path}: {message}"),
        }
    }
}

impl std::error::Error for IngestError {}
