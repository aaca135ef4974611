// File ingestion and result export

pub mod csv;
pub mod error;
pub mod export;
pub mod xlsx;

use std::path::Path;

use tally_recon::InputFile;

pub use error::IngestError;

/// Container format, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Workbook,
}

impl FileKind {
    pub fn from_name(file: &str) -> Result<Self, IngestError> {
        let ext = Path::new(file)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Ok(Self::Csv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(Self::Workbook),
            _ => Err(IngestError::UnsupportedExtension(file.to_string())),
        }
    }
}

/// Decode one file's bytes into sheets. `file` names the file in diagnostics
/// and picks the format.
pub fn ingest(bytes: &[u8], file: &str) -> Result<InputFile, IngestError> {
    let sheets = match FileKind::from_name(file)? {
        FileKind::Csv => vec![csv::import(bytes, file)?],
        FileKind::Workbook => xlsx::import(bytes, file)?,
    };
    log::info!(
        "{file}: {} sheet(s), {} rows",
        sheets.len(),
        sheets.iter().map(|s| s.rows.len()).sum::<usize>()
    );
    Ok(InputFile {
        file: file.to_string(),
        sheets,
    })
}

pub fn ingest_path(path: &Path) -> Result<InputFile, IngestError> {
    let bytes = std::fs::read(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    ingest(&bytes, &name)
}
