// CSV/TSV import

use tally_recon::table::is_blank_row;
use tally_recon::{Cell, RawSheet, Row};

use crate::error::IngestError;

/// Decode CSV bytes and split them into rows. Carriage returns and blank rows
/// are dropped.
pub fn import(bytes: &[u8], file: &str) -> Result<RawSheet, IngestError> {
    let content = decode_text(bytes).replace('\r', "");
    let delimiter = sniff_delimiter(&content);
    log::debug!("{file}: delimiter {:?}", delimiter as char);
    import_from_string(&content, delimiter, file)
}

/// Pick the delimiter among comma, semicolon and tab that yields the most
/// fields over the first three lines. Ties keep the earlier candidate, so a
/// single-column file reads as comma separated.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content.lines().take(3).collect();

    let mut best = b',';
    let mut best_total = 0usize;
    for delim in [b',', b';', b'\t'] {
        let total: usize = sample
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map_or(0, |r| r.len())
            })
            .sum();
        if total > best_total {
            best_total = total;
            best = delim;
        }
    }
    best
}

/// Decode bytes as UTF-8, falling back to EUC-KR (legacy Korean Excel exports).
/// A leading byte-order mark is removed.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            // EUC_KR.decode also honours a BOM if one is present.
            let (decoded, _, had_errors) = encoding_rs::EUC_KR.decode(bytes);
            if had_errors {
                log::warn!("input is neither UTF-8 nor EUC-KR; undecodable bytes replaced");
            }
            decoded.into_owned()
        }
    };
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

fn import_from_string(content: &str, delimiter: u8, file: &str) -> Result<RawSheet, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows: Vec<Row> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| IngestError::Unreadable {
            file: file.to_string(),
            message: e.to_string(),
        })?;
        let row: Row = record.iter().map(Cell::from).collect();
        if !is_blank_row(&row) {
            rows.push(row);
        }
    }

    Ok(RawSheet::new(sheet_name(file), rows))
}

/// File stem, used as the sheet name of a CSV.
fn sheet_name(file: &str) -> String {
    std::path::Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string())
}
