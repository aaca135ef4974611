// Result export: spreadsheet-safe CSV and HTML-table .xls
//
// Both formats keep phone numbers as text so a leading zero survives reopening.

use std::path::Path;

use tally_recon::OutputRow;

use crate::error::IngestError;

pub const EXPORT_HEADER: [&str; 7] = ["이름", "이메일", "전화번호", "유입경로", "금액", "기수", "가입일"];

/// Index of the phone column in `EXPORT_HEADER`.
const PHONE_COL: usize = 2;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn record(row: &OutputRow) -> [String; 7] {
    [
        row.name.clone(),
        row.email.clone(),
        row.phone.clone(),
        row.category.clone(),
        row.amount_display.clone(),
        row.batch.clone().unwrap_or_default(),
        row.join_date.clone(),
    ]
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// UTF-8 CSV with a byte-order mark. Phones get a leading `'` so spreadsheet
/// viewers read them as text.
pub fn csv_bytes(rows: &[OutputRow]) -> Result<Vec<u8>, IngestError> {
    let err = |e: String| IngestError::Io {
        path: "<csv>".into(),
        message: e,
    };

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(UTF8_BOM.to_vec());

    writer.write_record(EXPORT_HEADER).map_err(|e| err(e.to_string()))?;
    for row in rows {
        let mut fields = record(row);
        if !fields[PHONE_COL].is_empty() {
            fields[PHONE_COL] = format!("'{}", fields[PHONE_COL]);
        }
        writer.write_record(&fields).map_err(|e| err(e.to_string()))?;
    }

    writer.into_inner().map_err(|e| err(e.to_string()))
}

pub fn write_csv(path: &Path, rows: &[OutputRow]) -> Result<(), IngestError> {
    let bytes = csv_bytes(rows)?;
    write_file(path, &bytes)
}

// ---------------------------------------------------------------------------
// XLS (HTML table)
// ---------------------------------------------------------------------------

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// HTML table that spreadsheet apps open as a legacy .xls. The phone cell is
/// flagged text-formatted.
pub fn xls_html(title: &str, rows: &[OutputRow]) -> String {
    let mut html = String::new();
    html.push_str("<!doctype html><html><head><meta charset=\"UTF-8\"><title>");
    html.push_str(&escape(title));
    html.push_str("</title></head><body><table border=\"1\"><tr>");
    for h in EXPORT_HEADER {
        html.push_str(&format!("<th>{}</th>", escape(h)));
    }
    html.push_str("</tr>");

    for row in rows {
        html.push_str("<tr>");
        for (i, value) in record(row).iter().enumerate() {
            if i == PHONE_COL {
                html.push_str(&format!(
                    "<td style=\"mso-number-format:'\\@'\">{}</td>",
                    escape(value)
                ));
            } else {
                html.push_str(&format!("<td>{}</td>", escape(value)));
            }
        }
        html.push_str("</tr>");
    }

    html.push_str("</table></body></html>");
    html
}

pub fn write_xls(path: &Path, title: &str, rows: &[OutputRow]) -> Result<(), IngestError> {
    write_file(path, xls_html(title, rows).as_bytes())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), IngestError> {
    std::fs::write(path, bytes).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
