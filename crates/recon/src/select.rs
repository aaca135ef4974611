//! Table selector: pick the sheet and header row that best hold the fields we need.
//!
//! Exports often carry a title block, merged banners, or several sheets. Each row
//! near the top of each sheet is tried as a header; candidates that name every
//! required field are scored by how well the rows beneath them fill those fields.

use std::collections::BTreeMap;

use crate::locate::{header_match, looks_like_header, ColumnRule, FieldKind, Locator};
use crate::table::{cell, is_blank_row, Provenance, RawSheet, Row, Table};

const PHONE_WEIGHT: u64 = 100_000;
const FIELD_WEIGHT: u64 = 100;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub table: Table,
    /// Header-matched column per required field.
    pub columns: BTreeMap<FieldKind, usize>,
    /// Sampled body rows whose cell fits each field.
    pub fills: BTreeMap<FieldKind, usize>,
    pub score: u64,
}

/// Best candidate across every sheet, or `None` when no header row names all
/// of `required`. Ties keep the earliest sheet and row.
pub fn select_table(
    file: &str,
    sheets: &[RawSheet],
    required: &[FieldKind],
    rules: &BTreeMap<FieldKind, ColumnRule>,
    locator: &Locator<'_>,
) -> Option<Candidate> {
    let synonyms: Vec<(FieldKind, Vec<String>)> = required
        .iter()
        .map(|&k| (k, rules.get(&k).cloned().unwrap_or_default().synonyms(k)))
        .collect();

    let mut best: Option<Candidate> = None;
    for sheet in sheets {
        let scan = sheet.rows.len().min(locator.settings.header_scan_rows);
        for header_row in 0..scan {
            let Some(columns) = match_header(&sheet.rows[header_row], &synonyms) else {
                continue;
            };
            let rest = &sheet.rows[header_row + 1..];
            let (fills, score) = score_body(rest, &columns, &synonyms, locator);

            log::debug!(
                "{file} [{}] header row {header_row}: score {score}",
                sheet.name
            );

            if best.as_ref().map_or(true, |b| score > b.score) {
                let body: Vec<Row> = rest
                    .iter()
                    .filter(|r| is_data_row(r, &columns, &synonyms))
                    .cloned()
                    .collect();
                best = Some(Candidate {
                    table: Table {
                        header: sheet.rows[header_row].clone(),
                        body,
                        provenance: Provenance {
                            file: file.to_string(),
                            sheet: sheet.name.clone(),
                            header_row,
                        },
                    },
                    columns,
                    fills,
                    score,
                });
            }
        }
    }
    best
}

fn match_header(
    row: &Row,
    synonyms: &[(FieldKind, Vec<String>)],
) -> Option<BTreeMap<FieldKind, usize>> {
    synonyms
        .iter()
        .map(|(kind, syn)| header_match(row, syn).map(|idx| (*kind, idx)))
        .collect()
}

/// Neither blank nor a header repeated on every printed page.
fn is_data_row(
    row: &Row,
    columns: &BTreeMap<FieldKind, usize>,
    synonyms: &[(FieldKind, Vec<String>)],
) -> bool {
    !is_blank_row(row)
        && !synonyms
            .iter()
            .any(|(kind, syn)| looks_like_header(cell(row, columns[kind]), syn))
}

fn score_body(
    rows: &[Row],
    columns: &BTreeMap<FieldKind, usize>,
    synonyms: &[(FieldKind, Vec<String>)],
    locator: &Locator<'_>,
) -> (BTreeMap<FieldKind, usize>, u64) {
    let mut fills: BTreeMap<FieldKind, usize> = columns.keys().map(|&k| (k, 0)).collect();
    let mut data_rows = 0u64;

    for row in rows.iter().filter(|r| is_data_row(r, columns, synonyms)) {
        data_rows += 1;
        if data_rows as usize > locator.settings.score_sample_rows {
            continue;
        }
        for (&kind, &col) in columns {
            let value = cell(row, col);
            let filled = locator.fits(kind, value).unwrap_or(!value.is_blank());
            if filled {
                *fills.entry(kind).or_default() += 1;
            }
        }
    }

    let score = fills
        .iter()
        .map(|(&kind, &n)| {
            let weight = if kind == FieldKind::Phone { PHONE_WEIGHT } else { FIELD_WEIGHT };
            n as u64 * weight
        })
        .sum::<u64>()
        + data_rows;
    (fills, score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::LocatorSettings;
    use crate::normalize::PhoneLocale;
    use crate::table::Cell;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|s| Cell::from(*s)).collect()
    }

    fn select(sheets: &[RawSheet], required: &[FieldKind]) -> Option<Candidate> {
        let locale = PhoneLocale::default();
        let settings = LocatorSettings::default();
        let locator = Locator::new(&locale, &settings);
        select_table("book.xlsx", sheets, required, &BTreeMap::new(), &locator)
    }

    #[test]
    fn title_block_is_skipped() {
        let sheet = RawSheet::new(
            "결제내역",
            vec![
                row(&["2024년 3월 결제 내역"]),
                row(&["출력일: 2024-04-01"]),
                row(&["이름", "전화번호", "결제금액"]),
                row(&["kim", "010-1111-2222", "50,000"]),
                row(&["lee", "010-3333-4444", "30,000"]),
            ],
        );
        let best = select(&[sheet], &[FieldKind::Phone, FieldKind::Amount]).unwrap();
        assert_eq!(best.table.provenance.header_row, 2);
        assert_eq!(best.columns[&FieldKind::Phone], 1);
        assert_eq!(best.columns[&FieldKind::Amount], 2);
        assert_eq!(best.fills[&FieldKind::Phone], 2);
        assert_eq!(best.table.body.len(), 2);
    }

    #[test]
    fn fuller_sheet_wins() {
        let summary = RawSheet::new(
            "요약",
            vec![row(&["전화번호", "결제금액"]), row(&["합계", "80,000"])],
        );
        let detail = RawSheet::new(
            "상세",
            vec![
                row(&["전화번호", "결제금액"]),
                row(&["010-1111-2222", "50,000"]),
                row(&["010-3333-4444", "30,000"]),
            ],
        );
        let best = select(&[summary, detail], &[FieldKind::Phone, FieldKind::Amount]).unwrap();
        assert_eq!(best.table.provenance.sheet, "상세");
        assert_eq!(best.score, 2 * PHONE_WEIGHT + 2 * FIELD_WEIGHT + 2);
    }

    #[test]
    fn repeated_header_rows_do_not_score() {
        let sheet = RawSheet::new(
            "s",
            vec![
                row(&["전화번호", "결제금액"]),
                row(&["010-1111-2222", "50,000"]),
                row(&["전화번호", "결제금액"]),
                row(&["010-3333-4444", "30,000"]),
            ],
        );
        let best = select(&[sheet], &[FieldKind::Phone, FieldKind::Amount]).unwrap();
        assert_eq!(best.table.provenance.header_row, 0);
        assert_eq!(best.fills[&FieldKind::Phone], 2);
    }

    #[test]
    fn repeated_header_rows_leave_the_body() {
        let sheet = RawSheet::new(
            "s",
            vec![
                row(&["이름", "전화번호", "결제금액"]),
                row(&["kim", "010-1111-2222", "50,000"]),
                row(&[]),
                row(&["이름", "전화번호", "결제금액"]),
                row(&["lee", "010-3333-4444", "30,000"]),
            ],
        );
        let best = select(&[sheet], &[FieldKind::Phone, FieldKind::Amount]).unwrap();
        let phones: Vec<String> = best.table.body.iter().map(|r| cell(r, 1).display()).collect();
        assert_eq!(phones, ["010-1111-2222", "010-3333-4444"]);
        assert_eq!(best.score, 2 * PHONE_WEIGHT + 2 * FIELD_WEIGHT + 2);
    }

    #[test]
    fn ties_keep_the_earliest_candidate() {
        let a = RawSheet::new("a", vec![row(&["phone"]), row(&["010-1111-2222"])]);
        let b = RawSheet::new("b", vec![row(&["phone"]), row(&["010-1111-2222"])]);
        let best = select(&[a, b], &[FieldKind::Phone]).unwrap();
        assert_eq!(best.table.provenance.sheet, "a");
    }

    #[test]
    fn missing_field_yields_none() {
        let sheet = RawSheet::new("s", vec![row(&["이름", "전화번호"]), row(&["kim", "01011112222"])]);
        assert!(select(&[sheet], &[FieldKind::Phone, FieldKind::Amount]).is_none());
    }
}
