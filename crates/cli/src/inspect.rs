//! `tally inspect`: which sheet, header row and columns a file resolves to.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;

use serde::Serialize;
use tally_recon::locate::{ColumnRule, LocatorSettings, Strategy};
use tally_recon::select::select_table;
use tally_recon::table::{cell, Provenance};
use tally_recon::{FieldKind, InputFile, Locator, PhoneLocale, ReconError};

use crate::exit_codes::EXIT_RECON_RUNTIME;
use crate::CliError;

#[derive(Debug, Serialize)]
pub struct SheetInfo {
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Serialize)]
pub struct ColumnInfo {
    pub field: FieldKind,
    pub index: usize,
    pub header: String,
    pub strategy: Strategy,
}

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub file: String,
    pub sheets: Vec<SheetInfo>,
    pub required: Vec<FieldKind>,
    pub selected: Provenance,
    pub body_rows: usize,
    pub score: u64,
    pub fills: BTreeMap<FieldKind, usize>,
    pub columns: Vec<ColumnInfo>,
}

/// Run the table selector with default rules, then locate every field on the
/// chosen table.
pub fn inspect(input: &InputFile, required: &[FieldKind]) -> Result<InspectReport, ReconError> {
    let locale = PhoneLocale::default();
    let settings = LocatorSettings::default();
    let locator = Locator::new(&locale, &settings);
    let rules: BTreeMap<FieldKind, ColumnRule> = BTreeMap::new();

    let candidate = select_table(&input.file, &input.sheets, required, &rules, &locator)
        .ok_or_else(|| ReconError::NoTableFound {
            table: input.file.clone(),
            required: required.to_vec(),
        })?;
    let table = &candidate.table;

    let mut columns = Vec::new();
    let mut taken: Vec<usize> = Vec::new();
    for kind in FieldKind::ALL {
        let Some(found) = locator.locate(table, kind, &ColumnRule::default(), None, &taken) else {
            continue;
        };
        taken.push(found.index);
        columns.push(ColumnInfo {
            field: kind,
            index: found.index,
            header: cell(&table.header, found.index).display(),
            strategy: found.strategy,
        });
    }

    Ok(InspectReport {
        file: input.file.clone(),
        sheets: input
            .sheets
            .iter()
            .map(|s| SheetInfo {
                name: s.name.clone(),
                rows: s.rows.len(),
            })
            .collect(),
        required: required.to_vec(),
        selected: table.provenance.clone(),
        body_rows: table.body.len(),
        score: candidate.score,
        fills: candidate.fills,
        columns,
    })
}

fn report_text(report: &InspectReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", report.file);
    for sheet in &report.sheets {
        let marker = if sheet.name == report.selected.sheet { "*" } else { " " };
        let _ = writeln!(out, " {marker} {} ({} rows)", sheet.name, sheet.rows);
    }
    let _ = writeln!(
        out,
        "selected: [{}] header row {}, {} body rows, score {}",
        report.selected.sheet, report.selected.header_row, report.body_rows, report.score
    );
    for (kind, n) in &report.fills {
        let _ = writeln!(out, "  fill {kind}: {n}");
    }
    for col in &report.columns {
        let _ = writeln!(
            out,
            "  {:<10} column {:<3} {:<8} \"{}\"",
            col.field.as_str(),
            col.index,
            col.strategy.to_string(),
            col.header
        );
    }
    out
}

pub fn cmd_inspect(file: PathBuf, require: Vec<FieldKind>, json: bool) -> Result<(), CliError> {
    let input = tally_io::ingest_path(&file).map_err(CliError::ingest)?;
    let report = inspect(&input, &require).map_err(CliError::recon)?;

    if json {
        let json_str = serde_json::to_string_pretty(&report).map_err(|e| {
            CliError::new(EXIT_RECON_RUNTIME, format!("JSON serialization error: {e}"))
        })?;
        println!("{json_str}");
    } else {
        print!("{}", report_text(&report));
    }
    Ok(())
}
