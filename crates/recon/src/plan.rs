//! Resolve input files to tables and tables to a column plan.

use crate::config::{RunConfig, TableConfig, UnmatchedPolicy};
use crate::error::ReconError;
use crate::locate::{FieldKind, Located, Locator};
use crate::model::{
    ColumnChoice, ColumnPlan, InputFile, SourceColumns, SourceTable, TargetColumns,
};
use crate::select::select_table;
use crate::table::{cell, Table};

/// Pick the table of `input` described by `cfg`.
///
/// With `select_table` on, every sheet and header row is searched; otherwise row 0
/// of the first (or named) sheet is the header.
pub fn pick_table(
    role: &str,
    cfg: &TableConfig,
    input: &InputFile,
    default_required: &[FieldKind],
    locator: &Locator<'_>,
) -> Result<Table, ReconError> {
    let sheets = match &cfg.sheet {
        Some(name) => {
            let idx = input
                .sheets
                .iter()
                .position(|s| &s.name == name)
                .ok_or_else(|| ReconError::SheetNotFound {
                    table: role.to_string(),
                    sheet: name.clone(),
                })?;
            std::slice::from_ref(&input.sheets[idx])
        }
        None => input.sheets.as_slice(),
    };

    let required = cfg.require.clone().unwrap_or_else(|| default_required.to_vec());
    let not_found = || ReconError::NoTableFound {
        table: role.to_string(),
        required: required.clone(),
    };

    if cfg.select_table {
        let best = select_table(&input.file, sheets, &required, &cfg.columns, locator)
            .ok_or_else(not_found)?;
        log::info!("{role}: selected {} (score {})", best.table.provenance, best.score);
        Ok(best.table)
    } else {
        let first = sheets.first().ok_or_else(not_found)?;
        Ok(Table::from_sheet(&input.file, first, 0))
    }
}

// ---------------------------------------------------------------------------
// Column plan
// ---------------------------------------------------------------------------

struct PlanBuilder<'a> {
    locator: &'a Locator<'a>,
    choices: Vec<ColumnChoice>,
}

impl<'a> PlanBuilder<'a> {
    fn found(&mut self, role: &str, table: &Table, kind: FieldKind, at: Located) -> usize {
        let header = cell(&table.header, at.index).display();
        log::info!(
            "{role}: {kind} -> column {} '{header}' ({})",
            at.index,
            at.strategy
        );
        self.choices.push(ColumnChoice {
            table: role.to_string(),
            field: kind,
            index: at.index,
            header,
            strategy: at.strategy,
        });
        at.index
    }

    fn required(
        &mut self,
        role: &str,
        cfg: &TableConfig,
        table: &Table,
        kind: FieldKind,
        exclude: &[usize],
    ) -> Result<usize, ReconError> {
        let at = self
            .locator
            .locate(table, kind, &cfg.rule(kind), cfg.fixed_index(kind), exclude)
            .ok_or_else(|| ReconError::SchemaNotFound {
                table: role.to_string(),
                field: kind,
            })?;
        Ok(self.found(role, table, kind, at))
    }

    /// Optional fields only use content scoring when their rule is configured;
    /// any numeric column would otherwise pass for an amount.
    fn optional(
        &mut self,
        role: &str,
        cfg: &TableConfig,
        table: &Table,
        kind: FieldKind,
        exclude: &[usize],
    ) -> Option<usize> {
        let mut rule = cfg.rule(kind);
        rule.content &= cfg.columns.contains_key(&kind);
        let at = self
            .locator
            .locate(table, kind, &rule, cfg.fixed_index(kind), exclude)?;
        Some(self.found(role, table, kind, at))
    }
}

pub fn source_role(i: usize, cfg: &TableConfig) -> String {
    match &cfg.batch {
        Some(batch) => format!("source '{batch}' ({})", cfg.file),
        None => format!("source #{} ({})", i + 1, cfg.file),
    }
}

pub fn target_role(cfg: &TableConfig) -> String {
    format!("target ({})", cfg.file)
}

/// Locate every column the run needs.
///
/// The target amount is required unless some source carries one. The target
/// date is required when unmatched rows are assigned by batch date range.
pub fn resolve_plan(
    config: &RunConfig,
    sources: &[SourceTable],
    target: &Table,
    locator: &Locator<'_>,
) -> Result<(ColumnPlan, Vec<ColumnChoice>), ReconError> {
    if sources.len() != config.sources.len() {
        return Err(ReconError::PlanMismatch {
            sources: sources.len(),
            plans: config.sources.len(),
        });
    }

    let mut b = PlanBuilder {
        locator,
        choices: Vec::new(),
    };

    let mut plan = ColumnPlan::default();
    for (i, (cfg, src)) in config.sources.iter().zip(sources).enumerate() {
        let role = source_role(i, cfg);
        let table = &src.table;
        let phone = b.required(&role, cfg, table, FieldKind::Phone, &[])?;
        let cols = SourceColumns {
            phone,
            source: b.optional(&role, cfg, table, FieldKind::Source, &[phone]),
            status: b.optional(&role, cfg, table, FieldKind::Status, &[phone]),
            amount: b.optional(&role, cfg, table, FieldKind::Amount, &[phone]),
        };
        if cols.source.is_none() {
            log::warn!(
                "{role}: no source column, rows count as '{}'",
                config.policy.other_label
            );
        }
        plan.sources.push(cols);
    }

    let cfg = &config.target;
    let role = target_role(cfg);
    let phone = b.required(&role, cfg, target, FieldKind::Phone, &[])?;
    let sources_have_amount = plan.sources.iter().any(|s| s.amount.is_some());
    let amount = if sources_have_amount {
        b.optional(&role, cfg, target, FieldKind::Amount, &[phone])
    } else {
        Some(b.required(&role, cfg, target, FieldKind::Amount, &[phone])?)
    };
    let date = if config.policy.unmatched == UnmatchedPolicy::BatchDateRange {
        Some(b.required(&role, cfg, target, FieldKind::Date, &[phone])?)
    } else {
        b.optional(&role, cfg, target, FieldKind::Date, &[phone])
    };
    plan.target = TargetColumns {
        phone,
        amount,
        status: b.optional(&role, cfg, target, FieldKind::Status, &[phone]),
        name: b.optional(&role, cfg, target, FieldKind::Name, &[phone]),
        email: b.optional(&role, cfg, target, FieldKind::Email, &[phone]),
        date,
        join_date: b.optional(&role, cfg, target, FieldKind::JoinDate, &[phone]),
    };

    Ok((plan, b.choices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, RawSheet, Row};

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|s| Cell::from(*s)).collect()
    }

    fn config(extra: &str) -> RunConfig {
        RunConfig::from_toml(&format!(
            r#"
name = "t"
[[sources]]
file = "tracking.csv"
[target]
file = "payments.csv"
{extra}
"#
        ))
        .unwrap()
    }

    fn tracking() -> SourceTable {
        let table = Table::from_sheet(
            "tracking.csv",
            &RawSheet::new(
                "tracking",
                vec![
                    row(&["이름", "연락처", "유입경로", "나이"]),
                    row(&["kim", "010-1111-2222", "메타", "31"]),
                ],
            ),
            0,
        );
        SourceTable { batch: None, table }
    }

    fn payments() -> Table {
        Table::from_sheet(
            "payments.csv",
            &RawSheet::new(
                "payments",
                vec![
                    row(&["결제일", "구매자", "전화번호", "최종결제금액", "결제상태"]),
                    row(&["2024-03-01", "kim", "01011112222", "50000", "결제완료"]),
                ],
            ),
            0,
        )
    }

    #[test]
    fn resolves_header_plan() {
        let config = config("");
        let locator = Locator::new(&config.phone, &config.locator);
        let (plan, choices) = resolve_plan(&config, &[tracking()], &payments(), &locator).unwrap();

        assert_eq!(
            plan.sources[0],
            SourceColumns {
                phone: 1,
                source: Some(2),
                status: None,
                // The age column is numeric but amount is not configured here.
                amount: None,
            }
        );
        assert_eq!(plan.target.phone, 2);
        assert_eq!(plan.target.amount, Some(3));
        assert_eq!(plan.target.status, Some(4));
        assert_eq!(plan.target.name, Some(1));
        assert_eq!(plan.target.date, Some(0));
        assert!(choices.iter().any(|c| c.field == FieldKind::Amount && c.header == "최종결제금액"));
    }

    #[test]
    fn missing_target_amount_is_schema_error() {
        let config = config("");
        let locator = Locator::new(&config.phone, &config.locator);
        let target = Table::from_sheet(
            "applicants.csv",
            &RawSheet::new("s", vec![row(&["이름", "전화번호"]), row(&["kim", "01011112222"])]),
            0,
        );
        let err = resolve_plan(&config, &[tracking()], &target, &locator).unwrap_err();
        assert!(matches!(
            err,
            ReconError::SchemaNotFound { field: FieldKind::Amount, .. }
        ));
    }

    #[test]
    fn pick_named_sheet() {
        let config = config("sheet = \"detail\"");
        let locator = Locator::new(&config.phone, &config.locator);
        let input = InputFile {
            file: "payments.xlsx".into(),
            sheets: vec![
                RawSheet::new("summary", vec![row(&["total"])]),
                RawSheet::new("detail", vec![row(&["전화번호"])]),
            ],
        };
        let table = pick_table("target", &config.target, &input, &[FieldKind::Phone], &locator).unwrap();
        assert_eq!(table.provenance.sheet, "detail");

        let missing = TableConfig {
            sheet: Some("nope".into()),
            ..config.target.clone()
        };
        assert!(matches!(
            pick_table("target", &missing, &input, &[FieldKind::Phone], &locator),
            Err(ReconError::SheetNotFound { .. })
        ));
    }

    #[test]
    fn select_without_candidate_is_no_table() {
        let config = config("select_table = true");
        let locator = Locator::new(&config.phone, &config.locator);
        let input = InputFile {
            file: "payments.xlsx".into(),
            sheets: vec![RawSheet::new("s", vec![row(&["a", "b"])])],
        };
        let err = pick_table("target", &config.target, &input, &[FieldKind::Phone, FieldKind::Amount], &locator)
            .unwrap_err();
        assert!(err.to_string().contains("phone, amount"), "{err}");
    }
}
