use std::fmt;

use crate::locate::FieldKind;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (duplicate batch label, bad locale, etc.).
    ConfigValidation(String),
    /// A requested sheet does not exist in the workbook.
    SheetNotFound { table: String, sheet: String },
    /// No sheet/header candidate carries every required field.
    NoTableFound { table: String, required: Vec<FieldKind> },
    /// No strategy could locate a required column.
    SchemaNotFound { table: String, field: FieldKind },
    /// Column plan does not line up with the tables handed to `reconcile`.
    PlanMismatch { sources: usize, plans: usize },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::SheetNotFound { table, sheet } => {
                write!(f, "{table}: sheet '{sheet}' not found")
            }
            Self::NoTableFound { table, required } => {
                let names: Vec<&str> = required.iter().map(|k| k.as_str()).collect();
                write!(f, "{table}: no table with columns [{}]", names.join(", "))
            }
            Self::SchemaNotFound { table, field } => {
                write!(f, "{table}: cannot locate a {field} column")
            }
            Self::PlanMismatch { sources, plans } => {
                write!(f, "column plan covers {plans} source table(s), got {sources}")
            }
        }
    }
}

impl std::error::Error for ReconError {}
