use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::ReconError;
use crate::locate::{ColumnRule, FieldKind, LocatorSettings};
use crate::normalize::PhoneLocale;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub name: String,
    #[serde(default)]
    pub phone: PhoneLocale,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub buckets: BucketConfig,
    #[serde(default)]
    pub locator: LocatorSettings,
    /// Attribution tables, in batch definition order.
    pub sources: Vec<TableConfig>,
    /// The table whose rows are reconciled.
    pub target: TableConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub zero_amount: ZeroAmountPolicy,
    #[serde(default)]
    pub unmatched: UnmatchedPolicy,
    /// Label that collects unmatched rows.
    #[serde(default = "default_other_label")]
    pub other_label: String,
    /// Substrings of the status column that exclude a source row.
    #[serde(default = "default_refund_markers")]
    pub refund_markers: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            zero_amount: ZeroAmountPolicy::default(),
            unmatched: UnmatchedPolicy::default(),
            other_label: default_other_label(),
            refund_markers: default_refund_markers(),
        }
    }
}

fn default_other_label() -> String {
    "기타".into()
}

fn default_refund_markers() -> Vec<String> {
    ["환불", "취소", "refund", "cancel"].iter().map(|s| s.to_string()).collect()
}

/// How a phone hit with a zero resolved amount is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroAmountPolicy {
    /// A match requires a positive amount (payment reconciliation).
    #[default]
    Unmatched,
    /// Phone identity alone is a match (lead-to-signup reconciliation).
    Identity,
}

/// Where unmatched target rows are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// One ungrouped "other" bucket.
    #[default]
    Other,
    /// The batch whose matched-date range contains the row's date.
    BatchDateRange,
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BucketConfig {
    /// Source labels counted as paid acquisition.
    #[serde(default = "default_paid")]
    pub paid: Vec<String>,
    /// Source labels that mean "unknown".
    #[serde(default = "default_other_markers")]
    pub other_markers: Vec<String>,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            paid: default_paid(),
            other_markers: default_other_markers(),
        }
    }
}

fn default_paid() -> Vec<String> {
    vec!["메타".into(), "구글".into()]
}

fn default_other_markers() -> Vec<String> {
    vec!["-".into(), "기타".into(), "etc".into()]
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub file: String,
    /// Batch label; sources only.
    #[serde(default)]
    pub batch: Option<String>,
    /// Restrict to one sheet by name.
    #[serde(default)]
    pub sheet: Option<String>,
    /// Search every sheet and header row instead of taking row 0 of the first sheet.
    #[serde(default)]
    pub select_table: bool,
    /// Fields a header candidate must name when `select_table` is on.
    #[serde(default)]
    pub require: Option<Vec<FieldKind>>,
    /// Fixed-position export this table is known to follow.
    #[serde(default)]
    pub layout: Option<FixedLayout>,
    #[serde(default)]
    pub columns: BTreeMap<FieldKind, ColumnRule>,
}

impl TableConfig {
    pub fn rule(&self, kind: FieldKind) -> ColumnRule {
        self.columns.get(&kind).cloned().unwrap_or_default()
    }

    pub fn fixed_index(&self, kind: FieldKind) -> Option<usize> {
        self.layout.and_then(|l| l.index(kind))
    }
}

/// Known fixed-column exports, used when neither headers nor content identify a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedLayout {
    /// Tracking/payment export: source label in D, phone in G, amount in O.
    ClassicPayments,
    /// Applicant export: join date in C, name in D, phone in E, email in F, amount in O.
    ClassicApplicants,
}

impl FixedLayout {
    pub fn index(self, kind: FieldKind) -> Option<usize> {
        match (self, kind) {
            (Self::ClassicPayments, FieldKind::Source) => Some(3),
            (Self::ClassicPayments, FieldKind::Phone) => Some(6),
            (Self::ClassicPayments, FieldKind::Amount) => Some(14),
            (Self::ClassicApplicants, FieldKind::JoinDate) => Some(2),
            (Self::ClassicApplicants, FieldKind::Name) => Some(3),
            (Self::ClassicApplicants, FieldKind::Phone) => Some(4),
            (Self::ClassicApplicants, FieldKind::Email) => Some(5),
            (Self::ClassicApplicants, FieldKind::Amount) => Some(14),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub csv: Option<String>,
    #[serde(default)]
    pub xls: Option<String>,
    #[serde(default)]
    pub json: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl RunConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: RunConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.sources.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one [[sources]] table is required".into(),
            ));
        }

        // Batch labels must be unique and non-blank
        let mut seen = BTreeSet::new();
        for (i, source) in self.sources.iter().enumerate() {
            if let Some(batch) = &source.batch {
                if batch.trim().is_empty() {
                    return Err(ReconError::ConfigValidation(format!(
                        "sources[{i}]: batch label is blank"
                    )));
                }
                if !seen.insert(batch.as_str()) {
                    return Err(ReconError::ConfigValidation(format!(
                        "duplicate batch label '{batch}'"
                    )));
                }
            }
        }
        if self.target.batch.is_some() {
            return Err(ReconError::ConfigValidation(
                "target: batch is only allowed on sources".into(),
            ));
        }

        if self.policy.unmatched == UnmatchedPolicy::BatchDateRange && seen.is_empty() {
            return Err(ReconError::ConfigValidation(
                "policy.unmatched = \"batch_date_range\" needs at least one source with a batch label"
                    .into(),
            ));
        }

        if self.policy.other_label.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "policy.other_label must not be blank".into(),
            ));
        }

        let cc = &self.phone.country_code;
        if cc.is_empty() || !cc.chars().all(|c| c.is_ascii_digit()) {
            return Err(ReconError::ConfigValidation(format!(
                "phone.country_code must be digits, got '{cc}'"
            )));
        }
        if !self.phone.mobile_digit.is_ascii_digit() || self.phone.mobile_digit == '0' {
            return Err(ReconError::ConfigValidation(format!(
                "phone.mobile_digit must be a digit 1-9, got '{}'",
                self.phone.mobile_digit
            )));
        }

        let l = &self.locator;
        for (key, value) in [
            ("header_scan_rows", l.header_scan_rows),
            ("content_sample_rows", l.content_sample_rows),
            ("sanity_sample_rows", l.sanity_sample_rows),
            ("score_sample_rows", l.score_sample_rows),
            ("min_content_hits", l.min_content_hits),
        ] {
            if value == 0 {
                return Err(ReconError::ConfigValidation(format!(
                    "locator.{key} must be at least 1"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
