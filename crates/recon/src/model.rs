use std::collections::BTreeMap;

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use crate::aggregate::Report;
use crate::locate::{FieldKind, Strategy};
use crate::normalize::NormalizedPhone;
use crate::table::{Provenance, RawSheet, Table};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Every sheet of one decoded input file.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub file: String,
    pub sheets: Vec<RawSheet>,
}

/// Pre-loaded files, one per `[[sources]]` entry plus the target.
#[derive(Debug, Clone)]
pub struct ReconInput {
    pub sources: Vec<InputFile>,
    pub target: InputFile,
}

/// A source table tagged with its batch label.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub batch: Option<String>,
    pub table: Table,
}

// ---------------------------------------------------------------------------
// Column plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceColumns {
    pub phone: usize,
    pub source: Option<usize>,
    pub status: Option<usize>,
    pub amount: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetColumns {
    pub phone: usize,
    pub amount: Option<usize>,
    pub status: Option<usize>,
    pub name: Option<usize>,
    pub email: Option<usize>,
    pub date: Option<usize>,
    pub join_date: Option<usize>,
}

/// Resolved column indices for one run, sources in definition order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnPlan {
    pub sources: Vec<SourceColumns>,
    pub target: TargetColumns,
}

/// How one column of the plan was found.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnChoice {
    pub table: String,
    pub field: FieldKind,
    pub index: usize,
    pub header: String,
    pub strategy: Strategy,
}

// ---------------------------------------------------------------------------
// Attribution map
// ---------------------------------------------------------------------------

/// First sighting of a phone in the source tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionEntry {
    pub phone: NormalizedPhone,
    pub source: String,
    pub batch: Option<String>,
    /// Positive amounts seen for this phone across source rows.
    pub amount: u64,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatKey {
    pub batch: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStat {
    pub total_tracked: u64,
    pub matched: u64,
    pub unmatched: u64,
    pub matched_amount: u64,
    pub unmatched_amount: u64,
}

impl SourceStat {
    pub fn amount(&self) -> u64 {
        self.matched_amount.saturating_add(self.unmatched_amount)
    }
}

/// Stats per (batch, source). Batches keep the order they were first referenced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatTable {
    groups: BTreeMap<StatKey, SourceStat>,
    batch_order: Vec<Option<String>>,
}

impl StatTable {
    pub fn entry(&mut self, batch: Option<&str>, source: &str) -> &mut SourceStat {
        let batch = batch.map(str::to_string);
        if !self.batch_order.contains(&batch) {
            self.batch_order.push(batch.clone());
        }
        self.groups
            .entry(StatKey {
                batch,
                source: source.to_string(),
            })
            .or_default()
    }

    pub fn get(&self, batch: Option<&str>, source: &str) -> Option<&SourceStat> {
        self.groups.get(&StatKey {
            batch: batch.map(str::to_string),
            source: source.to_string(),
        })
    }

    pub fn batches(&self) -> &[Option<String>] {
        &self.batch_order
    }

    /// Groups of one batch, ordered by source label.
    pub fn in_batch<'a>(
        &'a self,
        batch: &'a Option<String>,
    ) -> impl Iterator<Item = (&'a str, &'a SourceStat)> + 'a {
        self.groups
            .iter()
            .filter(move |(k, _)| &k.batch == batch)
            .map(|(k, v)| (k.source.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StatKey, &SourceStat)> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Serialize for StatTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.groups.iter().map(|(key, stat)| StatRow { key, stat }))
    }
}

struct StatRow<'a> {
    key: &'a StatKey,
    stat: &'a SourceStat,
}

impl Serialize for StatRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("StatRow", 7)?;
        s.serialize_field("batch", &self.key.batch)?;
        s.serialize_field("source", &self.key.source)?;
        s.serialize_field("total_tracked", &self.stat.total_tracked)?;
        s.serialize_field("matched", &self.stat.matched)?;
        s.serialize_field("unmatched", &self.stat.unmatched)?;
        s.serialize_field("matched_amount", &self.stat.matched_amount)?;
        s.serialize_field("unmatched_amount", &self.stat.unmatched_amount)?;
        s.end()
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One row per target row, in target order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    pub name: String,
    pub email: String,
    /// Phone as it appeared in the target.
    pub phone: String,
    /// Attributed source label, or the "other" label.
    pub category: String,
    /// Amount as it appeared in the target.
    pub amount_display: String,
    pub amount: u64,
    pub batch: Option<String>,
    pub join_date: String,
    pub matched: bool,
    /// Status carried a refund marker; the row counts with amount 0.
    pub refunded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub rows: Vec<OutputRow>,
    pub stats: StatTable,
    pub total_revenue: u64,
    pub matched_rows: usize,
    pub unmatched_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub meta: RunMeta,
    pub tables: Vec<Provenance>,
    pub columns: Vec<ColumnChoice>,
    pub result: ReconResult,
    pub report: Report,
}
