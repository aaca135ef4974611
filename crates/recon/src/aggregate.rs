//! Channel report: per-source rows grouped into paid / organic / other buckets,
//! with conversion rate, revenue share, and rollups.

use serde::{Serialize, Serializer};

use crate::config::RunConfig;
use crate::model::{SourceStat, StatTable};

// ---------------------------------------------------------------------------
// Percent
// ---------------------------------------------------------------------------

/// A percentage held in tenths, rounded half-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percent(u64);

impl Percent {
    /// `part / whole * 100`, one decimal, half-up. Zero when `whole` is zero.
    pub fn of(part: u64, whole: u64) -> Self {
        if whole == 0 {
            return Self(0);
        }
        let (part, whole) = (part as u128, whole as u128);
        Self(((part * 2000 + whole) / (whole * 2)) as u64)
    }

    pub fn tenths(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Percent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 10.0)
    }
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Paid,
    Organic,
    Other,
}

#[derive(Debug, Clone)]
pub struct BucketRules {
    pub paid: Vec<String>,
    pub other_markers: Vec<String>,
    pub other_label: String,
}

impl BucketRules {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            paid: config.buckets.paid.clone(),
            other_markers: config.buckets.other_markers.clone(),
            other_label: config.policy.other_label.clone(),
        }
    }

    pub fn classify(&self, label: &str) -> Bucket {
        let label = label.trim();
        if label.is_empty() || label == self.other_label || self.is_other_marker(label) {
            return Bucket::Other;
        }
        if self.paid.iter().any(|p| !p.is_empty() && label.contains(p.as_str())) {
            return Bucket::Paid;
        }
        Bucket::Organic
    }

    // Punctuation-only markers such as "-" must match exactly; word markers match as substrings.
    fn is_other_marker(&self, label: &str) -> bool {
        let lower = label.to_lowercase();
        self.other_markers.iter().any(|m| {
            let m = m.to_lowercase();
            if m.chars().any(char::is_alphanumeric) {
                lower.contains(&m)
            } else {
                lower == m
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub label: String,
    pub tracked: u64,
    pub matched: u64,
    pub unmatched: u64,
    pub amount: u64,
    pub conversion_rate: Percent,
    pub revenue_share: Percent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rollup {
    pub tracked: u64,
    pub matched: u64,
    pub unmatched: u64,
    pub amount: u64,
    pub conversion_rate: Percent,
    pub revenue_share: Percent,
}

impl Rollup {
    fn add(&mut self, stat: &SourceStat) {
        self.tracked += stat.total_tracked;
        self.matched += stat.matched;
        self.unmatched += stat.unmatched;
        self.amount = self.amount.saturating_add(stat.amount());
    }

    fn merge(&mut self, other: &Rollup) {
        self.tracked += other.tracked;
        self.matched += other.matched;
        self.unmatched += other.unmatched;
        self.amount = self.amount.saturating_add(other.amount);
    }

    fn finish(mut self, total_revenue: u64) -> Self {
        self.conversion_rate = Percent::of(self.matched, self.tracked);
        self.revenue_share = Percent::of(self.amount, total_revenue);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub bucket: Bucket,
    /// Sorted by amount descending, then label.
    pub rows: Vec<ReportRow>,
    pub rollup: Rollup,
}

impl Section {
    fn new(bucket: Bucket) -> Self {
        Self {
            bucket,
            rows: Vec::new(),
            rollup: Rollup::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batch: Option<String>,
    pub paid: Section,
    pub organic: Section,
    pub other: Section,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub total_revenue: u64,
    pub batches: Vec<BatchReport>,
    pub paid: Rollup,
    pub organic: Rollup,
    pub other: Rollup,
    pub grand: Rollup,
}

impl Report {
    /// Paid + organic + other amounts add back up to total revenue.
    pub fn is_conserved(&self) -> bool {
        self.paid
            .amount
            .saturating_add(self.organic.amount)
            .saturating_add(self.other.amount)
            == self.total_revenue
    }
}

/// Build the channel report from per-(batch, source) stats.
pub fn aggregate(stats: &StatTable, total_revenue: u64, rules: &BucketRules) -> Report {
    let mut paid = Rollup::default();
    let mut organic = Rollup::default();
    let mut other = Rollup::default();

    let mut batches = Vec::with_capacity(stats.batches().len());
    for batch in stats.batches() {
        let mut sections = [
            Section::new(Bucket::Paid),
            Section::new(Bucket::Organic),
            Section::new(Bucket::Other),
        ];

        for (label, stat) in stats.in_batch(batch) {
            let section = match rules.classify(label) {
                Bucket::Paid => &mut sections[0],
                Bucket::Organic => &mut sections[1],
                Bucket::Other => &mut sections[2],
            };
            section.rows.push(ReportRow {
                label: label.to_string(),
                tracked: stat.total_tracked,
                matched: stat.matched,
                unmatched: stat.unmatched,
                amount: stat.amount(),
                conversion_rate: Percent::of(stat.matched, stat.total_tracked),
                revenue_share: Percent::of(stat.amount(), total_revenue),
            });
            section.rollup.add(stat);
        }

        for section in &mut sections {
            section
                .rows
                .sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.label.cmp(&b.label)));
            section.rollup = section.rollup.finish(total_revenue);
        }

        paid.merge(&sections[0].rollup);
        organic.merge(&sections[1].rollup);
        other.merge(&sections[2].rollup);

        let [paid_section, organic_section, other_section] = sections;
        batches.push(BatchReport {
            batch: batch.clone(),
            paid: paid_section,
            organic: organic_section,
            other: other_section,
        });
    }

    let mut grand = Rollup::default();
    for r in [&paid, &organic, &other] {
        grand.merge(r);
    }

    Report {
        total_revenue,
        batches,
        paid: paid.finish(total_revenue),
        organic: organic.finish(total_revenue),
        other: other.finish(total_revenue),
        grand: grand.finish(total_revenue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> BucketRules {
        BucketRules {
            paid: vec!["메타".into(), "구글".into()],
            other_markers: vec!["-".into(), "기타".into(), "etc".into()],
            other_label: "기타".into(),
        }
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(Percent::of(1, 3).to_string(), "33.3");
        assert_eq!(Percent::of(2, 3).to_string(), "66.7");
        assert_eq!(Percent::of(1, 8).to_string(), "12.5");
        assert_eq!(Percent::of(1, 16).to_string(), "6.3");
        assert_eq!(Percent::of(5, 5).to_string(), "100.0");
        assert_eq!(Percent::of(7, 0).to_string(), "0.0");
    }

    #[test]
    fn percent_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Percent::of(1, 3)).unwrap(), "33.3");
    }

    #[test]
    fn classify_labels() {
        let r = rules();
        assert_eq!(r.classify("메타"), Bucket::Paid);
        assert_eq!(r.classify("메타 리타겟팅"), Bucket::Paid);
        assert_eq!(r.classify("인스타그램"), Bucket::Organic);
        assert_eq!(r.classify("네이버-블로그"), Bucket::Organic);
        assert_eq!(r.classify("-"), Bucket::Other);
        assert_eq!(r.classify("  "), Bucket::Other);
        assert_eq!(r.classify("기타(지인)"), Bucket::Other);
        assert_eq!(r.classify("ETC"), Bucket::Other);
    }

    fn stat(tracked: u64, matched: u64, matched_amount: u64) -> SourceStat {
        SourceStat {
            total_tracked: tracked,
            matched,
            unmatched: 0,
            matched_amount,
            unmatched_amount: 0,
        }
    }

    #[test]
    fn report_sections_and_rollups() {
        let mut stats = StatTable::default();
        *stats.entry(None, "메타") = stat(10, 2, 100_000);
        *stats.entry(None, "구글") = stat(5, 1, 100_000);
        *stats.entry(None, "인스타그램") = stat(4, 1, 30_000);
        let other = stats.entry(None, "기타");
        other.unmatched = 3;
        other.unmatched_amount = 20_000;

        let report = aggregate(&stats, 250_000, &rules());
        assert!(report.is_conserved());
        assert_eq!(report.batches.len(), 1);

        let paid = &report.batches[0].paid;
        // Equal amounts fall back to label order.
        let labels: Vec<&str> = paid.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["구글", "메타"]);
        assert_eq!(paid.rows[0].conversion_rate.to_string(), "20.0");
        assert_eq!(paid.rows[1].revenue_share.to_string(), "40.0");
        assert_eq!(paid.rollup.matched, 3);
        assert_eq!(paid.rollup.tracked, 15);
        assert_eq!(paid.rollup.conversion_rate.to_string(), "20.0");
        assert_eq!(paid.rollup.revenue_share.to_string(), "80.0");

        assert_eq!(report.organic.amount, 30_000);
        assert_eq!(report.other.unmatched, 3);
        assert_eq!(report.other.conversion_rate.to_string(), "0.0");
        assert_eq!(report.grand.amount, 250_000);
        assert_eq!(report.grand.revenue_share.to_string(), "100.0");
    }

    #[test]
    fn batches_are_reported_separately() {
        let mut stats = StatTable::default();
        *stats.entry(Some("1기"), "메타") = stat(2, 1, 10_000);
        *stats.entry(Some("2기"), "메타") = stat(3, 3, 30_000);

        let report = aggregate(&stats, 40_000, &rules());
        assert_eq!(report.batches.len(), 2);
        assert_eq!(report.batches[0].batch.as_deref(), Some("1기"));
        assert_eq!(report.batches[1].paid.rollup.amount, 30_000);
        assert_eq!(report.paid.matched, 4);
        assert_eq!(report.paid.conversion_rate.to_string(), "80.0");
    }

    #[test]
    fn empty_stats_give_empty_report() {
        let report = aggregate(&StatTable::default(), 0, &rules());
        assert!(report.batches.is_empty());
        assert!(report.is_conserved());
        assert_eq!(report.grand.revenue_share, Percent::default());
    }
}
