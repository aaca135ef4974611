// Plain-text channel report for stderr.

use std::fmt::Write;

use tally_recon::aggregate::{BatchReport, ReportRow, Rollup, Section};
use tally_recon::{Bucket, Report, ReconResult};

const LABEL_WIDTH: usize = 16;

/// `1234567` -> `1,234,567`
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn line(out: &mut String, indent: &str, label: &str, r: &Rollup) {
    let _ = writeln!(
        out,
        "{indent}{label:<width$} {ratio:>9}  {rate:>5}%  {amount:>13}  {share:>5}%",
        width = LABEL_WIDTH,
        ratio = format!("{}/{}", r.matched, r.tracked),
        rate = r.conversion_rate.to_string(),
        amount = thousands(r.amount),
        share = r.revenue_share.to_string(),
    );
}

fn row_line(out: &mut String, row: &ReportRow) {
    let as_rollup = Rollup {
        tracked: row.tracked,
        matched: row.matched,
        unmatched: row.unmatched,
        amount: row.amount,
        conversion_rate: row.conversion_rate,
        revenue_share: row.revenue_share,
    };
    line(out, "    ", &row.label, &as_rollup);
}

fn bucket_name(bucket: Bucket) -> &'static str {
    match bucket {
        Bucket::Paid => "paid",
        Bucket::Organic => "organic",
        Bucket::Other => "other",
    }
}

fn section(out: &mut String, s: &Section) {
    let _ = writeln!(out, "  {}", bucket_name(s.bucket));
    if s.rows.is_empty() {
        let _ = writeln!(out, "    (none)");
    }
    for row in &s.rows {
        row_line(out, row);
    }
    if s.bucket != Bucket::Other && !s.rows.is_empty() {
        line(out, "    ", &format!("{} total", bucket_name(s.bucket)), &s.rollup);
    }
}

fn batch(out: &mut String, b: &BatchReport) {
    let _ = writeln!(out, "== {} ==", b.batch.as_deref().unwrap_or("all"));
    for s in [&b.paid, &b.organic, &b.other] {
        section(out, s);
    }
    out.push('\n');
}

/// Per-batch sections, then overall paid / organic rollups and the grand total.
pub fn report_text(report: &Report) -> String {
    let mut out = String::new();
    for b in &report.batches {
        batch(&mut out, b);
    }
    line(&mut out, "", "paid total", &report.paid);
    line(&mut out, "", "organic total", &report.organic);
    line(&mut out, "", "grand total", &report.grand);
    out
}

/// One-line run summary.
pub fn summary_line(name: &str, result: &ReconResult) -> String {
    format!(
        "{name}: {} rows, {} matched, {} unmatched, revenue {}",
        result.rows.len(),
        result.matched_rows,
        result.unmatched_rows,
        thousands(result.total_revenue),
    )
}
