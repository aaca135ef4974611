use std::collections::HashMap;

use chrono::NaiveDate;

use crate::aggregate::{aggregate, BucketRules};
use crate::config::{PolicyConfig, RunConfig, UnmatchedPolicy, ZeroAmountPolicy};
use crate::error::ReconError;
use crate::locate::{FieldKind, Locator};
use crate::model::{
    AttributionEntry, ColumnPlan, OutputRow, ReconInput, ReconResult, RunMeta, RunOutcome,
    SourceColumns, SourceTable, StatTable,
};
use crate::normalize::{amount_of, date_of, phone_of, NormalizedPhone, PhoneLocale};
use crate::plan::{pick_table, resolve_plan, source_role, target_role};
use crate::table::{cell, Row, Table};

/// Run a full reconciliation: pick tables, locate columns, reconcile, aggregate.
pub fn run(config: &RunConfig, input: &ReconInput) -> Result<RunOutcome, ReconError> {
    if input.sources.len() != config.sources.len() {
        return Err(ReconError::PlanMismatch {
            sources: input.sources.len(),
            plans: config.sources.len(),
        });
    }

    let locator = Locator::new(&config.phone, &config.locator);

    let mut sources = Vec::with_capacity(config.sources.len());
    for (i, (cfg, file)) in config.sources.iter().zip(&input.sources).enumerate() {
        let table = pick_table(&source_role(i, cfg), cfg, file, &[FieldKind::Phone], &locator)?;
        sources.push(SourceTable {
            batch: cfg.batch.clone(),
            table,
        });
    }
    let target = pick_table(
        &target_role(&config.target),
        &config.target,
        &input.target,
        &[FieldKind::Phone, FieldKind::Amount],
        &locator,
    )?;

    let (plan, columns) = resolve_plan(config, &sources, &target, &locator)?;

    let result = reconcile(&sources, &target, &plan, &config.phone, &config.policy)?;
    let report = aggregate(
        &result.stats,
        result.total_revenue,
        &BucketRules::from_config(config),
    );

    log::info!(
        "{}: {} target rows, {} matched, revenue {}",
        config.name,
        result.rows.len(),
        result.matched_rows,
        result.total_revenue
    );

    let mut provenance: Vec<_> = sources.into_iter().map(|s| s.table.provenance).collect();
    provenance.push(target.provenance);

    Ok(RunOutcome {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        },
        tables: provenance,
        columns,
        result,
        report,
    })
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

/// Attribute every target row to a source by phone and tally per-(batch, source) stats.
///
/// Output rows follow target order. Every target amount lands in exactly one stat group,
/// so group amounts always sum to `total_revenue`.
pub fn reconcile(
    sources: &[SourceTable],
    target: &Table,
    plan: &ColumnPlan,
    locale: &PhoneLocale,
    policy: &PolicyConfig,
) -> Result<ReconResult, ReconError> {
    if plan.sources.len() != sources.len() {
        return Err(ReconError::PlanMismatch {
            sources: sources.len(),
            plans: plan.sources.len(),
        });
    }

    let mut stats = StatTable::default();
    let map = build_attribution(sources, &plan.sources, locale, policy, &mut stats);
    log::debug!("attribution map: {} phones", map.len());

    let cols = &plan.target;
    let mut rows = Vec::with_capacity(target.body.len());
    let mut ranges = BatchRanges::default();
    let mut pending: Vec<(usize, Option<NaiveDate>)> = Vec::new();
    let mut total_revenue = 0u64;

    for r in &target.body {
        let entry = phone_of(cell(r, cols.phone), locale).and_then(|p| map.get(&p));
        let refunded = cols
            .status
            .is_some_and(|i| is_refund(&cell(r, i).display(), &policy.refund_markers));

        let (amount_display, mut amount) = match (cols.amount, entry) {
            (Some(i), _) => (cell(r, i).display(), amount_of(cell(r, i))),
            (None, Some(e)) => (e.amount.to_string(), e.amount),
            (None, None) => (String::new(), 0),
        };
        if refunded {
            amount = 0;
        }
        total_revenue = total_revenue.saturating_add(amount);

        let date = cols.date.and_then(|i| date_of(cell(r, i)));
        let matched = entry.filter(|_| amount > 0 || policy.zero_amount == ZeroAmountPolicy::Identity);

        let mut out = OutputRow {
            name: display(r, cols.name),
            email: display(r, cols.email),
            phone: cell(r, cols.phone).display(),
            category: policy.other_label.clone(),
            amount_display,
            amount,
            batch: None,
            join_date: display(r, cols.join_date),
            matched: matched.is_some(),
            refunded,
        };

        match matched {
            Some(e) => {
                let stat = stats.entry(e.batch.as_deref(), &e.source);
                stat.matched += 1;
                stat.matched_amount = stat.matched_amount.saturating_add(amount);
                if let (Some(batch), Some(d)) = (&e.batch, date) {
                    ranges.extend(batch, d);
                }
                out.category = e.source.clone();
                out.batch = e.batch.clone();
            }
            None => pending.push((rows.len(), date)),
        }
        rows.push(out);
    }

    // Unmatched rows are placed after the pass so batch date ranges are complete.
    let batch_order: Vec<&str> = sources.iter().filter_map(|s| s.batch.as_deref()).collect();
    for (idx, date) in pending {
        let batch = match policy.unmatched {
            UnmatchedPolicy::Other => None,
            UnmatchedPolicy::BatchDateRange => ranges.assign(&batch_order, date),
        };
        let row = &mut rows[idx];
        let stat = stats.entry(batch, &policy.other_label);
        stat.unmatched += 1;
        stat.unmatched_amount = stat.unmatched_amount.saturating_add(row.amount);
        row.batch = batch.map(str::to_string);
    }

    let matched_rows = rows.iter().filter(|r| r.matched).count();
    Ok(ReconResult {
        unmatched_rows: rows.len() - matched_rows,
        matched_rows,
        rows,
        stats,
        total_revenue,
    })
}

/// Phone -> first source sighting. Refunded and phone-less source rows are skipped.
fn build_attribution(
    sources: &[SourceTable],
    plans: &[SourceColumns],
    locale: &PhoneLocale,
    policy: &PolicyConfig,
    stats: &mut StatTable,
) -> HashMap<NormalizedPhone, AttributionEntry> {
    let mut map: HashMap<NormalizedPhone, AttributionEntry> = HashMap::new();

    for (src, cols) in sources.iter().zip(plans) {
        let mut skipped = 0usize;
        for r in &src.table.body {
            if cols
                .status
                .is_some_and(|i| is_refund(&cell(r, i).display(), &policy.refund_markers))
            {
                skipped += 1;
                continue;
            }
            let Some(phone) = phone_of(cell(r, cols.phone), locale) else {
                skipped += 1;
                continue;
            };

            let label = cols
                .source
                .map(|i| cell(r, i).display().trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| policy.other_label.clone());
            stats.entry(src.batch.as_deref(), &label).total_tracked += 1;

            let amount = cols.amount.map_or(0, |i| amount_of(cell(r, i)));
            map.entry(phone.clone())
                .and_modify(|e| e.amount = e.amount.saturating_add(amount))
                .or_insert_with(|| AttributionEntry {
                    phone,
                    source: label,
                    batch: src.batch.clone(),
                    amount,
                });
        }
        if skipped > 0 {
            log::debug!("{}: skipped {skipped} source rows", src.table.provenance);
        }
    }
    map
}

fn is_refund(status: &str, markers: &[String]) -> bool {
    let status = status.to_lowercase();
    markers
        .iter()
        .any(|m| !m.is_empty() && status.contains(&m.to_lowercase()))
}

fn display(r: &Row, col: Option<usize>) -> String {
    col.map(|i| cell(r, i).display()).unwrap_or_default()
}

/// Inclusive min/max date of matched rows per batch.
#[derive(Debug, Default)]
struct BatchRanges(HashMap<String, (NaiveDate, NaiveDate)>);

impl BatchRanges {
    fn extend(&mut self, batch: &str, d: NaiveDate) {
        self.0
            .entry(batch.to_string())
            .and_modify(|(lo, hi)| {
                *lo = (*lo).min(d);
                *hi = (*hi).max(d);
            })
            .or_insert((d, d));
    }

    /// First batch in definition order whose range holds `date`, else the last batch.
    fn assign<'b>(&self, order: &[&'b str], date: Option<NaiveDate>) -> Option<&'b str> {
        date.and_then(|d| {
            order.iter().copied().find(|b| {
                self.0
                    .get(*b)
                    .is_some_and(|(lo, hi)| *lo <= d && d <= *hi)
            })
        })
        .or_else(|| order.last().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TargetColumns;
    use crate::table::{Cell, Provenance};

    fn table(rows: &[&[&str]]) -> Table {
        Table {
            header: Vec::new(),
            body: rows
                .iter()
                .map(|r| r.iter().map(|s| Cell::from(*s)).collect())
                .collect(),
            provenance: Provenance::default(),
        }
    }

    fn source(batch: Option<&str>, rows: &[&[&str]]) -> SourceTable {
        SourceTable {
            batch: batch.map(str::to_string),
            table: table(rows),
        }
    }

    // Source: [phone, label]. Target: [phone, amount].
    fn plan(n: usize) -> ColumnPlan {
        ColumnPlan {
            sources: vec![
                SourceColumns {
                    phone: 0,
                    source: Some(1),
                    status: None,
                    amount: None,
                };
                n
            ],
            target: TargetColumns {
                phone: 0,
                amount: Some(1),
                ..TargetColumns::default()
            },
        }
    }

    fn run(sources: &[SourceTable], target: &Table, plan: &ColumnPlan, policy: &PolicyConfig) -> ReconResult {
        reconcile(sources, target, plan, &PhoneLocale::default(), policy).unwrap()
    }

    #[test]
    fn first_sighting_wins() {
        let src = source(None, &[&["010-1111-2222", "메타"], &["01011112222", "구글"]]);
        let target = table(&[&["010 1111 2222", "50000"]]);
        let res = run(&[src], &target, &plan(1), &PolicyConfig::default());

        assert_eq!(res.rows[0].category, "메타");
        assert_eq!(res.stats.get(None, "메타").unwrap().matched, 1);
        // Both source rows are tracked even though only the first attributes.
        assert_eq!(res.stats.get(None, "구글").unwrap().total_tracked, 1);
        assert_eq!(res.stats.get(None, "구글").unwrap().matched, 0);
    }

    #[test]
    fn zero_amount_policy() {
        let src = source(None, &[&["01011112222", "메타"]]);
        let target = table(&[&["01011112222", "0"]]);

        let res = run(&[src.clone()], &target, &plan(1), &PolicyConfig::default());
        assert!(!res.rows[0].matched);
        assert_eq!(res.rows[0].category, "기타");
        assert_eq!(res.stats.get(None, "기타").unwrap().unmatched, 1);

        let identity = PolicyConfig {
            zero_amount: ZeroAmountPolicy::Identity,
            ..PolicyConfig::default()
        };
        let res = run(&[src], &target, &plan(1), &identity);
        assert!(res.rows[0].matched);
        assert_eq!(res.rows[0].category, "메타");
    }

    #[test]
    fn refunded_rows() {
        let src = SourceTable {
            batch: None,
            table: table(&[&["01011112222", "메타", "환불완료"], &["01033334444", "구글", "결제완료"]]),
        };
        let mut p = plan(1);
        p.sources[0].status = Some(2);
        p.target.status = Some(2);

        let target = table(&[
            &["01011112222", "50000", ""],
            &["01033334444", "30000", "결제취소"],
        ]);
        let res = run(&[src], &target, &p, &PolicyConfig::default());

        // Refunded source row never enters the map.
        assert!(res.stats.get(None, "메타").is_none());
        assert!(!res.rows[0].matched);
        // Refunded target row counts with amount 0.
        assert!(res.rows[1].refunded);
        assert_eq!(res.rows[1].amount, 0);
        assert_eq!(res.rows[1].amount_display, "30000");
        assert_eq!(res.total_revenue, 50000);
    }

    #[test]
    fn amount_from_sources_when_target_has_none() {
        let src = SourceTable {
            batch: None,
            table: table(&[&["01011112222", "메타", "30000"], &["010-1111-2222", "메타", "20000"]]),
        };
        let mut p = plan(1);
        p.sources[0].amount = Some(2);
        p.target.amount = None;

        let target = table(&[&["01011112222"], &["01099998888"]]);
        let res = run(&[src], &target, &p, &PolicyConfig::default());
        assert_eq!(res.rows[0].amount, 50000);
        assert!(res.rows[0].matched);
        assert_eq!(res.rows[1].amount_display, "");
        assert_eq!(res.total_revenue, 50000);
        assert_eq!(res.unmatched_rows, 1);
    }

    #[test]
    fn blank_label_counts_as_other() {
        let src = source(None, &[&["01011112222", " "]]);
        let target = table(&[&["01011112222", "1000"]]);
        let res = run(&[src], &target, &plan(1), &PolicyConfig::default());
        let other = res.stats.get(None, "기타").unwrap();
        assert_eq!(other.total_tracked, 1);
        assert_eq!(other.matched, 1);
    }

    #[test]
    fn unmatched_by_batch_date_range() {
        let b1 = source(Some("1기"), &[&["01011110001", "메타"]]);
        let b2 = source(Some("2기"), &[&["01011110002", "메타"]]);
        let mut p = plan(2);
        p.target.date = Some(2);

        let target = table(&[
            &["01011110001", "1000", "2024-01-10"],
            &["01011110002", "1000", "2024-02-10"],
            &["01099990001", "500", "2024-01-10"],
            &["01099990002", "700", "2024-05-01"],
            &["01099990003", "900", ""],
        ]);
        let policy = PolicyConfig {
            unmatched: UnmatchedPolicy::BatchDateRange,
            ..PolicyConfig::default()
        };
        let res = run(&[b1, b2], &target, &p, &policy);

        assert_eq!(res.rows[2].batch.as_deref(), Some("1기"));
        assert_eq!(res.rows[3].batch.as_deref(), Some("2기"));
        assert_eq!(res.rows[4].batch.as_deref(), Some("2기"));
        assert_eq!(res.stats.get(Some("1기"), "기타").unwrap().unmatched_amount, 500);
        assert_eq!(res.stats.get(Some("2기"), "기타").unwrap().unmatched, 2);
        assert!(res.stats.get(None, "기타").is_none());
    }

    #[test]
    fn amounts_are_conserved() {
        let src = source(None, &[&["01011112222", "메타"], &["01033334444", "인스타"]]);
        let target = table(&[
            &["01011112222", "50,000"],
            &["01033334444", "₩30,000"],
            &["n/a", "20000"],
            &["01055556666", "-100"],
        ]);
        let res = run(&[src], &target, &plan(1), &PolicyConfig::default());
        let sum: u64 = res.stats.iter().map(|(_, s)| s.amount()).sum();
        assert_eq!(sum, res.total_revenue);
        assert_eq!(res.total_revenue, 100_000);
        assert_eq!(res.rows.len(), 4);
    }

    #[test]
    fn huge_amounts_saturate() {
        let src = source(None, &[&["01011112222", "메타"]]);
        let target = table(&[
            &["01011112222", "99999999999999999999999"],
            &["01011112222", "99999999999999999999999"],
            &["01099998888", "99999999999999999999999"],
        ]);
        let policy = PolicyConfig::default();
        let res = run(&[src], &target, &plan(1), &policy);
        assert_eq!(res.total_revenue, u64::MAX);
        assert_eq!(res.stats.get(None, "메타").unwrap().matched_amount, u64::MAX);
        assert_eq!(res.stats.get(None, &policy.other_label).unwrap().unmatched_amount, u64::MAX);

        let rules = BucketRules {
            paid: vec!["메타".to_string()],
            other_markers: Vec::new(),
            other_label: policy.other_label.clone(),
        };
        let report = aggregate(&res.stats, res.total_revenue, &rules);
        assert_eq!(report.paid.amount, u64::MAX);
        assert!(report.is_conserved());
    }

    #[test]
    fn plan_mismatch_is_an_error() {
        let err = reconcile(&[], &table(&[]), &plan(1), &PhoneLocale::default(), &PolicyConfig::default())
            .unwrap_err();
        assert!(matches!(err, ReconError::PlanMismatch { sources: 0, plans: 1 }));
    }
}
