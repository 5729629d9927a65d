//! Aggregation engine: turns a flat set of operation records into a
//! period report without double counting realized results.

use crate::db::OperationRecord;
use crate::domain::{Decimal, MonthRef, Operation, OperationStatus};
use crate::engine::ranking::{rank_best, rank_worst, RankedOperation};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Number of entries in the best/worst rankings.
const RANKING_SIZE: usize = 5;

/// A per-month bucket of qualifying closed records.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthBucket {
    pub reference: MonthRef,
    /// Display label, e.g. "Abr/24".
    pub label: String,
    pub result: Decimal,
    pub count: usize,
    pub operations: Vec<OperationSummary>,
}

/// Compact per-operation view used in month details.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSummary {
    pub id: Uuid,
    pub visual_id: String,
    pub ticker: String,
    pub kind: String,
    pub direction: String,
    pub quantity: i64,
    pub result: Decimal,
    pub roi: Option<i64>,
    pub original_operation_id: Option<Uuid>,
}

impl OperationSummary {
    fn from_operation(op: &Operation) -> Self {
        OperationSummary {
            id: op.id,
            visual_id: op.visual_id.clone(),
            ticker: op.ticker.as_str().to_string(),
            kind: op.kind.as_str().to_string(),
            direction: op.direction.as_str().to_string(),
            quantity: op.quantity,
            result: op.result.unwrap_or_else(Decimal::zero),
            roi: op.roi_percent(),
            original_operation_id: op.original_operation_id,
        }
    }
}

/// A label/count pair for the distribution breakdowns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionItem {
    pub label: String,
    pub count: usize,
}

/// The computed period report.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Count over the broader in-period set (open or closed).
    pub total_operations: usize,
    pub total_result: Decimal,
    pub trend_pct: i64,
    pub hit_rate_pct: i64,
    pub mean_result: Decimal,
    pub distribution_by_kind: Vec<DistributionItem>,
    pub distribution_by_direction: Vec<DistributionItem>,
    /// Chronologically sorted month buckets over the qualifying set.
    pub months: Vec<MonthBucket>,
    pub best: Vec<RankedOperation>,
    pub worst: Vec<RankedOperation>,
}

/// The no-double-counting filter, pure over a flat record set.
///
/// A record qualifies for P&L summation iff it is a realized slice
/// (`original_operation_id` set) or a never-split full closure (Closed with
/// no derived children). Split parents are excluded — their realized value
/// lives entirely in their children, and a PartiallyClosed parent's own
/// `result` field is stale by definition.
pub fn qualifying_closed(records: &[OperationRecord]) -> Vec<Operation> {
    records
        .iter()
        .filter(|record| {
            let op = &record.operation;
            op.is_derived_slice()
                || (op.status == OperationStatus::Closed && !record.has_children)
        })
        .map(|record| record.operation.clone())
        .collect()
}

/// Sum of realized results over an already-qualified set.
pub fn sum_results(qualifying: &[Operation]) -> Decimal {
    qualifying
        .iter()
        .fold(Decimal::zero(), |acc, op| {
            acc + op.result.unwrap_or_else(Decimal::zero)
        })
}

/// Trend percent of `current` vs `previous`: round((cur − prev)/|prev| × 100),
/// defined as 0 when the previous result is exactly 0 or absent.
pub fn trend_percent(current: Decimal, previous: Option<Decimal>) -> i64 {
    match previous {
        Some(prev) if !prev.is_zero() => ((current - prev) / prev.abs() * Decimal::from_i64(100))
            .round_int(),
        _ => 0,
    }
}

/// Compute the report over a resolved period.
///
/// `in_period` is the broader set (open or closed) counted by
/// `total_operations` and the distributions; `qualifying` is the
/// P&L-qualifying closed set; `prior_result` is the summed qualifying
/// result of the equivalent prior period, absent when there is none.
///
/// Missing optional fields never fail the computation — results default to
/// 0 and ROI to "N/A", since a report must always render even over
/// partially-populated historical data.
pub fn compute_report(
    in_period: &[Operation],
    qualifying: &[Operation],
    prior_result: Option<Decimal>,
) -> Report {
    let total_result = sum_results(qualifying);

    let positive = qualifying
        .iter()
        .filter(|op| op.result.map(|r| r.is_positive()).unwrap_or(false))
        .count();

    let hit_rate_pct = Decimal::from_i64(positive as i64)
        .percent_of(Decimal::from_i64(qualifying.len() as i64))
        .unwrap_or(0);

    let mean_result = if qualifying.is_empty() {
        Decimal::zero()
    } else {
        total_result / Decimal::from_i64(qualifying.len() as i64)
    };

    Report {
        total_operations: in_period.len(),
        total_result,
        trend_pct: trend_percent(total_result, prior_result),
        hit_rate_pct,
        mean_result,
        distribution_by_kind: distribution(in_period, |op| op.kind.as_str()),
        distribution_by_direction: distribution(in_period, |op| op.direction.as_str()),
        months: month_buckets(qualifying),
        best: rank_best(qualifying, RANKING_SIZE),
        worst: rank_worst(qualifying, RANKING_SIZE),
    }
}

/// Count the broader in-period set by a label-producing key.
fn distribution(ops: &[Operation], key: impl Fn(&Operation) -> &'static str) -> Vec<DistributionItem> {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for op in ops {
        *counts.entry(key(op)).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(label, count)| DistributionItem {
            label: label.to_string(),
            count,
        })
        .collect()
}

/// Group qualifying records by the month/year of their close timestamp.
///
/// The BTreeMap key (year, month) keeps buckets chronological — labels are
/// attached afterwards and never sorted on.
fn month_buckets(qualifying: &[Operation]) -> Vec<MonthBucket> {
    let mut buckets: BTreeMap<(i32, u32), MonthBucket> = BTreeMap::new();

    for op in qualifying {
        let closed_at = match op.closed_at {
            Some(t) => t,
            // Qualifying records are closed; tolerate historical rows with a
            // missing timestamp by skipping the bucket rather than failing.
            None => continue,
        };
        let (year, month) = closed_at.year_month();
        let reference = match MonthRef::new(month, year) {
            Some(r) => r,
            None => continue,
        };

        let bucket = buckets.entry((year, month)).or_insert_with(|| MonthBucket {
            reference,
            label: reference.label(),
            result: Decimal::zero(),
            count: 0,
            operations: Vec::new(),
        });
        bucket.result = bucket.result + op.result.unwrap_or_else(Decimal::zero);
        bucket.count += 1;
        bucket.operations.push(OperationSummary::from_operation(op));
    }

    buckets.into_values().collect()
}
