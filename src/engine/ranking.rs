//! Best/worst closed-position rankings with per-position ROI.

use crate::domain::{Decimal, Operation};
use uuid::Uuid;

/// A ranked entry over the qualifying closed set.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedOperation {
    pub ticker: String,
    pub kind: String,
    pub direction: String,
    pub result: Decimal,
    /// Integer ROI percent; None when the opening notional is zero.
    pub roi: Option<i64>,
    /// Parent id when this entry is a realized slice of a larger position.
    pub original_operation_id: Option<Uuid>,
}

impl RankedOperation {
    fn from_operation(op: &Operation) -> Self {
        RankedOperation {
            ticker: op.ticker.as_str().to_string(),
            kind: op.kind.as_str().to_string(),
            direction: op.direction.as_str().to_string(),
            result: op.result.unwrap_or_else(Decimal::zero),
            roi: op.roi_percent(),
            original_operation_id: op.original_operation_id,
        }
    }
}

/// Top `n` qualifying records by result, best first.
pub fn rank_best(qualifying: &[Operation], n: usize) -> Vec<RankedOperation> {
    let mut sorted: Vec<&Operation> = qualifying.iter().collect();
    sorted.sort_by(|a, b| result_of(b).cmp(&result_of(a)));
    sorted
        .into_iter()
        .take(n)
        .map(RankedOperation::from_operation)
        .collect()
}

/// Bottom `n` qualifying records by result, worst first.
pub fn rank_worst(qualifying: &[Operation], n: usize) -> Vec<RankedOperation> {
    let mut sorted: Vec<&Operation> = qualifying.iter().collect();
    sorted.sort_by(|a, b| result_of(a).cmp(&result_of(b)));
    sorted
        .into_iter()
        .take(n)
        .map(RankedOperation::from_operation)
        .collect()
}

fn result_of(op: &Operation) -> Decimal {
    op.result.unwrap_or_else(Decimal::zero)
}
