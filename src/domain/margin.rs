//! Margin account and adjustment history types.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// Per-user margin balance.
///
/// `allocated` is the cached sum of margin held by open and partially-closed
/// operations; `available` is derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginAccount {
    pub user_id: UserId,
    pub total: Decimal,
    pub allocated: Decimal,
}

impl MarginAccount {
    pub fn available(&self) -> Decimal {
        self.total - self.allocated
    }
}

/// Kind of a manual margin adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Administrative replacement of the total.
    SetTotal,
    /// Manual deposit (positive delta) or withdrawal (negative delta).
    Manual,
}

impl AdjustmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::SetTotal => "set_total",
            AdjustmentKind::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "set_total" => Some(AdjustmentKind::SetTotal),
            "manual" => Some(AdjustmentKind::Manual),
            _ => None,
        }
    }
}

/// One entry in the manual adjustment history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginAdjustment {
    pub user_id: UserId,
    pub at: TimeMs,
    pub delta: Decimal,
    pub kind: AdjustmentKind,
    pub note: Option<String>,
}
