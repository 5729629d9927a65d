//! The Operation entity: one options position, or one realized slice of one.

use crate::domain::{Decimal, Direction, MonthRef, OptionKind, Ticker, TimeMs, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an operation.
///
/// `Open → PartiallyClosed → Closed` via repeated partial closes, or
/// `Open → Closed` via a single full close. No transition out of `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    Open,
    PartiallyClosed,
    Closed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Open => "open",
            OperationStatus::PartiallyClosed => "partially_closed",
            OperationStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(OperationStatus::Open),
            "partially_closed" => Some(OperationStatus::PartiallyClosed),
            "closed" => Some(OperationStatus::Closed),
            _ => None,
        }
    }

    /// Whether a close request may target a record in this status.
    pub fn is_closable(&self) -> bool {
        matches!(
            self,
            OperationStatus::Open | OperationStatus::PartiallyClosed
        )
    }
}

/// One options position or one realized slice of a position.
///
/// Records form a flat arena keyed by id: a realized partial-closure slice
/// carries `original_operation_id` pointing at its parent; children are
/// discovered by querying that back-reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: Uuid,
    pub user_id: UserId,
    /// Set when this record represents a realized slice of a parent.
    pub original_operation_id: Option<Uuid>,
    pub ticker: Ticker,
    pub kind: OptionKind,
    pub direction: Direction,
    pub strike: Decimal,
    /// Human-readable label, generated at open.
    pub visual_id: String,
    /// Reference month/year for categorical bucketing.
    pub reference: MonthRef,
    pub open_price: Decimal,
    pub quantity: i64,
    /// Units not yet consumed by realized slices. Equals `quantity` until
    /// the first partial close.
    pub remaining_quantity: i64,
    pub open_notional: Decimal,
    pub close_price: Option<Decimal>,
    pub close_notional: Option<Decimal>,
    pub result: Option<Decimal>,
    pub margin_allocated: Decimal,
    pub status: OperationStatus,
    pub opened_at: TimeMs,
    pub closed_at: Option<TimeMs>,
    pub notes: Option<String>,
    pub group_label: Option<String>,
}

impl Operation {
    /// Create a new open position.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        user_id: UserId,
        ticker: Ticker,
        kind: OptionKind,
        direction: Direction,
        strike: Decimal,
        open_price: Decimal,
        quantity: i64,
        margin: Decimal,
        reference: MonthRef,
        opened_at: TimeMs,
        notes: Option<String>,
        group_label: Option<String>,
    ) -> Self {
        let visual_id = format_visual_id(&ticker, kind, strike, reference);
        let open_notional = open_price * Decimal::from_i64(quantity);
        Operation {
            id: Uuid::new_v4(),
            user_id,
            original_operation_id: None,
            ticker,
            kind,
            direction,
            strike,
            visual_id,
            reference,
            open_price,
            quantity,
            remaining_quantity: quantity,
            open_notional,
            close_price: None,
            close_notional: None,
            result: None,
            margin_allocated: margin,
            status: OperationStatus::Open,
            opened_at,
            closed_at: None,
            notes,
            group_label,
        }
    }

    /// Build the derived record for a realized partial-closure slice.
    ///
    /// The child is born `Closed` and is never itself split further.
    pub fn realized_slice(
        &self,
        quantity: i64,
        close_price: Decimal,
        result: Decimal,
        margin_share: Decimal,
        closed_at: TimeMs,
    ) -> Operation {
        Operation {
            id: Uuid::new_v4(),
            user_id: self.user_id.clone(),
            original_operation_id: Some(self.id),
            ticker: self.ticker.clone(),
            kind: self.kind,
            direction: self.direction,
            strike: self.strike,
            visual_id: self.visual_id.clone(),
            reference: self.reference,
            open_price: self.open_price,
            quantity,
            remaining_quantity: 0,
            open_notional: self.open_price * Decimal::from_i64(quantity),
            close_price: Some(close_price),
            close_notional: Some(close_price * Decimal::from_i64(quantity)),
            result: Some(result),
            margin_allocated: margin_share,
            status: OperationStatus::Closed,
            opened_at: self.opened_at,
            closed_at: Some(closed_at),
            notes: None,
            group_label: self.group_label.clone(),
        }
    }

    /// Whether this record is a realized slice of a parent position.
    pub fn is_derived_slice(&self) -> bool {
        self.original_operation_id.is_some()
    }

    /// Realized result for closing `quantity` units at `close_price`:
    /// Buy ⇒ (close − open) × qty, Sell ⇒ (open − close) × qty.
    pub fn slice_result(&self, close_price: Decimal, quantity: i64) -> Decimal {
        slice_result(
            self.direction,
            self.open_price,
            close_price,
            quantity,
        )
    }

    /// Notional at open, defaulting to price × quantity when absent.
    ///
    /// Historical rows imported before notionals were stored may carry zero;
    /// the explicit default keeps ROI well-defined for them.
    pub fn effective_open_notional(&self) -> Decimal {
        if self.open_notional.is_zero() {
            self.open_price * Decimal::from_i64(self.quantity)
        } else {
            self.open_notional
        }
    }

    /// ROI percent of the realized result over the opening notional.
    /// `None` when the notional is zero (reported as "N/A", never divided).
    pub fn roi_percent(&self) -> Option<i64> {
        let result = self.result?;
        result.percent_of(self.effective_open_notional())
    }
}

/// Realized result for a slice, by direction.
pub fn slice_result(
    direction: Direction,
    open_price: Decimal,
    close_price: Decimal,
    quantity: i64,
) -> Decimal {
    let per_unit = match direction {
        Direction::Buy => close_price - open_price,
        Direction::Sell => open_price - close_price,
    };
    per_unit * Decimal::from_i64(quantity)
}

/// Human-readable label, e.g. "PETR4 CALL 34.5 Abr/24".
fn format_visual_id(
    ticker: &Ticker,
    kind: OptionKind,
    strike: Decimal,
    reference: MonthRef,
) -> String {
    format!(
        "{} {} {} {}",
        ticker.as_str(),
        kind.as_str(),
        strike.to_canonical_string(),
        reference.label()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sample_open() -> Operation {
        Operation::open(
            UserId::new("u1".to_string()),
            Ticker::new("PETR4".to_string()),
            OptionKind::Call,
            Direction::Buy,
            dec("34.5"),
            dec("2.00"),
            100,
            dec("500"),
            MonthRef::new(4, 2024).unwrap(),
            TimeMs::new(1_713_182_400_000),
            None,
            None,
        )
    }

    #[test]
    fn test_open_computes_notional_and_visual_id() {
        let op = sample_open();
        assert_eq!(op.open_notional, dec("200"));
        assert_eq!(op.remaining_quantity, 100);
        assert_eq!(op.status, OperationStatus::Open);
        assert_eq!(op.visual_id, "PETR4 CALL 34.5 Abr/24");
    }

    #[test]
    fn test_slice_result_buy() {
        let op = sample_open();
        assert_eq!(op.slice_result(dec("3.00"), 40), dec("40"));
    }

    #[test]
    fn test_slice_result_sell() {
        let mut op = sample_open();
        op.direction = Direction::Sell;
        // sold at 2.00, bought back at 3.00: a loss
        assert_eq!(op.slice_result(dec("3.00"), 40), dec("-40"));
        // bought back cheaper: a gain
        assert_eq!(op.slice_result(dec("1.50"), 40), dec("20"));
    }

    #[test]
    fn test_realized_slice_links_parent_and_is_closed() {
        let op = sample_open();
        let child = op.realized_slice(40, dec("3.00"), dec("40"), dec("200"), TimeMs::new(1));
        assert_eq!(child.original_operation_id, Some(op.id));
        assert_eq!(child.status, OperationStatus::Closed);
        assert_eq!(child.quantity, 40);
        assert_eq!(child.open_notional, dec("80"));
        assert_eq!(child.close_notional, Some(dec("120")));
        assert_eq!(child.result, Some(dec("40")));
        assert!(child.is_derived_slice());
    }

    #[test]
    fn test_roi_percent() {
        let op = sample_open();
        let child = op.realized_slice(40, dec("3.00"), dec("40"), dec("0"), TimeMs::new(1));
        // 40 / 80 * 100 = 50
        assert_eq!(child.roi_percent(), Some(50));
    }

    #[test]
    fn test_roi_percent_zero_notional_is_none() {
        let mut op = sample_open();
        op.open_price = Decimal::zero();
        op.open_notional = Decimal::zero();
        op.result = Some(dec("10"));
        assert_eq!(op.roi_percent(), None);
    }

    #[test]
    fn test_effective_notional_defaults_from_price_and_quantity() {
        let mut op = sample_open();
        op.open_notional = Decimal::zero();
        assert_eq!(op.effective_open_notional(), dec("200"));
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            OperationStatus::Open,
            OperationStatus::PartiallyClosed,
            OperationStatus::Closed,
        ] {
            assert_eq!(OperationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OperationStatus::parse("void"), None);
    }

    #[test]
    fn test_closable_statuses() {
        assert!(OperationStatus::Open.is_closable());
        assert!(OperationStatus::PartiallyClosed.is_closable());
        assert!(!OperationStatus::Closed.is_closable());
    }
}
