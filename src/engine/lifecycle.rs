//! Lifecycle manager: the only writer of operation state.
//!
//! Enforces the `Open → PartiallyClosed → Closed` state machine, splits
//! positions into a retained remainder plus realized-result records, and
//! keeps the margin ledger in step.

use crate::db::{OperationRecord, Repository};
use crate::domain::{
    Decimal, Direction, MonthRef, Operation, OptionKind, Ticker, TimeMs, UserId,
};
use crate::engine::margin::MarginLedger;
use crate::error::AppError;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Inputs for opening a position.
#[derive(Debug, Clone)]
pub struct OpenSpec {
    pub user_id: UserId,
    pub ticker: Ticker,
    pub kind: OptionKind,
    pub direction: Direction,
    pub strike: Decimal,
    pub price: Decimal,
    pub quantity: i64,
    pub margin: Option<Decimal>,
    pub reference: MonthRef,
    pub notes: Option<String>,
    pub group_label: Option<String>,
}

/// Result of a close: the updated parent, plus the derived record when the
/// close was partial.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseOutcome {
    pub parent: Operation,
    pub realized_child: Option<Operation>,
}

pub struct LifecycleManager {
    repo: Arc<Repository>,
    ledger: Arc<MarginLedger>,
    retry_limit: u32,
}

impl LifecycleManager {
    pub fn new(repo: Arc<Repository>, ledger: Arc<MarginLedger>, retry_limit: u32) -> Self {
        LifecycleManager {
            repo,
            ledger,
            retry_limit,
        }
    }

    /// Open a new position, reserving margin when requested.
    ///
    /// Margin is allocated before the record is written; an allocation
    /// failure aborts the open with no partial effects.
    pub async fn open_position(&self, spec: OpenSpec) -> Result<Operation, AppError> {
        if !spec.price.is_positive() {
            return Err(AppError::InvalidPrice("price must be > 0".to_string()));
        }
        if spec.quantity <= 0 {
            return Err(AppError::InvalidQuantity(
                "quantity must be a positive integer".to_string(),
            ));
        }
        if spec.strike.is_negative() {
            return Err(AppError::InvalidPrice("strike must be >= 0".to_string()));
        }
        let margin = match spec.margin {
            Some(m) if m.is_negative() => {
                return Err(AppError::BadRequest("margin must be >= 0".to_string()))
            }
            Some(m) => m,
            None => Decimal::zero(),
        };

        if margin.is_positive() {
            self.ledger.allocate(&spec.user_id, margin).await?;
        }

        let op = Operation::open(
            spec.user_id.clone(),
            spec.ticker,
            spec.kind,
            spec.direction,
            spec.strike,
            spec.price,
            spec.quantity,
            margin,
            spec.reference,
            TimeMs::now(),
            spec.notes,
            spec.group_label,
        );

        if let Err(e) = self.repo.insert_operation(&op).await {
            // Hand the reservation back before surfacing the failure.
            if margin.is_positive() {
                if let Err(release_err) = self.ledger.release(&spec.user_id, margin).await {
                    warn!(user = %spec.user_id, error = %release_err,
                        "failed to release margin after aborted open");
                }
            }
            return Err(e.into());
        }

        info!(operation = %op.id, user = %op.user_id, visual_id = %op.visual_id,
            "position opened");
        Ok(op)
    }

    /// Close a position fully or partially.
    ///
    /// The remaining-quantity check-then-write runs under the record's
    /// version guard; a missed guard is retried up to the configured bound
    /// before surfacing `ConcurrentModification`.
    pub async fn close_position(
        &self,
        user: &UserId,
        operation_id: Uuid,
        close_price: Decimal,
        quantity_to_close: Option<i64>,
    ) -> Result<CloseOutcome, AppError> {
        if !close_price.is_positive() {
            return Err(AppError::InvalidPrice("closePrice must be > 0".to_string()));
        }

        for _ in 0..=self.retry_limit {
            let record = self
                .repo
                .fetch_operation(operation_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("operation {}", operation_id)))?;

            let outcome = match self
                .try_close(user, &record, close_price, quantity_to_close)
                .await?
            {
                Some(outcome) => outcome,
                None => {
                    warn!(operation = %operation_id, "close raced, retrying");
                    continue;
                }
            };
            return Ok(outcome);
        }

        Err(AppError::ConcurrentModification(operation_id.to_string()))
    }

    /// One guarded close attempt. Ok(None) means the version guard missed.
    async fn try_close(
        &self,
        user: &UserId,
        record: &OperationRecord,
        close_price: Decimal,
        quantity_to_close: Option<i64>,
    ) -> Result<Option<CloseOutcome>, AppError> {
        let parent = &record.operation;

        if parent.user_id != *user {
            return Err(AppError::Forbidden(format!(
                "operation {} belongs to another user",
                parent.id
            )));
        }
        if parent.is_derived_slice() {
            return Err(AppError::InvalidQuantity(
                "a realized slice cannot be closed again".to_string(),
            ));
        }
        if !parent.status.is_closable() {
            return Err(AppError::InvalidQuantity(
                "operation is already fully closed".to_string(),
            ));
        }

        let remaining = parent.remaining_quantity;
        let quantity = quantity_to_close.unwrap_or(remaining);
        if quantity <= 0 || quantity > remaining {
            return Err(AppError::InvalidQuantity(format!(
                "quantityToClose must be between 1 and {}",
                remaining
            )));
        }

        let result = parent.slice_result(close_price, quantity);
        let closed_at = TimeMs::now();

        if quantity == remaining && !record.has_children {
            // Simple full close of a never-split position: finalize in
            // place, no derived record. The record itself qualifies for P&L.
            let close_notional = close_price * Decimal::from_i64(quantity);
            let released = parent.margin_allocated;

            let applied = self
                .repo
                .apply_full_close(
                    parent.id,
                    record.version,
                    &close_price.to_canonical_string(),
                    &close_notional.to_canonical_string(),
                    &result.to_canonical_string(),
                    closed_at,
                )
                .await?;
            if !applied {
                return Ok(None);
            }

            if released.is_positive() {
                self.ledger.release(user, released).await?;
            }

            let parent = self.refetch(parent.id).await?;
            info!(operation = %parent.id, result = %result, "position fully closed");
            return Ok(Some(CloseOutcome {
                parent,
                realized_child: None,
            }));
        }

        if quantity == remaining {
            // Last remaining slice of a previously split parent: the parent
            // closes in place, but its realized value must live entirely in
            // its children, so the final slice gets a derived record too.
            let close_notional = close_price * Decimal::from_i64(quantity);
            let released = parent.margin_allocated;
            let child =
                parent.realized_slice(quantity, close_price, result, released, closed_at);

            let applied = self
                .repo
                .apply_final_slice_close(
                    parent.id,
                    record.version,
                    &close_price.to_canonical_string(),
                    &close_notional.to_canonical_string(),
                    &result.to_canonical_string(),
                    closed_at,
                    &child,
                )
                .await?;
            if !applied {
                return Ok(None);
            }

            if released.is_positive() {
                self.ledger.release(user, released).await?;
            }

            let parent = self.refetch(parent.id).await?;
            info!(operation = %parent.id, child = %child.id, result = %result,
                "split position finalized");
            return Ok(Some(CloseOutcome {
                parent,
                realized_child: Some(child),
            }));
        }

        // True partial close: spawn the derived record, retain the remainder.
        let margin_share = proportional_margin(parent.margin_allocated, quantity, remaining);
        let child = parent.realized_slice(quantity, close_price, result, margin_share, closed_at);
        let new_remaining = remaining - quantity;
        let new_margin = parent.margin_allocated - margin_share;

        let applied = self
            .repo
            .apply_partial_close(
                parent.id,
                record.version,
                new_remaining,
                &new_margin.to_canonical_string(),
                &child,
            )
            .await?;
        if !applied {
            return Ok(None);
        }

        if margin_share.is_positive() {
            self.ledger.release(user, margin_share).await?;
        }

        let parent = self.refetch(parent.id).await?;
        info!(operation = %parent.id, child = %child.id, result = %result,
            remaining = new_remaining, "position partially closed");
        Ok(Some(CloseOutcome {
            parent,
            realized_child: Some(child),
        }))
    }

    /// Administrative delete, cascading to derived slices.
    ///
    /// Margin still held by the record is released; realized slices already
    /// released theirs at close time.
    pub async fn delete_position(&self, user: &UserId, operation_id: Uuid) -> Result<(), AppError> {
        let record = self
            .repo
            .fetch_operation(operation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("operation {}", operation_id)))?;
        let op = &record.operation;

        if op.user_id != *user {
            return Err(AppError::Forbidden(format!(
                "operation {} belongs to another user",
                op.id
            )));
        }

        let held = if op.status.is_closable() {
            op.margin_allocated
        } else {
            Decimal::zero()
        };

        let removed = self.repo.delete_operation_cascade(operation_id).await?;

        if held.is_positive() {
            self.ledger.release(user, held).await?;
        }

        info!(operation = %operation_id, removed, "operation deleted");
        Ok(())
    }

    async fn refetch(&self, id: Uuid) -> Result<Operation, AppError> {
        Ok(self
            .repo
            .fetch_operation(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("operation {} vanished mid-update", id)))?
            .operation)
    }
}

/// The margin share consumed by closing `quantity` of `remaining` units.
///
/// The last slice takes the exact remainder so rounding never strands
/// margin on the parent.
fn proportional_margin(margin_allocated: Decimal, quantity: i64, remaining: i64) -> Decimal {
    if remaining == 0 {
        return Decimal::zero();
    }
    if quantity == remaining {
        return margin_allocated;
    }
    margin_allocated * Decimal::from_i64(quantity) / Decimal::from_i64(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_proportional_margin_share() {
        assert_eq!(proportional_margin(dec("500"), 40, 100), dec("200"));
        assert_eq!(proportional_margin(dec("300"), 60, 60), dec("300"));
        assert_eq!(proportional_margin(dec("0"), 10, 100), dec("0"));
    }

    #[test]
    fn test_proportional_margin_zero_remaining() {
        assert_eq!(proportional_margin(dec("100"), 0, 0), dec("0"));
    }
}
