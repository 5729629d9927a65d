//! Margin ledger: total/used/available margin per user.
//!
//! Every mutation is a compare-and-swap against the versioned balance row,
//! retried a bounded number of times, so two concurrent closes touching the
//! same user's balance cannot lose an update.

use crate::db::Repository;
use crate::domain::{AdjustmentKind, Decimal, MarginAccount, MarginAdjustment, TimeMs, UserId};
use crate::error::AppError;
use std::sync::Arc;
use tracing::debug;

pub struct MarginLedger {
    repo: Arc<Repository>,
    retry_limit: u32,
}

impl MarginLedger {
    pub fn new(repo: Arc<Repository>, retry_limit: u32) -> Self {
        MarginLedger { repo, retry_limit }
    }

    /// Current balances plus derived available margin.
    pub async fn account(&self, user: &UserId) -> Result<MarginAccount, AppError> {
        Ok(self.repo.fetch_margin_account(user).await?.account)
    }

    /// Adjustment history, newest first.
    pub async fn adjustments(&self, user: &UserId) -> Result<Vec<MarginAdjustment>, AppError> {
        Ok(self.repo.query_margin_adjustments(user).await?)
    }

    /// Reserve `amount` against the user's available margin.
    ///
    /// Fails with `InsufficientMargin` when the reservation would exceed
    /// available margin; nothing is written in that case.
    pub async fn allocate(&self, user: &UserId, amount: Decimal) -> Result<(), AppError> {
        for _ in 0..=self.retry_limit {
            let record = self.repo.fetch_margin_account(user).await?;
            let account = &record.account;
            if amount > account.available() {
                return Err(AppError::InsufficientMargin(format!(
                    "requested {} but only {} available",
                    amount,
                    account.available()
                )));
            }
            let swapped = self
                .repo
                .cas_margin_account(
                    user,
                    record.version,
                    account.total,
                    account.allocated + amount,
                )
                .await?;
            if swapped {
                return Ok(());
            }
            debug!(user = %user, "margin allocate raced, retrying");
        }
        Err(AppError::ConcurrentModification(user.as_str().to_string()))
    }

    /// Return `amount` of reserved margin to the available pool.
    ///
    /// Floors the allocation at zero so a duplicate release cannot drive the
    /// balance negative.
    pub async fn release(&self, user: &UserId, amount: Decimal) -> Result<(), AppError> {
        for _ in 0..=self.retry_limit {
            let record = self.repo.fetch_margin_account(user).await?;
            let account = &record.account;
            let mut new_allocated = account.allocated - amount;
            if new_allocated.is_negative() {
                new_allocated = Decimal::zero();
            }
            let swapped = self
                .repo
                .cas_margin_account(user, record.version, account.total, new_allocated)
                .await?;
            if swapped {
                return Ok(());
            }
            debug!(user = %user, "margin release raced, retrying");
        }
        Err(AppError::ConcurrentModification(user.as_str().to_string()))
    }

    /// Administrative replacement of the total margin.
    ///
    /// Fails with `MarginBelowAllocated` when the new total would drop
    /// below the currently allocated margin.
    pub async fn set_total(
        &self,
        user: &UserId,
        new_total: Decimal,
        note: Option<String>,
    ) -> Result<MarginAccount, AppError> {
        for _ in 0..=self.retry_limit {
            let record = self.repo.fetch_margin_account(user).await?;
            let account = &record.account;
            if new_total < account.allocated {
                return Err(AppError::MarginBelowAllocated(format!(
                    "new total {} is below allocated {}",
                    new_total, account.allocated
                )));
            }
            let delta = new_total - account.total;
            let swapped = self
                .repo
                .cas_margin_account(user, record.version, new_total, account.allocated)
                .await?;
            if swapped {
                self.repo
                    .insert_margin_adjustment(&MarginAdjustment {
                        user_id: user.clone(),
                        at: TimeMs::now(),
                        delta,
                        kind: AdjustmentKind::SetTotal,
                        note,
                    })
                    .await?;
                return self.account(user).await;
            }
        }
        Err(AppError::ConcurrentModification(user.as_str().to_string()))
    }

    /// Manual deposit (positive delta) or withdrawal (negative delta).
    pub async fn adjust_total(
        &self,
        user: &UserId,
        delta: Decimal,
        note: Option<String>,
    ) -> Result<MarginAccount, AppError> {
        for _ in 0..=self.retry_limit {
            let record = self.repo.fetch_margin_account(user).await?;
            let account = &record.account;
            let new_total = account.total + delta;
            if new_total < account.allocated {
                return Err(AppError::MarginBelowAllocated(format!(
                    "adjusted total {} would fall below allocated {}",
                    new_total, account.allocated
                )));
            }
            let swapped = self
                .repo
                .cas_margin_account(user, record.version, new_total, account.allocated)
                .await?;
            if swapped {
                self.repo
                    .insert_margin_adjustment(&MarginAdjustment {
                        user_id: user.clone(),
                        at: TimeMs::now(),
                        delta,
                        kind: AdjustmentKind::Manual,
                        note,
                    })
                    .await?;
                return self.account(user).await;
            }
        }
        Err(AppError::ConcurrentModification(user.as_str().to_string()))
    }
}
