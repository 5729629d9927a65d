//! Margin account balances and adjustment history.

use crate::domain::{AdjustmentKind, Decimal, MarginAccount, MarginAdjustment, TimeMs, UserId};
use sqlx::Row;

use super::{decimal_column, Repository};

/// A margin balance row with its optimistic-lock version.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginAccountRecord {
    pub account: MarginAccount,
    pub version: i64,
}

impl Repository {
    /// Make sure a balance row exists for the user (zero balances).
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn ensure_margin_account(&self, user: &UserId) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO margin_accounts (user_id, total, allocated, version)
            VALUES (?, '0', '0', 0)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(user.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch the balance row with its version, creating it if absent.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn fetch_margin_account(
        &self,
        user: &UserId,
    ) -> Result<MarginAccountRecord, sqlx::Error> {
        self.ensure_margin_account(user).await?;

        let row = sqlx::query(
            "SELECT user_id, total, allocated, version FROM margin_accounts WHERE user_id = ?",
        )
        .bind(user.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(MarginAccountRecord {
            account: MarginAccount {
                user_id: UserId::new(row.get::<String, _>("user_id")),
                total: decimal_column(&row, "total")?,
                allocated: decimal_column(&row, "allocated")?,
            },
            version: row.get::<i64, _>("version"),
        })
    }

    /// Compare-and-swap the balance row. Returns false when the version
    /// guard missed and the caller should re-read and retry.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn cas_margin_account(
        &self,
        user: &UserId,
        expected_version: i64,
        new_total: Decimal,
        new_allocated: Decimal,
    ) -> Result<bool, sqlx::Error> {
        let updated = sqlx::query(
            r#"
            UPDATE margin_accounts
            SET total = ?, allocated = ?, version = version + 1
            WHERE user_id = ? AND version = ?
            "#,
        )
        .bind(new_total.to_canonical_string())
        .bind(new_allocated.to_canonical_string())
        .bind(user.as_str())
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }

    /// Append a manual adjustment history row.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_margin_adjustment(
        &self,
        adjustment: &MarginAdjustment,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO margin_adjustments (user_id, at_ms, delta, kind, note)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(adjustment.user_id.as_str())
        .bind(adjustment.at.as_i64())
        .bind(adjustment.delta.to_canonical_string())
        .bind(adjustment.kind.as_str())
        .bind(adjustment.note.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Adjustment history for a user, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_margin_adjustments(
        &self,
        user: &UserId,
    ) -> Result<Vec<MarginAdjustment>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, at_ms, delta, kind, note
            FROM margin_adjustments
            WHERE user_id = ?
            ORDER BY at_ms DESC, id DESC
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let kind_raw = row.get::<String, _>("kind");
                let kind = AdjustmentKind::parse(&kind_raw).ok_or_else(|| {
                    sqlx::Error::Decode(format!("bad adjustment kind: {}", kind_raw).into())
                })?;
                Ok(MarginAdjustment {
                    user_id: UserId::new(row.get::<String, _>("user_id")),
                    at: TimeMs::new(row.get::<i64, _>("at_ms")),
                    delta: decimal_column(row, "delta")?,
                    kind,
                    note: row.get::<Option<String>, _>("note"),
                })
            })
            .collect()
    }
}
