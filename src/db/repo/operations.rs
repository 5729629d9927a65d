//! Operation lifecycle queries and atomic conditional updates.

use crate::domain::{Operation, TimeMs, UserId};
use sqlx::Row;
use uuid::Uuid;

use super::{operation_from_row, record_from_row, OperationRecord, Repository};

/// Column list shared by all operation SELECTs. `has_children` exposes
/// whether derived slices exist, which the no-double-counting filter needs.
const OPERATION_SELECT: &str = r#"
    SELECT o.id, o.user_id, o.original_operation_id, o.ticker, o.kind, o.direction,
           o.strike, o.visual_id, o.reference_month, o.reference_year,
           o.open_price, o.quantity, o.remaining_quantity, o.open_notional,
           o.close_price, o.close_notional, o.result, o.margin_allocated,
           o.status, o.opened_at, o.closed_at, o.notes, o.group_label, o.version,
           EXISTS(SELECT 1 FROM operations c WHERE c.original_operation_id = o.id)
               AS has_children
    FROM operations o
"#;

impl Repository {
    /// Insert a freshly opened (or derived) operation.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_operation(&self, op: &Operation) -> Result<(), sqlx::Error> {
        insert_operation_exec(&self.pool, op).await
    }

    /// Fetch a single operation with its version and has-children flag.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn fetch_operation(
        &self,
        id: Uuid,
    ) -> Result<Option<OperationRecord>, sqlx::Error> {
        let sql = format!("{} WHERE o.id = ?", OPERATION_SELECT);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Finalize a full close in place, guarded by the expected version.
    ///
    /// Returns false when the guard missed (concurrent close won the race).
    ///
    /// # Errors
    /// Returns an error if the update fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_full_close(
        &self,
        id: Uuid,
        expected_version: i64,
        close_price: &str,
        close_notional: &str,
        result: &str,
        closed_at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let updated = sqlx::query(
            r#"
            UPDATE operations
            SET status = 'closed',
                close_price = ?,
                close_notional = ?,
                result = ?,
                closed_at = ?,
                remaining_quantity = 0,
                margin_allocated = '0',
                version = version + 1
            WHERE id = ? AND version = ? AND status != 'closed'
            "#,
        )
        .bind(close_price)
        .bind(close_notional)
        .bind(result)
        .bind(closed_at.as_i64())
        .bind(id.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }

    /// Finalize the last remaining slice of a previously split parent: the
    /// parent closes in place while the derived record carrying the slice
    /// value is inserted, atomically in one transaction.
    ///
    /// Returns false (after rollback) when the guard missed.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_final_slice_close(
        &self,
        parent_id: Uuid,
        expected_version: i64,
        close_price: &str,
        close_notional: &str,
        result: &str,
        closed_at: TimeMs,
        child: &Operation,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE operations
            SET status = 'closed',
                close_price = ?,
                close_notional = ?,
                result = ?,
                closed_at = ?,
                remaining_quantity = 0,
                margin_allocated = '0',
                version = version + 1
            WHERE id = ? AND version = ? AND status != 'closed'
            "#,
        )
        .bind(close_price)
        .bind(close_notional)
        .bind(result)
        .bind(closed_at.as_i64())
        .bind(parent_id.to_string())
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_operation_tx(&mut tx, child).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Apply a partial close: decrement the parent under its version guard
    /// and insert the derived slice, atomically in one transaction.
    ///
    /// Returns false (after rollback) when the guard missed.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn apply_partial_close(
        &self,
        parent_id: Uuid,
        expected_version: i64,
        new_remaining: i64,
        new_margin_allocated: &str,
        child: &Operation,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE operations
            SET remaining_quantity = ?,
                margin_allocated = ?,
                status = 'partially_closed',
                version = version + 1
            WHERE id = ? AND version = ? AND status != 'closed'
            "#,
        )
        .bind(new_remaining)
        .bind(new_margin_allocated)
        .bind(parent_id.to_string())
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_operation_tx(&mut tx, child).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Open and partially-closed operations for a user, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_active(&self, user: &UserId) -> Result<Vec<Operation>, sqlx::Error> {
        let sql = format!(
            "{} WHERE o.user_id = ? AND o.status != 'closed' ORDER BY o.opened_at ASC, o.id ASC",
            OPERATION_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(operation_from_row).collect()
    }

    /// Closed records (full closes and derived slices) whose close timestamp
    /// falls inside the optional bounds.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_closed_in_range(
        &self,
        user: &UserId,
        from: Option<TimeMs>,
        to: Option<TimeMs>,
    ) -> Result<Vec<OperationRecord>, sqlx::Error> {
        let from_ms = from.map(|t| t.as_i64()).unwrap_or(i64::MIN);
        let to_ms = to.map(|t| t.as_i64()).unwrap_or(i64::MAX);

        let sql = format!(
            r#"{} WHERE o.user_id = ? AND o.closed_at IS NOT NULL
                 AND o.closed_at >= ? AND o.closed_at <= ?
               ORDER BY o.closed_at ASC, o.id ASC"#,
            OPERATION_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(from_ms)
            .bind(to_ms)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Non-closed operations whose open timestamp falls inside the bounds.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_active_opened_in_range(
        &self,
        user: &UserId,
        from: Option<TimeMs>,
        to: Option<TimeMs>,
    ) -> Result<Vec<Operation>, sqlx::Error> {
        let from_ms = from.map(|t| t.as_i64()).unwrap_or(i64::MIN);
        let to_ms = to.map(|t| t.as_i64()).unwrap_or(i64::MAX);

        let sql = format!(
            r#"{} WHERE o.user_id = ? AND o.status != 'closed'
                 AND o.opened_at >= ? AND o.opened_at <= ?
               ORDER BY o.opened_at ASC, o.id ASC"#,
            OPERATION_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(from_ms)
            .bind(to_ms)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(operation_from_row).collect()
    }

    /// All records carrying the given reference month/year pair, any status.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_by_reference(
        &self,
        user: &UserId,
        month: u32,
        year: i32,
    ) -> Result<Vec<OperationRecord>, sqlx::Error> {
        let sql = format!(
            r#"{} WHERE o.user_id = ? AND o.reference_month = ? AND o.reference_year = ?
               ORDER BY o.opened_at ASC, o.id ASC"#,
            OPERATION_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(month as i64)
            .bind(year as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Derived slices of a parent, oldest close first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_children(&self, parent_id: Uuid) -> Result<Vec<Operation>, sqlx::Error> {
        let sql = format!(
            "{} WHERE o.original_operation_id = ? ORDER BY o.closed_at ASC, o.id ASC",
            OPERATION_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(parent_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(operation_from_row).collect()
    }

    /// Administrative delete of a record and its derived slices.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub async fn delete_operation_cascade(&self, id: Uuid) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let children = sqlx::query("DELETE FROM operations WHERE original_operation_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        let parent = sqlx::query("DELETE FROM operations WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(children.rows_affected() + parent.rows_affected())
    }

    /// Count of operation rows for a user, any status. Test/diagnostic aid.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_operations(&self, user: &UserId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM operations WHERE user_id = ?")
            .bind(user.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }
}

async fn insert_operation_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    op: &Operation,
) -> Result<(), sqlx::Error> {
    insert_operation_exec(&mut **tx, op).await
}

async fn insert_operation_exec<'e, E>(executor: E, op: &Operation) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO operations
        (id, user_id, original_operation_id, ticker, kind, direction, strike,
         visual_id, reference_month, reference_year, open_price, quantity,
         remaining_quantity, open_notional, close_price, close_notional,
         result, margin_allocated, status, opened_at, closed_at, notes,
         group_label, version)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(op.id.to_string())
    .bind(op.user_id.as_str())
    .bind(op.original_operation_id.map(|id| id.to_string()))
    .bind(op.ticker.as_str())
    .bind(op.kind.as_str())
    .bind(op.direction.as_str())
    .bind(op.strike.to_canonical_string())
    .bind(op.visual_id.clone())
    .bind(op.reference.month as i64)
    .bind(op.reference.year as i64)
    .bind(op.open_price.to_canonical_string())
    .bind(op.quantity)
    .bind(op.remaining_quantity)
    .bind(op.open_notional.to_canonical_string())
    .bind(op.close_price.map(|d| d.to_canonical_string()))
    .bind(op.close_notional.map(|d| d.to_canonical_string()))
    .bind(op.result.map(|d| d.to_canonical_string()))
    .bind(op.margin_allocated.to_canonical_string())
    .bind(op.status.as_str())
    .bind(op.opened_at.as_i64())
    .bind(op.closed_at.map(|t| t.as_i64()))
    .bind(op.notes.clone())
    .bind(op.group_label.clone())
    .execute(executor)
    .await?;

    Ok(())
}
