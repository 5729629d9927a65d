//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `operations.rs` - Operation lifecycle queries and conditional updates
//! - `margin.rs` - Margin account balances and adjustment history

mod margin;
mod operations;

pub use margin::MarginAccountRecord;

use crate::domain::{
    Decimal, Direction, MonthRef, OptionKind, Operation, OperationStatus, Ticker, TimeMs, UserId,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

/// An operation row together with its optimistic-lock version and a flag
/// for whether derived slices exist for it.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    pub operation: Operation,
    pub version: i64,
    pub has_children: bool,
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }
}

fn decode_err(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

pub(crate) fn decimal_column(row: &SqliteRow, name: &str) -> Result<Decimal, sqlx::Error> {
    let raw = row.get::<String, _>(name);
    Decimal::from_str(&raw).map_err(|_| decode_err(format!("bad decimal in {}: {}", name, raw)))
}

pub(crate) fn optional_decimal_column(
    row: &SqliteRow,
    name: &str,
) -> Result<Option<Decimal>, sqlx::Error> {
    match row.get::<Option<String>, _>(name) {
        None => Ok(None),
        Some(raw) => Decimal::from_str(&raw)
            .map(Some)
            .map_err(|_| decode_err(format!("bad decimal in {}: {}", name, raw))),
    }
}

pub(crate) fn uuid_column(row: &SqliteRow, name: &str) -> Result<Uuid, sqlx::Error> {
    let raw = row.get::<String, _>(name);
    Uuid::parse_str(&raw).map_err(|_| decode_err(format!("bad uuid in {}: {}", name, raw)))
}

/// Map a full operations row (see `OPERATION_COLUMNS`) into the domain type.
pub(crate) fn operation_from_row(row: &SqliteRow) -> Result<Operation, sqlx::Error> {
    let original_operation_id = match row.get::<Option<String>, _>("original_operation_id") {
        None => None,
        Some(raw) => Some(
            Uuid::parse_str(&raw)
                .map_err(|_| decode_err(format!("bad uuid in original_operation_id: {}", raw)))?,
        ),
    };

    let kind_raw = row.get::<String, _>("kind");
    let kind = OptionKind::parse(&kind_raw)
        .ok_or_else(|| decode_err(format!("bad kind: {}", kind_raw)))?;

    let direction_raw = row.get::<String, _>("direction");
    let direction = Direction::parse(&direction_raw)
        .ok_or_else(|| decode_err(format!("bad direction: {}", direction_raw)))?;

    let status_raw = row.get::<String, _>("status");
    let status = OperationStatus::parse(&status_raw)
        .ok_or_else(|| decode_err(format!("bad status: {}", status_raw)))?;

    let reference = MonthRef::new(
        row.get::<i64, _>("reference_month") as u32,
        row.get::<i64, _>("reference_year") as i32,
    )
    .ok_or_else(|| decode_err("bad reference month".to_string()))?;

    Ok(Operation {
        id: uuid_column(row, "id")?,
        user_id: UserId::new(row.get::<String, _>("user_id")),
        original_operation_id,
        ticker: Ticker::new(row.get::<String, _>("ticker")),
        kind,
        direction,
        strike: decimal_column(row, "strike")?,
        visual_id: row.get::<String, _>("visual_id"),
        reference,
        open_price: decimal_column(row, "open_price")?,
        quantity: row.get::<i64, _>("quantity"),
        remaining_quantity: row.get::<i64, _>("remaining_quantity"),
        open_notional: decimal_column(row, "open_notional")?,
        close_price: optional_decimal_column(row, "close_price")?,
        close_notional: optional_decimal_column(row, "close_notional")?,
        result: optional_decimal_column(row, "result")?,
        margin_allocated: decimal_column(row, "margin_allocated")?,
        status,
        opened_at: TimeMs::new(row.get::<i64, _>("opened_at")),
        closed_at: row.get::<Option<i64>, _>("closed_at").map(TimeMs::new),
        notes: row.get::<Option<String>, _>("notes"),
        group_label: row.get::<Option<String>, _>("group_label"),
    })
}

pub(crate) fn record_from_row(row: &SqliteRow) -> Result<OperationRecord, sqlx::Error> {
    Ok(OperationRecord {
        operation: operation_from_row(row)?,
        version: row.get::<i64, _>("version"),
        has_children: row.get::<i64, _>("has_children") != 0,
    })
}
