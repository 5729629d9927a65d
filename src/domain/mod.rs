//! Domain types for the options position ledger.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: UserId, Ticker, OptionKind, Direction, TimeMs, MonthRef
//! - The Operation entity and its lifecycle status
//! - Margin account and adjustment types

pub mod decimal;
pub mod margin;
pub mod operation;
pub mod primitives;

pub use decimal::Decimal;
pub use margin::{AdjustmentKind, MarginAccount, MarginAdjustment};
pub use operation::{slice_result, Operation, OperationStatus};
pub use primitives::{Direction, MonthRef, OptionKind, Ticker, TimeMs, UserId, MONTH_ABBREV};
