pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod pricing;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Decimal, Direction, MarginAccount, MonthRef, Operation, OperationStatus, OptionKind, Ticker,
    TimeMs, UserId,
};
pub use engine::{LifecycleManager, MarginLedger, Period};
pub use error::AppError;
pub use pricing::{HttpPriceSource, MockPriceSource, PriceSource};
