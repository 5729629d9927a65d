//! Computation and orchestration engines for the position ledger.

pub mod lifecycle;
pub mod margin;
pub mod period;
pub mod ranking;
pub mod report;

pub use lifecycle::{CloseOutcome, LifecycleManager, OpenSpec};
pub use margin::MarginLedger;
pub use period::{Period, ResolvedPeriod};
pub use ranking::RankedOperation;
pub use report::{
    compute_report, qualifying_closed, sum_results, trend_percent, DistributionItem, MonthBucket,
    OperationSummary, Report,
};
