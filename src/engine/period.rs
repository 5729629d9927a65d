//! Period resolution for reports.
//!
//! Turns a report request into either a concrete date range (rolling
//! windows, "all time") or a categorical month/year filter, and computes the
//! equivalent prior period for trend comparison.

use crate::domain::{MonthRef, TimeMs};
use chrono::Months;
use serde::{Deserialize, Serialize};

/// A report period as requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    LastMonth,
    Last3Months,
    Last6Months,
    SpecificMonth(MonthRef),
    All,
}

/// A period resolved against a concrete "now".
///
/// Range bounds are explicit options — an absent bound means unbounded, not
/// some sentinel epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedPeriod {
    Range {
        from: Option<TimeMs>,
        to: Option<TimeMs>,
    },
    /// Categorical filter on the operation's reference month/year pair.
    Reference(MonthRef),
}

impl Period {
    /// Parse the `period`/`month`/`year` query parameters.
    ///
    /// `specificMonth` requires a pt-BR month name (abbreviated or full)
    /// and a year; the other variants ignore both.
    pub fn parse(
        period: &str,
        month: Option<&str>,
        year: Option<i32>,
    ) -> Result<Period, String> {
        match period {
            "lastMonth" => Ok(Period::LastMonth),
            "last3Months" => Ok(Period::Last3Months),
            "last6Months" => Ok(Period::Last6Months),
            "all" => Ok(Period::All),
            "specificMonth" => {
                let name = month.ok_or("specificMonth requires a month parameter")?;
                let month = MonthRef::parse_month_name(name)
                    .ok_or_else(|| format!("unknown month name: {}", name))?;
                let year = year.ok_or("specificMonth requires a year parameter")?;
                let reference =
                    MonthRef::new(month, year).ok_or("month must be between 1 and 12")?;
                Ok(Period::SpecificMonth(reference))
            }
            other => Err(format!(
                "period must be lastMonth, last3Months, last6Months, specificMonth or all, got {}",
                other
            )),
        }
    }

    /// Resolve this period against `now`.
    pub fn resolve(&self, now: TimeMs) -> ResolvedPeriod {
        match self {
            Period::LastMonth => rolling_window(now, 1),
            Period::Last3Months => rolling_window(now, 3),
            Period::Last6Months => rolling_window(now, 6),
            Period::SpecificMonth(reference) => ResolvedPeriod::Reference(*reference),
            Period::All => ResolvedPeriod::Range {
                from: None,
                to: None,
            },
        }
    }

    /// The equivalent prior period: one calendar month earlier for a
    /// specific month, a back-shifted window of identical duration for
    /// rolling windows, none for "all time".
    pub fn prior(&self, now: TimeMs) -> Option<ResolvedPeriod> {
        match self {
            Period::All => None,
            Period::SpecificMonth(reference) => {
                Some(ResolvedPeriod::Reference(reference.previous()))
            }
            _ => match self.resolve(now) {
                ResolvedPeriod::Range {
                    from: Some(from),
                    to: Some(to),
                } => {
                    let span = to.as_i64() - from.as_i64();
                    Some(ResolvedPeriod::Range {
                        from: Some(TimeMs::new(from.as_i64() - span)),
                        to: Some(TimeMs::new(from.as_i64() - 1)),
                    })
                }
                _ => None,
            },
        }
    }
}

fn rolling_window(now: TimeMs, months: u32) -> ResolvedPeriod {
    let end = now.to_datetime();
    let start = end
        .checked_sub_months(Months::new(months))
        .unwrap_or(end);
    ResolvedPeriod::Range {
        from: Some(TimeMs::new(start.timestamp_millis())),
        to: Some(now),
    }
}
