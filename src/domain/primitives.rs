//! Domain primitives: UserId, Ticker, OptionKind, Direction, TimeMs, MonthRef.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(Utc::now().timestamp_millis())
    }

    /// Calendar (year, month 1-12) of this instant, UTC.
    pub fn year_month(&self) -> (i32, u32) {
        let dt = self.to_datetime();
        (dt.year(), dt.month())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.0).unwrap_or_default()
    }
}

/// Resolved end-user identifier, supplied by the authorization layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: String) -> Self {
        UserId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Underlying ticker symbol (e.g. "PETR4", "BOVA11").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ticker(pub String);

impl Ticker {
    pub fn new(ticker: String) -> Self {
        Ticker(ticker.to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instrument type: call or put option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionKind {
    Call,
    Put,
}

impl OptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKind::Call => "CALL",
            OptionKind::Put => "PUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CALL" => Some(OptionKind::Call),
            "PUT" => Some(OptionKind::Put),
            _ => None,
        }
    }
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trade direction: Buy (long premium) or Sell (short premium).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Signed multiplier for result computation (+1 for Buy, -1 for Sell).
    pub fn sign(&self) -> i32 {
        match self {
            Direction::Buy => 1,
            Direction::Sell => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Some(Direction::Buy),
            "SELL" => Some(Direction::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Month/year reference pair used for categorical bucketing, independent of
/// the actual open/close dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthRef {
    /// Month 1-12.
    pub month: u32,
    pub year: i32,
}

/// Abbreviated pt-BR month labels, indexed by month-1.
pub const MONTH_ABBREV: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

const MONTH_FULL: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

impl MonthRef {
    pub fn new(month: u32, year: i32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(MonthRef { month, year })
        } else {
            None
        }
    }

    /// Bucket label: abbreviated month plus 2-digit year, e.g. "Abr/24".
    pub fn label(&self) -> String {
        format!(
            "{}/{:02}",
            MONTH_ABBREV[(self.month - 1) as usize],
            self.year.rem_euclid(100)
        )
    }

    /// Parse a pt-BR month name, abbreviated or full, case-insensitive.
    pub fn parse_month_name(name: &str) -> Option<u32> {
        let name = name.trim();
        for (i, abbrev) in MONTH_ABBREV.iter().enumerate() {
            if name.eq_ignore_ascii_case(abbrev) {
                return Some(i as u32 + 1);
            }
        }
        for (i, full) in MONTH_FULL.iter().enumerate() {
            if name.to_lowercase() == full.to_lowercase() {
                return Some(i as u32 + 1);
            }
        }
        None
    }

    /// The calendar month immediately before this one.
    pub fn previous(&self) -> MonthRef {
        if self.month == 1 {
            MonthRef {
                month: 12,
                year: self.year - 1,
            }
        } else {
            MonthRef {
                month: self.month - 1,
                year: self.year,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::Buy.sign(), 1);
        assert_eq!(Direction::Sell.sign(), -1);
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::parse("buy"), Some(Direction::Buy));
        assert_eq!(Direction::parse("SELL"), Some(Direction::Sell));
        assert_eq!(Direction::parse("hold"), None);
    }

    #[test]
    fn test_option_kind_serialization() {
        let json = serde_json::to_string(&OptionKind::Call).unwrap();
        assert_eq!(json, "\"CALL\"");
        let json = serde_json::to_string(&OptionKind::Put).unwrap();
        assert_eq!(json, "\"PUT\"");
    }

    #[test]
    fn test_ticker_uppercased() {
        let ticker = Ticker::new("petr4".to_string());
        assert_eq!(ticker.as_str(), "PETR4");
    }

    #[test]
    fn test_timems_year_month() {
        // 2024-04-15T12:00:00Z
        let t = TimeMs::new(1_713_182_400_000);
        assert_eq!(t.year_month(), (2024, 4));
    }

    #[test]
    fn test_timems_ordering() {
        assert!(TimeMs::new(1000) < TimeMs::new(2000));
    }

    #[test]
    fn test_month_ref_validation() {
        assert!(MonthRef::new(0, 2024).is_none());
        assert!(MonthRef::new(13, 2024).is_none());
        assert!(MonthRef::new(12, 2024).is_some());
    }

    #[test]
    fn test_month_ref_previous_wraps_year() {
        let jan = MonthRef::new(1, 2024).unwrap();
        assert_eq!(jan.previous(), MonthRef::new(12, 2023).unwrap());
        let apr = MonthRef::new(4, 2024).unwrap();
        assert_eq!(apr.previous(), MonthRef::new(3, 2024).unwrap());
    }

    #[test]
    fn test_month_ref_label() {
        assert_eq!(MonthRef::new(4, 2024).unwrap().label(), "Abr/24");
        assert_eq!(MonthRef::new(12, 2023).unwrap().label(), "Dez/23");
        assert_eq!(MonthRef::new(2, 2009).unwrap().label(), "Fev/09");
    }

    #[test]
    fn test_parse_month_name() {
        assert_eq!(MonthRef::parse_month_name("Abr"), Some(4));
        assert_eq!(MonthRef::parse_month_name("abril"), Some(4));
        assert_eq!(MonthRef::parse_month_name("DEZ"), Some(12));
        assert_eq!(MonthRef::parse_month_name("Janeiro"), Some(1));
        assert_eq!(MonthRef::parse_month_name("Smarch"), None);
    }
}
