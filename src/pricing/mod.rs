//! External pricing collaborator, at its interface boundary.
//!
//! Live quotes decorate open positions for display only; realized P&L is
//! always computed from recorded open/close prices, never from here.

use crate::domain::Decimal;
use async_trait::async_trait;
use std::fmt;

pub mod http;
pub mod mock;

pub use http::HttpPriceSource;
pub use mock::MockPriceSource;

/// Source of best-effort display prices for option tickers.
#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// Fetch the latest quote for a ticker, or None when the source has
    /// nothing for it.
    async fn quote(&self, ticker: &str) -> Result<Option<Decimal>, PriceSourceError>;
}

/// Error type for pricing operations.
#[derive(Debug, Clone)]
pub enum PriceSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
}

impl fmt::Display for PriceSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            PriceSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            PriceSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for PriceSourceError {}
