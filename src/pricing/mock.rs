//! Mock price source for testing without network calls.

use super::{PriceSource, PriceSourceError};
use crate::domain::Decimal;
use async_trait::async_trait;
use std::collections::HashMap;

/// Mock price source returning predefined quotes.
#[derive(Debug, Clone, Default)]
pub struct MockPriceSource {
    quotes: HashMap<String, Decimal>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(mut self, ticker: &str, price: Decimal) -> Self {
        self.quotes.insert(ticker.to_string(), price);
        self
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn quote(&self, ticker: &str) -> Result<Option<Decimal>, PriceSourceError> {
        Ok(self.quotes.get(ticker).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_mock_returns_configured_quote() {
        let source =
            MockPriceSource::new().with_quote("PETR4", Decimal::from_str("36.20").unwrap());
        let quote = source.quote("PETR4").await.unwrap();
        assert_eq!(quote, Some(Decimal::from_str("36.20").unwrap()));
        assert_eq!(source.quote("VALE3").await.unwrap(), None);
    }
}
