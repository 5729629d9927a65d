//! HTTP price source for a quote API.

use super::{PriceSource, PriceSourceError};
use crate::domain::Decimal;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Price source backed by a JSON quote endpoint
/// (`GET {base_url}/quotes/{ticker}` → `{"last": <number>}`).
#[derive(Debug, Clone)]
pub struct HttpPriceSource {
    client: Client,
    base_url: String,
}

impl HttpPriceSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn get_quote(&self, ticker: &str) -> Result<Option<serde_json::Value>, PriceSourceError> {
        let url = format!("{}/quotes/{}", self.base_url, ticker);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self.client.get(&url).send().await.map_err(|e| {
                backoff::Error::transient(PriceSourceError::NetworkError(e.to_string()))
            })?;

            let status = response.status();
            if status == 404 {
                return Ok(None);
            }
            if status == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(PriceSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(PriceSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map(Some)
                .map_err(|e| {
                    backoff::Error::permanent(PriceSourceError::ParseError(e.to_string()))
                })
        })
        .await
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn quote(&self, ticker: &str) -> Result<Option<Decimal>, PriceSourceError> {
        debug!(ticker, "fetching display quote");

        let body = match self.get_quote(ticker).await? {
            Some(body) => body,
            None => return Ok(None),
        };

        let last = match body.get("last") {
            Some(v) => v,
            None => return Ok(None),
        };

        let parsed = match last {
            serde_json::Value::String(s) => Decimal::from_str(s).ok(),
            serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
            _ => None,
        };

        match parsed {
            Some(price) => Ok(Some(price)),
            None => Err(PriceSourceError::ParseError(format!(
                "unparseable last price: {}",
                last
            ))),
        }
    }
}
