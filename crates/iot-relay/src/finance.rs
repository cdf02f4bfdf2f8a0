// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Finnhub quote data source.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::source::{DataSource, Reading, SourceError};

pub const DEFAULT_FINANCE_URL: &str = "https://finnhub.io/api/v1/quote";
pub const DEFAULT_SYMBOLS: &[&str] = &["DIA", "COINBASE:BTC-USD", "QQQ"];

#[derive(Debug, Clone)]
pub struct FinanceConfig {
    pub base_url: String,
    pub api_key: String,
    pub symbols: Vec<String>,
    pub timeout: Duration,
}

#[derive(Deserialize, Debug, Default)]
struct Quote {
    #[serde(rename = "c", default)]
    current_price: f64,
}

pub struct FinanceSource {
    client: reqwest::Client,
    config: FinanceConfig,
}

/// Channel name for a ticker symbol, e.g. `COINBASE:BTC-USD` -> `finance.coinbase-btc-usd`.
pub fn symbol_channel(symbol: &str) -> String {
    format!("finance.{}", symbol.to_lowercase().replace(':', "-"))
}

impl FinanceSource {
    pub fn new(config: FinanceConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, SourceError> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[("symbol", symbol)])
            .header("X-Finnhub-Token", &self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| SourceError::Invalid(e.to_string()))
    }
}

#[async_trait]
impl DataSource for FinanceSource {
    fn name(&self) -> &str {
        "finance"
    }

    /// Fails only when no symbol could be fetched; individual failures are logged.
    async fn poll(&self) -> Result<Vec<Reading>, SourceError> {
        let mut readings = Vec::with_capacity(self.config.symbols.len());
        let mut last_error = None;

        for symbol in &self.config.symbols {
            match self.quote(symbol).await {
                Ok(quote) if quote.current_price == 0.0 => {
                    debug!("Ignoring zero-valued quote for {}", symbol);
                }
                Ok(quote) => {
                    debug!("Quote for {}: {}", symbol, quote.current_price);
                    readings.push(Reading::new(symbol_channel(symbol), quote.current_price));
                }
                Err(e) => {
                    warn!("Error getting quote for {}: {}", symbol, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if readings.is_empty() => Err(e),
            _ => Ok(readings),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::Value;
    use mockito::{Matcher, Server};

    fn source(base_url: String, symbols: &[&str]) -> FinanceSource {
        FinanceSource::new(FinanceConfig {
            base_url,
            api_key: "finance-key".to_string(),
            symbols: symbols.iter().map(|s| (*s).to_string()).collect(),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn test_symbol_channel() {
        assert_eq!(symbol_channel("QQQ"), "finance.qqq");
        assert_eq!(
            symbol_channel("COINBASE:BTC-USD"),
            "finance.coinbase-btc-usd"
        );
    }

    #[tokio::test]
    async fn test_poll_skips_zero_and_failed_quotes() {
        let mut server = Server::new_async().await;
        let qqq = server
            .mock("GET", "/quote")
            .match_query(Matcher::UrlEncoded("symbol".into(), "QQQ".into()))
            .match_header("X-Finnhub-Token", "finance-key")
            .with_status(200)
            .with_body(r#"{"c": 351.25, "h": 352.0, "l": 349.1}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::UrlEncoded("symbol".into(), "DELISTED".into()))
            .with_status(200)
            .with_body(r#"{"c": 0}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::UrlEncoded("symbol".into(), "BROKEN".into()))
            .with_status(500)
            .create_async()
            .await;

        let readings = source(
            format!("{}/quote", server.url()),
            &["QQQ", "DELISTED", "BROKEN"],
        )
        .poll()
        .await
        .unwrap();

        qqq.assert_async().await;
        assert_eq!(
            readings,
            vec![Reading {
                channel: "finance.qqq".to_string(),
                value: Value::Number(351.25),
            }]
        );
    }

    #[tokio::test]
    async fn test_poll_fails_when_every_symbol_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("API limit reached")
            .create_async()
            .await;

        let result = source(format!("{}/quote", server.url()), &["QQQ", "DIA"])
            .poll()
            .await;
        assert!(matches!(
            result,
            Err(SourceError::Status { status: 429, .. })
        ));
    }
}
