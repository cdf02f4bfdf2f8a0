// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Adafruit IO implementation of [`TelemetrySink`].
//!
//! Each data point is a single `POST {base_url}/{username}/feeds/{feed}/data` with the
//! `X-AIO-Key` header and a JSON body of `{"value": "<value>"}`. The user and feed
//! are percent-encoded as single path segments. Client errors (4xx) map to
//! [`SinkError::Request`], everything else to [`SinkError::General`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use tracing::debug;

use crate::message::Value;
use crate::sink::{SinkError, TelemetrySink};

pub const DEFAULT_AIO_URL: &str = "https://io.adafruit.com/api/v2";

#[derive(Debug, Clone)]
pub struct AdafruitConfig {
    pub base_url: String,
    pub username: String,
    pub key: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct Datum {
    value: String,
}

#[derive(Debug, Clone)]
pub struct AdafruitSink {
    client: reqwest::Client,
    base_url: Url,
    config: AdafruitConfig,
}

impl AdafruitSink {
    pub fn new(config: AdafruitConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::General(format!("unable to build HTTP client: {}", e)))?;
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            SinkError::General(format!("invalid base URL {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SinkError::General(format!(
                "invalid base URL {}: not a hierarchical URL",
                config.base_url
            )));
        }
        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    fn feed_url(&self, feed: &str) -> Result<Url, SinkError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SinkError::General(format!("cannot append a path to {}", self.base_url)))?
            .pop_if_empty()
            .extend([self.config.username.as_str(), "feeds", feed, "data"]);
        Ok(url)
    }
}

#[async_trait]
impl TelemetrySink for AdafruitSink {
    async fn send_datapoint(&self, channel: &str, value: &Value) -> Result<(), SinkError> {
        let url = self.feed_url(channel)?;
        debug!("POSTing to {}", url);

        let response = self
            .client
            .post(url)
            .header("X-AIO-Key", &self.config.key)
            .json(&Datum {
                value: value.to_string(),
            })
            .send()
            .await
            .map_err(|e| SinkError::General(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("POST succeeded: {}", status);
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(SinkError::Request {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(SinkError::General(format!("{}: {}", status, message)))
        }
    }
}
