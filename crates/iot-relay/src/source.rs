// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic producers feeding the relay queue.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::message::Value;
use crate::sender::{SendError, SenderHandle};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(600);
const MIN_POLL_PERIOD: Duration = Duration::from_millis(1);

/// A named reading returned by a [`DataSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub channel: String,
    pub value: Value,
}

impl Reading {
    pub fn new(channel: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            channel: channel.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    Invalid(String),
    #[error("sensor error: {0}")]
    Sensor(String),
}

/// External service polled on a schedule for readings to relay.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn poll(&self) -> Result<Vec<Reading>, SourceError>;
}

/// Polls a [`DataSource`] on a fixed interval and queues its readings.
pub struct Fetcher<S> {
    source: S,
    period: Duration,
}

impl<S: DataSource> Fetcher<S> {
    /// Periods shorter than a millisecond are raised to one.
    pub fn new(source: S, period: Duration) -> Self {
        Self {
            source,
            period: period.max(MIN_POLL_PERIOD),
        }
    }

    /// Polls immediately, then once per period, until `cancel` fires or the queue closes.
    ///
    /// A failed poll skips that cycle. Both the wait for the next tick and the poll
    /// itself are abandoned as soon as `cancel` fires.
    pub async fn run(self, handle: SenderHandle, cancel: CancellationToken) {
        let name = self.source.name().to_string();
        info!("{} fetcher started", name);

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            debug!("{} fetcher requesting data", name);
            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                polled = self.source.poll() => polled,
            };

            match polled {
                Ok(readings) => {
                    if !publish(&name, &handle, readings, &cancel).await {
                        break;
                    }
                }
                Err(e) => warn!("{} fetch failed, skipping cycle: {}", name, e),
            }
        }

        info!("{} fetcher stopped", name);
    }
}

/// Returns false once the producer should stop.
async fn publish(
    name: &str,
    handle: &SenderHandle,
    readings: Vec<Reading>,
    cancel: &CancellationToken,
) -> bool {
    for reading in readings {
        if cancel.is_cancelled() {
            return false;
        }
        match handle.send(reading.channel, reading.value, cancel).await {
            Ok(()) => {}
            Err(SendError::Message(e)) => warn!("{} produced an invalid reading: {}", name, e),
            Err(SendError::Queue(e)) => {
                debug!("{} fetcher cannot enqueue: {}", name, e);
                return false;
            }
        }
    }
    true
}
