// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sinks shared by the relay integration tests

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use iot_relay::message::Value;
use iot_relay::sink::{SinkError, TelemetrySink};

/// Records every data point it is given, in call order.
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<(String, String)>>,
    /// 1-based call number that returns a general error
    fail_on: Option<usize>,
    delay: Option<Duration>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on: Some(call),
            ..Default::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TelemetrySink for RecordingSink {
    async fn send_datapoint(&self, channel: &str, value: &Value) -> Result<(), SinkError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((channel.to_string(), value.to_string()));
            calls.len()
        };
        if self.fail_on == Some(call) {
            return Err(SinkError::General("connection reset".to_string()));
        }
        Ok(())
    }
}
