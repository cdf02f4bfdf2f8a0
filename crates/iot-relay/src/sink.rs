// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::message::Value;

/// Failure reported by a sink for a single data point. Never fatal to the relay.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The sink rejected the request itself (malformed, unknown feed, throttled).
    #[error("request rejected ({status}): {message}")]
    Request { status: u16, message: String },

    /// Transport, authentication or any other failure.
    #[error("delivery failed: {0}")]
    General(String),
}

/// Remote destination for named data points.
///
/// The relay calls a sink serially from a single task, so implementations need not
/// handle concurrent calls. Any retry policy belongs inside the implementation.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send_datapoint(&self, channel: &str, value: &Value) -> Result<(), SinkError>;
}
