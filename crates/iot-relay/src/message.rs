// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Immutable data points carried through the relay queue.

use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message channel name cannot be empty")]
    EmptyChannel,
}

/// Payload of a single data point.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        Self::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A named channel and the value to publish on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    channel: String,
    value: Value,
}

impl Message {
    pub fn new(channel: impl Into<String>, value: impl Into<Value>) -> Result<Self, MessageError> {
        let channel = channel.into();
        if channel.trim().is_empty() {
            return Err(MessageError::EmptyChannel);
        }
        Ok(Self {
            channel,
            value: value.into(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}
