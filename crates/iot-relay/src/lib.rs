// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Relays readings from periodic data sources (web APIs and, with the `rpi`
//! feature, I2C sensors) to an Adafruit IO telemetry sink.
//!
//! Producers queue data points through a [`sender::SenderHandle`]; a single
//! [`sender::Sender`] loop forwards them to a [`sink::TelemetrySink`] one at a time,
//! and [`shutdown::Supervisor`] stops everything in an order that drains the queue.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod adafruit;
pub mod config;
pub mod conversion;
pub mod error;
pub mod finance;
pub mod message;
pub mod queue;
pub mod sender;
pub mod sensor;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod weather;
