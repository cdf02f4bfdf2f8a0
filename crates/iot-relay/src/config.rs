// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

use crate::adafruit::{AdafruitConfig, DEFAULT_AIO_URL};
use crate::error::RelayError;
use crate::finance::{FinanceConfig, DEFAULT_FINANCE_URL, DEFAULT_SYMBOLS};
use crate::sender::DEFAULT_QUEUE_CAPACITY;
use crate::sensor::{SensorConfig, DEFAULT_ALTITUDE_M, DEFAULT_ROOM, DEFAULT_SAMPLES_PER_REPORT};
use crate::source::DEFAULT_POLL_INTERVAL;
use crate::weather::{Units, WeatherConfig, DEFAULT_WEATHER_URL};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Coordinates and key for the weather producer.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSettings {
    pub api_key: String,
    pub latitude: f64,
    pub longitude: f64,
    pub units: Units,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinanceSettings {
    pub api_key: String,
    pub symbols: Vec<String>,
    pub base_url: String,
}

/// I2C sensor board, only read by builds with the `rpi` feature.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSettings {
    /// I2C device path, e.g. `/dev/i2c-1`
    pub device: String,
    pub room: String,
    pub altitude_m: f64,
    pub samples_per_report: usize,
}

/// Configuration for the relay process
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Adafruit IO user name
    pub aio_username: String,
    /// Adafruit IO key
    pub aio_key: String,
    pub aio_base_url: String,
    /// Weather producer, disabled when `OPEN_WEATHER_KEY` is unset
    pub weather: Option<WeatherSettings>,
    /// Finance producer, disabled when `FINNHUB_API_KEY` is unset
    pub finance: Option<FinanceSettings>,
    /// Sensor producer, disabled when `RELAY_I2C_DEVICE` is unset
    pub sensor: Option<SensorSettings>,
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    /// Upper bound on the wait for queued items during shutdown
    pub drain_timeout: Duration,
    /// Stop on our own after this long instead of waiting for a signal
    pub run_duration: Option<Duration>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl RelayConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key/value lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| RelayError::InvalidConfig(format!("{} is not defined", key)))
        };
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|val| val.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let weather = match lookup("OPEN_WEATHER_KEY") {
            Some(api_key) => Some(WeatherSettings {
                api_key,
                latitude: parse_number("OPEN_WEATHER_LAT", required("OPEN_WEATHER_LAT")?)?,
                longitude: parse_number("OPEN_WEATHER_LON", required("OPEN_WEATHER_LON")?)?,
                units: lookup("OPEN_WEATHER_UNITS")
                    .map(|val| val.parse::<Units>())
                    .transpose()
                    .map_err(RelayError::InvalidConfig)?
                    .unwrap_or_default(),
                base_url: lookup("RELAY_WEATHER_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_WEATHER_URL.to_string()),
            }),
            None => None,
        };

        let finance = lookup("FINNHUB_API_KEY").map(|api_key| FinanceSettings {
            api_key,
            symbols: lookup("FINNHUB_SYMBOLS")
                .map(|val| parse_symbols(&val))
                .unwrap_or_else(|| DEFAULT_SYMBOLS.iter().map(|s| (*s).to_string()).collect()),
            base_url: lookup("RELAY_FINANCE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_FINANCE_URL.to_string()),
        });

        let sensor = match lookup("RELAY_I2C_DEVICE") {
            Some(device) => Some(SensorSettings {
                device,
                room: lookup("RELAY_SENSOR_ROOM").unwrap_or_else(|| DEFAULT_ROOM.to_string()),
                altitude_m: lookup("RELAY_SENSOR_ALTITUDE_M")
                    .map(|val| parse_number("RELAY_SENSOR_ALTITUDE_M", val))
                    .transpose()?
                    .unwrap_or(DEFAULT_ALTITUDE_M),
                samples_per_report: lookup("RELAY_SENSOR_SAMPLES")
                    .and_then(|val| val.trim().parse::<usize>().ok())
                    .unwrap_or(DEFAULT_SAMPLES_PER_REPORT),
            }),
            None => None,
        };

        let config = Self {
            aio_username: required("IO_USERNAME")?,
            aio_key: required("IO_KEY")?,
            aio_base_url: lookup("RELAY_AIO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_AIO_URL.to_string()),
            weather,
            finance,
            sensor,
            queue_capacity: lookup("RELAY_QUEUE_CAPACITY")
                .and_then(|val| val.trim().parse::<usize>().ok())
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            poll_interval: secs("RELAY_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL),
            http_timeout: secs("RELAY_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT),
            drain_timeout: secs("RELAY_DRAIN_TIMEOUT_SECS", DEFAULT_DRAIN_TIMEOUT),
            run_duration: lookup("RELAY_RUN_DURATION_SECS")
                .and_then(|val| val.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
            log_level: lookup("RELAY_LOG_LEVEL")
                .map(|val| val.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.aio_username.trim().is_empty() || self.aio_key.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "IO_USERNAME and IO_KEY cannot be empty".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(RelayError::InvalidConfig(
                "Queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(RelayError::InvalidConfig(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.http_timeout.is_zero() {
            return Err(RelayError::InvalidConfig(
                "HTTP timeout must be greater than 0".to_string(),
            ));
        }

        if self.drain_timeout.is_zero() {
            return Err(RelayError::InvalidConfig(
                "Drain timeout must be greater than 0".to_string(),
            ));
        }

        if let Some(weather) = &self.weather {
            if !(-90.0..=90.0).contains(&weather.latitude) {
                return Err(RelayError::InvalidConfig(format!(
                    "Latitude {} is out of range",
                    weather.latitude
                )));
            }
            if !(-180.0..=180.0).contains(&weather.longitude) {
                return Err(RelayError::InvalidConfig(format!(
                    "Longitude {} is out of range",
                    weather.longitude
                )));
            }
        }

        if let Some(finance) = &self.finance {
            if finance.symbols.is_empty() {
                return Err(RelayError::InvalidConfig(
                    "FINNHUB_SYMBOLS cannot be empty".to_string(),
                ));
            }
        }

        if let Some(sensor) = &self.sensor {
            if sensor.device.trim().is_empty() || sensor.room.trim().is_empty() {
                return Err(RelayError::InvalidConfig(
                    "RELAY_I2C_DEVICE and RELAY_SENSOR_ROOM cannot be empty".to_string(),
                ));
            }
            if sensor.samples_per_report == 0 {
                return Err(RelayError::InvalidConfig(
                    "Sensor samples per report must be greater than 0".to_string(),
                ));
            }
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(RelayError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    pub fn adafruit_config(&self) -> AdafruitConfig {
        AdafruitConfig {
            base_url: self.aio_base_url.clone(),
            username: self.aio_username.clone(),
            key: self.aio_key.clone(),
            timeout: self.http_timeout,
        }
    }

    pub fn weather_config(&self) -> Option<WeatherConfig> {
        self.weather.as_ref().map(|weather| WeatherConfig {
            base_url: weather.base_url.clone(),
            api_key: weather.api_key.clone(),
            latitude: weather.latitude,
            longitude: weather.longitude,
            units: weather.units,
            timeout: self.http_timeout,
        })
    }

    pub fn finance_config(&self) -> Option<FinanceConfig> {
        self.finance.as_ref().map(|finance| FinanceConfig {
            base_url: finance.base_url.clone(),
            api_key: finance.api_key.clone(),
            symbols: finance.symbols.clone(),
            timeout: self.http_timeout,
        })
    }

    pub fn sensor_config(&self) -> Option<SensorConfig> {
        self.sensor.as_ref().map(|sensor| SensorConfig {
            room: sensor.room.clone(),
            altitude_m: sensor.altitude_m,
            samples_per_report: sensor.samples_per_report,
            ..SensorConfig::default()
        })
    }
}

fn parse_number(key: &str, value: String) -> Result<f64, RelayError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| RelayError::InvalidConfig(format!("{} is not a number: {}", key, e)))
}

fn parse_symbols(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|symbol| !symbol.is_empty())
        .map(str::to_string)
        .collect()
}
