// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! OpenWeather "one call" data source.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::conversion;
use crate::source::{DataSource, Reading, SourceError};

pub const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/onecall";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            other => Err(format!(
                "Invalid units '{}'. Must be one of: metric, imperial",
                other
            )),
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric => write!(f, "metric"),
            Self::Imperial => write!(f, "imperial"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub base_url: String,
    pub api_key: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Units of the published readings. Requests are always made in metric.
    pub units: Units,
    pub timeout: Duration,
}

#[derive(Deserialize, Debug)]
struct OneCall {
    current: CurrentConditions,
}

#[derive(Deserialize, Debug)]
struct CurrentConditions {
    // Degrees Celsius.
    temp: f64,
    // Percent.
    humidity: f64,
    // hPa.
    pressure: f64,
}

pub struct WeatherSource {
    client: reqwest::Client,
    config: WeatherConfig,
}

impl WeatherSource {
    pub fn new(config: WeatherConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn readings(&self, current: &CurrentConditions) -> Vec<Reading> {
        let abs_humidity =
            conversion::relative_humidity_to_absolute(current.humidity, current.temp);
        let (temp, pressure) = match self.config.units {
            Units::Metric => (current.temp, current.pressure),
            Units::Imperial => (
                conversion::celsius_to_fahrenheit(current.temp),
                conversion::hpa_to_inhg(current.pressure),
            ),
        };

        vec![
            Reading::new("weather.temp", temp),
            Reading::new("weather.humidity", current.humidity),
            Reading::new("weather.pressure", pressure),
            Reading::new("weather.abs_humidity", abs_humidity),
        ]
    }
}

#[async_trait]
impl DataSource for WeatherSource {
    fn name(&self) -> &str {
        "weather"
    }

    async fn poll(&self) -> Result<Vec<Reading>, SourceError> {
        debug!(
            "Requesting weather for {},{}",
            self.config.latitude, self.config.longitude
        );
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("lat", self.config.latitude.to_string()),
                ("lon", self.config.longitude.to_string()),
                ("units", Units::Metric.to_string()),
                ("exclude", "minutely,hourly,daily,alerts".to_string()),
                ("appid", self.config.api_key.clone()),
            ])
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

        let one_call: OneCall =
            serde_json::from_str(&body).map_err(|e| SourceError::Invalid(e.to_string()))?;
        info!(
            "Weather is: {}°C, {}%, {} hPa",
            one_call.current.temp, one_call.current.humidity, one_call.current.pressure
        );
        Ok(self.readings(&one_call.current))
    }
}
