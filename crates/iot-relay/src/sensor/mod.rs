// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Local I2C sensors sampled on a short period and reported as averages.
//!
//! A [`SensorSource`] takes `samples_per_report` samples, one every `sample_period`,
//! from whichever sensors are on the board, and returns the averages as readings.
//! The absolute humidity derived from the last climate report is handed to the air
//! quality sensor before each of its measurements for on-chip compensation.
//!
//! The sensor traits keep the averaging independent of the bus. Drivers for the
//! BME280, SGP30 and TSL2591 live in [`hardware`] behind the `rpi` feature.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::conversion;
use crate::source::{DataSource, Reading, SourceError};

#[cfg(feature = "rpi")]
pub mod hardware;

pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_secs(1);
pub const DEFAULT_SAMPLES_PER_REPORT: usize = 60;
pub const DEFAULT_ROOM: &str = "mbr";
pub const DEFAULT_ALTITUDE_M: f64 = 100.0;
/// Absolute humidity (g/m³) handed to the air quality sensor until the first
/// climate report.
pub const DEFAULT_ABS_HUMIDITY: f64 = 10.5;

const INDOOR_PREFIX: &str = "indoor-env";
// SGP30 reports its 400 ppm baseline until the first real reading.
const CO2_BASELINE_PPM: u16 = 400;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SensorError(pub String);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    pub celsius: f64,
    /// Percent.
    pub relative_humidity: f64,
    /// Station pressure in Pa.
    pub pressure_pa: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirQuality {
    pub co2eq_ppm: u16,
    pub tvoc_ppb: u16,
}

/// Temperature, humidity and pressure (BME280).
pub trait ClimateSensor: Send {
    fn measure(&mut self) -> Result<Climate, SensorError>;
}

/// Equivalent CO₂ and TVOC (SGP30).
pub trait AirQualitySensor: Send {
    /// Absolute humidity in g/m³ used to compensate the next measurements.
    fn set_absolute_humidity(&mut self, grams_per_m3: f64) -> Result<(), SensorError>;

    fn measure(&mut self) -> Result<AirQuality, SensorError>;
}

/// Ambient light (TSL2591).
pub trait LightSensor: Send {
    fn lux(&mut self) -> Result<f64, SensorError>;
}

/// The sensors found on the bus. Any of them may be missing.
#[derive(Default)]
pub struct SensorBoard {
    climate: Option<Box<dyn ClimateSensor>>,
    air_quality: Option<Box<dyn AirQualitySensor>>,
    light: Option<Box<dyn LightSensor>>,
}

impl SensorBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_climate(mut self, sensor: impl ClimateSensor + 'static) -> Self {
        self.climate = Some(Box::new(sensor));
        self
    }

    pub fn with_air_quality(mut self, sensor: impl AirQualitySensor + 'static) -> Self {
        self.air_quality = Some(Box::new(sensor));
        self
    }

    pub fn with_light(mut self, sensor: impl LightSensor + 'static) -> Self {
        self.light = Some(Box::new(sensor));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.climate.is_none() && self.air_quality.is_none() && self.light.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    /// Feed prefix for climate readings, e.g. `mbr.temperature`.
    pub room: String,
    /// Station altitude in meters, used for the sea level pressure.
    pub altitude_m: f64,
    pub sample_period: Duration,
    pub samples_per_report: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            room: DEFAULT_ROOM.to_string(),
            altitude_m: DEFAULT_ALTITUDE_M,
            sample_period: DEFAULT_SAMPLE_PERIOD,
            samples_per_report: DEFAULT_SAMPLES_PER_REPORT,
        }
    }
}

impl SensorConfig {
    /// Time spent sampling for one report.
    pub fn report_period(&self) -> Duration {
        let samples = u32::try_from(self.samples_per_report).unwrap_or(u32::MAX);
        self.sample_period.saturating_mul(samples)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Average {
    sum: f64,
    count: u32,
}

impl Average {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}

#[derive(Debug, Default)]
struct Samples {
    celsius: Average,
    relative_humidity: Average,
    pressure_pa: Average,
    co2eq_ppm: Average,
    tvoc_ppb: Average,
    lux: Average,
}

struct BoardState {
    board: SensorBoard,
    abs_humidity: f64,
}

pub struct SensorSource {
    config: SensorConfig,
    state: Mutex<BoardState>,
}

impl SensorSource {
    pub fn new(board: SensorBoard, config: SensorConfig) -> Result<Self, SourceError> {
        if board.is_empty() {
            return Err(SourceError::Sensor("no sensors available".to_string()));
        }
        if config.samples_per_report == 0 {
            return Err(SourceError::Sensor(
                "samples per report must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            config,
            state: Mutex::new(BoardState {
                board,
                abs_humidity: DEFAULT_ABS_HUMIDITY,
            }),
        })
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Absolute humidity handed to the air quality sensor on its next measurement.
    pub fn absolute_humidity(&self) -> Result<f64, SourceError> {
        Ok(self.lock()?.abs_humidity)
    }

    fn lock(&self) -> Result<MutexGuard<'_, BoardState>, SourceError> {
        self.state
            .lock()
            .map_err(|_| SourceError::Sensor("sensor board lock poisoned".to_string()))
    }

    /// Reads every sensor once. A failed read only loses that sample.
    fn sample(&self, samples: &mut Samples) -> Result<(), SourceError> {
        let mut state = self.lock()?;
        let abs_humidity = state.abs_humidity;
        let board = &mut state.board;

        if let Some(climate) = board.climate.as_mut() {
            match climate.measure() {
                Ok(m) => {
                    debug!(
                        "BME: temp = {} humid = {} press = {}",
                        m.celsius, m.relative_humidity, m.pressure_pa
                    );
                    samples.celsius.add(m.celsius);
                    samples.relative_humidity.add(m.relative_humidity);
                    samples.pressure_pa.add(m.pressure_pa);
                }
                Err(e) => debug!("Climate sample failed: {}", e),
            }
        }

        if let Some(air_quality) = board.air_quality.as_mut() {
            if let Err(e) = air_quality.set_absolute_humidity(abs_humidity) {
                debug!("Unable to set humidity compensation: {}", e);
            }
            match air_quality.measure() {
                Ok(m) => {
                    if m.co2eq_ppm != CO2_BASELINE_PPM {
                        samples.co2eq_ppm.add(f64::from(m.co2eq_ppm));
                    }
                    if m.tvoc_ppb != 0 {
                        samples.tvoc_ppb.add(f64::from(m.tvoc_ppb));
                    }
                }
                Err(e) => debug!("Air quality sample failed: {}", e),
            }
        }

        if let Some(light) = board.light.as_mut() {
            match light.lux() {
                Ok(lux) if lux.is_finite() => samples.lux.add(lux),
                Ok(lux) => debug!("Ignoring light sample {}", lux),
                Err(e) => debug!("Light sample failed: {}", e),
            }
        }
        Ok(())
    }

    fn report(&self, samples: &Samples) -> Result<Vec<Reading>, SourceError> {
        let room = &self.config.room;
        let mut readings = Vec::new();

        if let (Some(celsius), Some(relative_humidity), Some(pressure_pa)) = (
            samples.celsius.mean(),
            samples.relative_humidity.mean(),
            samples.pressure_pa.mean(),
        ) {
            let raw_hpa = pressure_pa / 100.0;
            let abs_humidity =
                conversion::relative_humidity_to_absolute(relative_humidity, celsius);
            self.lock()?.abs_humidity = abs_humidity;

            let sealevel =
                conversion::raw_pressure_to_sealevel(raw_hpa, celsius, self.config.altitude_m);
            readings.extend([
                Reading::new(format!("{}-bme280.temperature", room), celsius),
                Reading::new(format!("{}-bme280.humidity", room), relative_humidity),
                Reading::new(format!("{}-bme280.pressure", room), raw_hpa),
                Reading::new(
                    format!("{}.temperature", room),
                    conversion::celsius_to_fahrenheit(celsius),
                ),
                Reading::new(format!("{}.humidity", room), relative_humidity),
                Reading::new(format!("{}.abs-humidity", room), abs_humidity),
                Reading::new(format!("{}.pressure", room), conversion::hpa_to_inhg(sealevel)),
            ]);
        }

        if let Some(co2) = samples.co2eq_ppm.mean() {
            readings.push(Reading::new(format!("{}.co2", INDOOR_PREFIX), co2));
        }
        if let Some(tvoc) = samples.tvoc_ppb.mean() {
            readings.push(Reading::new(format!("{}.tvoc", INDOOR_PREFIX), tvoc));
        }
        if let Some(lux) = samples.lux.mean() {
            readings.push(Reading::new(format!("{}.lux", INDOOR_PREFIX), lux));
        }
        Ok(readings)
    }
}

#[async_trait]
impl DataSource for SensorSource {
    fn name(&self) -> &str {
        "sensor"
    }

    /// Samples for one report period. Fails when no sensor produced a usable sample.
    async fn poll(&self) -> Result<Vec<Reading>, SourceError> {
        let mut samples = Samples::default();
        for i in 0..self.config.samples_per_report {
            if i > 0 {
                tokio::time::sleep(self.config.sample_period).await;
            }
            self.sample(&mut samples)?;
        }

        let readings = self.report(&samples)?;
        if readings.is_empty() {
            return Err(SourceError::Sensor("no valid samples".to_string()));
        }
        info!("Sensor report with {} readings", readings.len());
        Ok(readings)
    }
}
