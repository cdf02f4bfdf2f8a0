// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! BME280, SGP30 and TSL2591 drivers on a Linux I2C device.
//!
//! Each sensor gets its own handle on the device; the kernel serializes the
//! transfers. A sensor that fails to initialize is logged and left off the board.

use bme280::BME280;
use linux_embedded_hal::{Delay, I2cdev};
use sgp30::{Humidity, Sgp30};
use tracing::{error, info};

use super::{
    AirQuality, AirQualitySensor, Climate, ClimateSensor, LightSensor, SensorBoard, SensorError,
};

const SGP30_ADDRESS: u8 = 0x58;

pub struct Bme280Climate(BME280<I2cdev, Delay>);

impl ClimateSensor for Bme280Climate {
    fn measure(&mut self) -> Result<Climate, SensorError> {
        let m = self
            .0
            .measure()
            .map_err(|e| SensorError(format!("BME280 measure failed: {:?}", e)))?;
        Ok(Climate {
            celsius: f64::from(m.temperature),
            relative_humidity: f64::from(m.humidity),
            pressure_pa: f64::from(m.pressure),
        })
    }
}

pub struct Sgp30AirQuality(Sgp30<I2cdev, Delay>);

impl AirQualitySensor for Sgp30AirQuality {
    fn set_absolute_humidity(&mut self, grams_per_m3: f64) -> Result<(), SensorError> {
        #[allow(clippy::cast_possible_truncation)]
        let humidity = Humidity::from_f32(grams_per_m3 as f32)
            .map_err(|e| SensorError(format!("SGP30 humidity out of range: {:?}", e)))?;
        self.0
            .set_humidity(Some(&humidity))
            .map_err(|e| SensorError(format!("SGP30 set humidity failed: {:?}", e)))
    }

    fn measure(&mut self) -> Result<AirQuality, SensorError> {
        let m = self
            .0
            .measure()
            .map_err(|e| SensorError(format!("SGP30 measure failed: {:?}", e)))?;
        Ok(AirQuality {
            co2eq_ppm: m.co2eq_ppm,
            tvoc_ppb: m.tvoc_ppb,
        })
    }
}

pub struct Tsl2591Light {
    driver: tsl2591::Driver<I2cdev>,
    delay: Delay,
}

impl LightSensor for Tsl2591Light {
    fn lux(&mut self) -> Result<f64, SensorError> {
        let (ch_0, ch_1) = self
            .driver
            .get_channel_data(&mut self.delay)
            .map_err(|e| SensorError(format!("TSL2591 read failed: {:?}", e)))?;
        let lux = self
            .driver
            .calculate_lux(ch_0, ch_1)
            .map_err(|e| SensorError(format!("TSL2591 lux failed: {:?}", e)))?;
        Ok(f64::from(lux))
    }
}

fn open(device: &str) -> Option<I2cdev> {
    match I2cdev::new(device) {
        Ok(i2c) => Some(i2c),
        Err(e) => {
            error!("Unable to open I2C device {}: {:?}", device, e);
            None
        }
    }
}

/// Opens every supported sensor on `device`.
pub fn open_board(device: &str) -> SensorBoard {
    let mut board = SensorBoard::new();

    if let Some(i2c) = open(device) {
        let mut bme = BME280::new_secondary(i2c, Delay);
        match bme.init() {
            Ok(()) => {
                info!("BME280 initialized");
                board = board.with_climate(Bme280Climate(bme));
            }
            Err(e) => error!("BME280 not found: {:?}", e),
        }
    }

    if let Some(i2c) = open(device) {
        let mut sgp = Sgp30::new(i2c, SGP30_ADDRESS, Delay);
        match sgp.init() {
            Ok(()) => {
                info!("SGP30 initialized");
                board = board.with_air_quality(Sgp30AirQuality(sgp));
            }
            Err(e) => error!("SGP30 not found: {:?}", e),
        }
    }

    if let Some(i2c) = open(device) {
        match tsl2591::Driver::new_define_integration(
            i2c,
            tsl2591::IntegrationTimes::_200MS,
            tsl2591::Gain::MED,
        ) {
            Ok(mut driver) => {
                let enabled = driver
                    .enable()
                    .and_then(|()| driver.set_gain(Some(tsl2591::Gain::MED)));
                match enabled {
                    Ok(()) => {
                        info!("TSL2591 initialized");
                        board = board.with_light(Tsl2591Light {
                            driver,
                            delay: Delay,
                        });
                    }
                    Err(e) => error!("TSL2591 not enabled: {:?}", e),
                }
            }
            Err(e) => error!("TSL2591 not found: {:?}", e),
        }
    }

    board
}
