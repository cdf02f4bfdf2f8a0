// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Unit conversions applied to readings before they are queued.

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 1.8 + 32.0
}

pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + 273.15
}

/// Station pressure corrected to sea level with the hypsometric formula.
pub fn raw_pressure_to_sealevel(raw_hpa: f64, celsius: f64, altitude_m: f64) -> f64 {
    raw_hpa * (1.0 - 0.0065 * altitude_m / (0.0065 + celsius_to_kelvin(celsius))).powf(-5.257)
}

pub fn hpa_to_inhg(hpa: f64) -> f64 {
    hpa / 33.863_888
}

/// Absolute humidity in g/m³ from relative humidity (%) and air temperature,
/// using the Magnus approximation for saturation vapour pressure.
pub fn relative_humidity_to_absolute(relative_humidity: f64, celsius: f64) -> f64 {
    let saturation_hpa = 6.112 * (17.62 * celsius / (243.12 + celsius)).exp();
    let vapour_hpa = saturation_hpa * relative_humidity / 100.0;
    216.7 * vapour_hpa / celsius_to_kelvin(celsius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_to(value: f64, places: i32) -> f64 {
        let factor = 10f64.powi(places);
        (value * factor).round() / factor
    }

    #[test]
    fn test_celsius_to_fahrenheit() {
        assert_eq!(round_to(celsius_to_fahrenheit(20.0), 6), 68.0);
        assert_eq!(round_to(celsius_to_fahrenheit(-40.0), 6), -40.0);
    }

    #[test]
    fn test_celsius_to_kelvin() {
        assert_eq!(round_to(celsius_to_kelvin(20.0), 2), 293.15);
    }

    #[test]
    fn test_hpa_to_inhg() {
        assert_eq!(round_to(hpa_to_inhg(1013.25), 1), 29.9);
    }

    #[test]
    fn test_raw_pressure_to_sealevel() {
        assert_eq!(raw_pressure_to_sealevel(1000.0, 15.0, 100.0).round(), 1012.0);
        assert_eq!(raw_pressure_to_sealevel(1013.25, 15.0, 100.0).round(), 1025.0);
        assert_eq!(raw_pressure_to_sealevel(999.0, 40.0, 100.0).round(), 1010.0);
        assert_eq!(raw_pressure_to_sealevel(1013.25, 15.0, 0.0), 1013.25);
    }

    #[test]
    fn test_relative_humidity_to_absolute() {
        assert_eq!(round_to(relative_humidity_to_absolute(50.0, 15.0), 1), 6.4);
        assert_eq!(relative_humidity_to_absolute(0.0, 25.0), 0.0);
    }
}
