//! Decoded sensor reading data structure.

use crate::mac_address::AddressSuffix;
use std::fmt;

/// A single decoded reading from an ATC thermometer advertisement.
///
/// Values are kept in the units the sensor transmits:
/// - Temperature in tenths of a degree Celsius (signed)
/// - Humidity in percent (0-100 nominal)
/// - Battery level in percent (0-100 nominal)
/// - Battery voltage in millivolts
///
/// A reading is constructed per matching advertisement and handed to the
/// consumer immediately; the core keeps no history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Received signal strength of the advertisement, in dBm
    pub rssi: i16,
    /// Trailing 3 bytes of the sensor address, as embedded in the payload
    pub address_suffix: AddressSuffix,
    /// Temperature in tenths of a degree Celsius
    pub temperature_tenths_c: i16,
    /// Relative humidity in percent
    pub humidity_percent: u8,
    /// Remaining battery level in percent
    pub battery_percent: u8,
    /// Battery voltage in millivolts
    pub battery_millivolts: u16,
}

impl Reading {
    /// Temperature converted to degrees Celsius.
    pub fn temperature_celsius(&self) -> f64 {
        f64::from(self.temperature_tenths_c) / 10.0
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mac={} rssi={} temp={:.1} hum={}% bat={}% ({} mV)",
            self.address_suffix,
            self.rssi,
            self.temperature_celsius(),
            self.humidity_percent,
            self.battery_percent,
            self.battery_millivolts
        )
    }
}
