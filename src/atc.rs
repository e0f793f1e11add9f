//! Advertisement filtering and decoding for the ATC thermometer family.
//!
//! ATC-flashed Xiaomi thermometers (e.g. LYWSD03MMC) broadcast their readings
//! in a fixed-layout advertising structure. The advertisement carries no
//! checksum, so the filter requires the vendor MAC prefix both in the radio
//! address and in the copy of the source address embedded in the payload
//! before a packet is considered relevant.

use crate::mac_address::{AddressSuffix, MacAddress};
use crate::reading::Reading;
use thiserror::Error;

/// Vendor MAC prefix shared by the ATC thermometer family.
pub const SENSOR_ADDRESS_PREFIX: [u8; 3] = [0xA4, 0xC1, 0x38];

/// Offset of the embedded source address within the advertising data.
const PAYLOAD_ADDRESS_OFFSET: usize = 4;

/// Errors returned when decoding an advertising payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload too short to contain the full reading
    #[error("truncated payload: {len} bytes, need at least {}", AtcFrame::MIN_LEN)]
    Truncated { len: usize },
}

/// Filter that decides whether an advertisement comes from an ATC sensor.
///
/// The advertising structure is otherwise indistinguishable from unrelated
/// broadcasts on the same channel, so both the radio address and the payload
/// copy of the address must carry the vendor prefix. False negatives are
/// acceptable; the double check exists to avoid false positives.
#[derive(Debug, Clone, Copy)]
pub struct DeviceFilter {
    prefix: [u8; 3],
}

impl DeviceFilter {
    pub fn new(prefix: [u8; 3]) -> Self {
        Self { prefix }
    }

    /// Whether the advertisement belongs to the target sensor family.
    ///
    /// Payloads shorter than the embedded address range never match; no byte
    /// beyond the payload length is read.
    pub fn matches(&self, address: &MacAddress, payload: &[u8]) -> bool {
        if !address.starts_with(&self.prefix) {
            return false;
        }
        let Some(embedded) = payload.get(PAYLOAD_ADDRESS_OFFSET..PAYLOAD_ADDRESS_OFFSET + 3)
        else {
            return false;
        };
        embedded == self.prefix
    }
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self::new(SENSOR_ADDRESS_PREFIX)
    }
}

/// Typed view over an ATC advertising payload.
///
/// Validates the total length once on construction; the named accessors then
/// read their fixed offsets without further bounds checks. Multi-byte fields
/// are big-endian.
#[derive(Debug, Clone, Copy)]
pub struct AtcFrame<'a> {
    payload: &'a [u8],
}

impl<'a> AtcFrame<'a> {
    /// Smallest payload that contains every field (highest offset read is 15).
    pub const MIN_LEN: usize = 16;

    pub fn new(payload: &'a [u8]) -> Result<Self, DecodeError> {
        if payload.len() < Self::MIN_LEN {
            return Err(DecodeError::Truncated {
                len: payload.len(),
            });
        }
        Ok(Self { payload })
    }

    /// Trailing bytes of the source address embedded at offset 7.
    pub fn address_suffix(&self) -> AddressSuffix {
        AddressSuffix([self.payload[7], self.payload[8], self.payload[9]])
    }

    /// Temperature in tenths of a degree Celsius, offset 10.
    pub fn temperature_tenths_c(&self) -> i16 {
        i16::from_be_bytes([self.payload[10], self.payload[11]])
    }

    /// Relative humidity in percent, offset 12.
    pub fn humidity_percent(&self) -> u8 {
        self.payload[12]
    }

    /// Battery level in percent, offset 13.
    pub fn battery_percent(&self) -> u8 {
        self.payload[13]
    }

    /// Battery voltage in millivolts, offset 14.
    pub fn battery_millivolts(&self) -> u16 {
        u16::from_be_bytes([self.payload[14], self.payload[15]])
    }
}

/// Decode an advertising payload into a [`Reading`].
///
/// Pure field extraction; the format carries no integrity check, so any
/// payload long enough decodes successfully. Plausibility is judged
/// separately by [`AnomalyThresholds`].
pub fn decode_advertisement(payload: &[u8], rssi: i16) -> Result<Reading, DecodeError> {
    let frame = AtcFrame::new(payload)?;
    Ok(Reading {
        rssi,
        address_suffix: frame.address_suffix(),
        temperature_tenths_c: frame.temperature_tenths_c(),
        humidity_percent: frame.humidity_percent(),
        battery_percent: frame.battery_percent(),
        battery_millivolts: frame.battery_millivolts(),
    })
}

/// Sanity bounds for decoded readings.
///
/// The upstream format has no checksum, so out-of-range values are surfaced
/// (logged with the raw payload) rather than silently dropped; the reading is
/// still delivered and disposition is left to the consumer. The defaults
/// match the sensor family's observed limits but carry no protocol meaning,
/// hence they are configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnomalyThresholds {
    /// Highest plausible battery voltage in millivolts
    pub max_battery_millivolts: u16,
    /// Highest plausible temperature in tenths of a degree Celsius
    pub max_temperature_tenths_c: i16,
}

impl AnomalyThresholds {
    /// Whether a reading exceeds the plausibility bounds.
    pub fn is_suspicious(&self, reading: &Reading) -> bool {
        reading.battery_millivolts > self.max_battery_millivolts
            || reading.temperature_tenths_c > self.max_temperature_tenths_c
    }
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            max_battery_millivolts: 3000,
            max_temperature_tenths_c: 300,
        }
    }
}
