//! Shared fixtures for unit tests: a known-good advertisement and a
//! scripted radio backend.

use crate::mac_address::MacAddress;
use crate::scanner::{Radio, RadioError, RawAdvertisement};
use std::sync::{Arc, Mutex};

/// Radio address of the fixture sensor (vendor prefix + suffix 11:22:33).
pub const SENSOR_MAC: MacAddress = MacAddress([0xA4, 0xC1, 0x38, 0x11, 0x22, 0x33]);

/// A 16-byte ATC advertising payload with known field values:
/// suffix 11:22:33, 15.0°C, 42% humidity, 80% battery, 3000 mV.
pub fn atc_payload() -> Vec<u8> {
    vec![
        0x10, // AD structure length
        0x16, // AD type: service data
        0x1A, 0x18, // environmental sensing service UUID, little-endian
        0xA4, 0xC1, 0x38, // embedded source address, vendor prefix
        0x11, 0x22, 0x33, // embedded source address, device suffix
        0x00, 0x96, // temperature: 150 tenths = 15.0°C, big-endian
        0x2A, // humidity: 42%
        0x50, // battery: 80%
        0x0B, 0xB8, // battery voltage: 3000 mV, big-endian
    ]
}

/// A matching advertisement carrying [`atc_payload`].
pub fn atc_advertisement() -> RawAdvertisement {
    RawAdvertisement {
        address: SENSOR_MAC,
        payload: atc_payload(),
        rssi: -63,
    }
}

/// Scan requests recorded by [`MockRadio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioCall {
    Start(u32),
    Stop,
}

/// Scripted radio backend that records calls and can be made to fail.
pub struct MockRadio {
    calls: Arc<Mutex<Vec<RadioCall>>>,
    fail_start: bool,
    fail_stop: bool,
}

impl MockRadio {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_start: false,
            fail_stop: false,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Shared handle to the recorded call sequence.
    pub fn calls(&self) -> Arc<Mutex<Vec<RadioCall>>> {
        Arc::clone(&self.calls)
    }
}

impl Radio for MockRadio {
    fn start_scan(&mut self, duration_secs: u32) -> Result<(), RadioError> {
        self.calls.lock().unwrap().push(RadioCall::Start(duration_secs));
        if self.fail_start {
            return Err(RadioError::Unavailable("scripted start failure".into()));
        }
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), RadioError> {
        self.calls.lock().unwrap().push(RadioCall::Stop);
        if self.fail_stop {
            return Err(RadioError::Unavailable("scripted stop failure".into()));
        }
        Ok(())
    }
}
