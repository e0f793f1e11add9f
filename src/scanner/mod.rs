//! Radio interface for BLE advertisement scanning.
//!
//! The core consumes raw advertisements through a narrow interface: a
//! [`Radio`] handle for issuing bounded scan requests, and a stream of
//! [`RadioEvent`]s delivered over a bounded channel by whichever backend is
//! compiled in.

#[cfg(feature = "hci")]
pub mod hci;

use crate::mac_address::MacAddress;
use std::fmt;
use thiserror::Error;

/// Channel buffer size for radio events.
pub const EVENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// A raw BLE advertisement as delivered by the radio backend.
///
/// `payload` is the full advertising data buffer; its length is authoritative
/// and nothing past it may be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAdvertisement {
    /// 6-byte device address of the broadcaster
    pub address: MacAddress,
    /// Advertising data bytes (vendor-defined structures, up to 62 bytes)
    pub payload: Vec<u8>,
    /// Received signal strength in dBm
    pub rssi: i16,
}

/// Completion status reported with scan lifecycle events.
///
/// Informational only; a failed status is logged, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Success,
    Failed(u8),
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStatus::Success => write!(f, "success"),
            ScanStatus::Failed(code) => write!(f, "failed (status 0x{code:02x})"),
        }
    }
}

/// Events emitted by a radio backend while a scan is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// A scan-start request completed
    ScanStarted(ScanStatus),
    /// An advertisement was observed
    Advertisement(RawAdvertisement),
    /// The scan ended, either because its duration elapsed or it was stopped
    ScanStopped(ScanStatus),
}

/// Errors returned by radio scan requests.
#[derive(Error, Debug)]
pub enum RadioError {
    #[error("radio I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("radio unavailable: {0}")]
    Unavailable(String),
}

/// Handle for issuing scan requests to a radio backend.
///
/// Backends deliver observed advertisements and lifecycle events separately,
/// through the event channel handed out when the backend is opened.
pub trait Radio: Send {
    /// Request a scan bounded to `duration_secs` seconds.
    fn start_scan(&mut self, duration_secs: u32) -> Result<(), RadioError>;

    /// Request that any active scan stop.
    ///
    /// Stopping an idle radio is a no-op for some backends and an error for
    /// others; callers treat the result as best-effort.
    fn stop_scan(&mut self) -> Result<(), RadioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_status_display() {
        assert_eq!(format!("{}", ScanStatus::Success), "success");
        assert_eq!(format!("{}", ScanStatus::Failed(0x42)), "failed (status 0x42)");
    }

    #[test]
    fn test_radio_error_display() {
        let err = RadioError::Unavailable("no adapter".to_string());
        assert_eq!(format!("{}", err), "radio unavailable: no adapter");
    }
}
