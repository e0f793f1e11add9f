//! `atc-listener` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing and process exit
//! codes. The core "business logic" lives in [`crate::app`] where it can be
//! tested deterministically with a scripted radio + injected output streams.

pub mod app;
pub mod atc;
pub mod mac_address;
pub mod reading;
pub mod scanner;
pub mod scheduler;
pub mod session;
#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the crate root
pub use atc::{AnomalyThresholds, DecodeError, DeviceFilter, decode_advertisement};
pub use mac_address::{AddressSuffix, MacAddress};
pub use reading::Reading;
pub use scanner::{Radio, RadioError, RadioEvent, RawAdvertisement, ScanStatus};
pub use scheduler::{parse_duration, schedule};
pub use session::{ReadingHandler, ScanController, ScanError};
