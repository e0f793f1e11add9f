//! Compact MAC address types for Bluetooth devices.
//!
//! This module provides a 6-byte device address plus the 3-byte suffix type
//! that identifies an individual sensor within the ATC family, decoupled from
//! any specific Bluetooth library.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;

/// A Bluetooth MAC address stored as a compact 6-byte array.
///
/// This type provides efficient storage and hashing, while being independent
/// of any specific Bluetooth library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Whether the address begins with the given vendor prefix bytes.
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }

    /// The trailing 3 bytes, distinguishing an individual device within a
    /// vendor family.
    pub fn suffix(&self) -> AddressSuffix {
        AddressSuffix([self.0[3], self.0[4], self.0[5]])
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// The distinguishing trailing 3 bytes of a sensor address.
///
/// ATC advertisements embed the full source address in the payload; only the
/// suffix varies within the family, so decoded readings carry this type
/// rather than a full [`MacAddress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AddressSuffix(pub [u8; 3]);

impl fmt::Display for AddressSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}:{:02X}:{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl From<[u8; 3]> for AddressSuffix {
    fn from(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }
}

/// Errors returned when parsing a MAC address string.
#[derive(Error, Debug, PartialEq)]
pub enum ParseMacError {
    #[error("invalid MAC address: expected 6 parts, got {0}")]
    InvalidLength(usize),
    #[error("invalid MAC address: part {0} has wrong length")]
    InvalidPartLength(usize),
    #[error("invalid MAC address: '{0}' is not valid hex")]
    InvalidHex(String),
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(ParseMacError::InvalidLength(parts.len()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(ParseMacError::InvalidPartLength(i));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseMacError::InvalidHex(part.to_string()))?;
        }

        Ok(MacAddress(bytes))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}
