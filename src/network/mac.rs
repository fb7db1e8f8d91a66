use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MacError {
    #[error("Malformed MAC address: {0}")]
    MalformedAddress(String),
}

/// Hardware address of an interface or end device (6 bytes).
///
/// The all-zero address is used by agents to say "no address". It is a valid value of this type
/// but never a device identity, so callers check `is_zero` before treating it as one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress {
    octets: [u8; 6],
}

impl MacAddress {
    pub const ZERO: MacAddress = MacAddress { octets: [0; 6] };

    pub const fn new(octets: [u8; 6]) -> Self {
        Self { octets }
    }

    pub fn octets(&self) -> [u8; 6] {
        self.octets
    }

    pub fn is_zero(&self) -> bool {
        self.octets == [0; 6]
    }

    /// Build an address from 6 integer values, each of which must fit in a byte.
    pub fn from_values<T>(values: &[T]) -> Result<Self, MacError>
    where
        T: TryInto<u8> + Copy + Display,
    {
        if values.len() != 6 {
            return Err(MacError::MalformedAddress(format!(
                "expected 6 values, got {}",
                values.len()
            )));
        }
        let mut octets = [0u8; 6];
        for (octet, value) in octets.iter_mut().zip(values) {
            *octet = (*value)
                .try_into()
                .map_err(|_| MacError::MalformedAddress(format!("{} is not a byte", value)))?;
        }
        Ok(Self { octets })
    }

    /// Build an address from 6 hex groups of one or two digits ("0", "1b", "AA").
    pub fn from_hex_parts<S: AsRef<str>>(parts: &[S]) -> Result<Self, MacError> {
        if parts.len() != 6 {
            return Err(MacError::MalformedAddress(format!(
                "expected 6 hex groups, got {}",
                parts.len()
            )));
        }
        let mut octets = [0u8; 6];
        for (octet, part) in octets.iter_mut().zip(parts) {
            let part = part.as_ref();
            // Some agents drop the leading zero ("0:1b:21:...")
            let padded = match part.len() {
                1 => format!("0{}", part),
                2 => part.to_string(),
                _ => return Err(MacError::MalformedAddress(part.to_string())),
            };
            let byte = hex::decode(&padded).map_err(|_| MacError::MalformedAddress(part.to_string()))?;
            *octet = byte[0];
        }
        Ok(Self { octets })
    }

    /// Recover an address from the last 6 components of a table index (`...170.170.170.170.170.2`).
    pub fn from_oid_suffix(components: &[u64]) -> Option<Self> {
        if components.len() < 6 {
            return None;
        }
        Self::from_values(&components[components.len() - 6..]).ok()
    }

    /// `AA-BB-CC-DD-EE-FF`
    pub fn format_hex(&self) -> String {
        self.octets
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join("-")
    }

    /// `170.187.204.221.238.255`, the form used as an OID index suffix.
    pub fn format_decimal(&self) -> String {
        self.octets
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl FromStr for MacAddress {
    type Err = MacError;

    /// Accepts `-`, `:` or whitespace delimited hex. Blank input yields [`MacAddress::ZERO`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation());
        if trimmed.is_empty() {
            return Ok(Self::ZERO);
        }

        let parts: Vec<&str> = if trimmed.contains('-') {
            trimmed.split('-').collect()
        } else if trimmed.contains(':') {
            trimmed.split(':').collect()
        } else {
            trimmed.split_whitespace().collect()
        };

        Self::from_hex_parts(&parts).map_err(|_| MacError::MalformedAddress(s.to_string()))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(octets: [u8; 6]) -> Self {
        Self { octets }
    }
}

impl TryFrom<&[u8]> for MacAddress {
    type Error = MacError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let octets: [u8; 6] = bytes
            .try_into()
            .map_err(|_| MacError::MalformedAddress(format!("{:?}", bytes)))?;
        Ok(Self { octets })
    }
}

impl Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format_hex())
    }
}

/// Parses `text` as an address only if it really is one. Blank text is not an address here.
pub fn try_parse_address(text: &str) -> Option<MacAddress> {
    if text.trim().is_empty() {
        return None;
    }
    text.parse().ok()
}

// Serialized as the hex string so addresses can be used as JSON keys

impl Serialize for MacAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.format_hex())
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
