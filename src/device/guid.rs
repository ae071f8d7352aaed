//! Device class identifiers
//!
//! The driver reports a 16-byte class id per device. It is rendered in the
//! usual GUID text layout (4-2-2-2-6 byte groups, uppercase hex, braces) using
//! the raw byte order as delivered, without the mixed-endian swap of the first
//! three groups. Comparisons only ever happen between ids rendered the same way.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Byte lengths of the hyphen-separated groups
const GROUPS: [usize; 5] = [4, 2, 2, 2, 6];

/// Class id reported by the Saitek X52 Pro
pub const X52_PRO: DeviceClassId = DeviceClassId::from_bytes([
    0x06, 0xD5, 0xDA, 0x29, 0x3B, 0xF9, 0x20, 0x4F, 0x85, 0xFA, 0x1E, 0x02, 0xC0, 0x4F, 0xAC, 0x17,
]);

/// 16-byte device class identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceClassId([u8; 16]);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuidParseError {
    #[error("expected 5 hyphen-separated groups, found {0}")]
    GroupCount(usize),
    #[error("group {index} should have {expected} hex digits, found {found}")]
    GroupLength {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("invalid hex digit: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl DeviceClassId {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for DeviceClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        let mut start = 0;
        for (i, len) in GROUPS.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            f.write_str(&hex::encode_upper(&self.0[start..start + len]))?;
            start += len;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for DeviceClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceClassId({})", self)
    }
}

impl FromStr for DeviceClassId {
    type Err = GuidParseError;

    /// Accepts the rendered form with or without braces, in any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(trimmed);

        let groups: Vec<&str> = inner.split('-').collect();
        if groups.len() != GROUPS.len() {
            return Err(GuidParseError::GroupCount(groups.len()));
        }

        let mut digits = String::with_capacity(32);
        for (index, (group, len)) in groups.iter().zip(GROUPS).enumerate() {
            if group.len() != len * 2 {
                return Err(GuidParseError::GroupLength {
                    index,
                    expected: len * 2,
                    found: group.len(),
                });
            }
            digits.push_str(group);
        }

        let mut bytes = [0u8; 16];
        hex::decode_to_slice(&digits, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for DeviceClassId {
    type Error = GuidParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceClassId> for String {
    fn from(id: DeviceClassId) -> Self {
        id.to_string()
    }
}
