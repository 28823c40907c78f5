// Licensed under the Apache-2.0 license

use crate::error::PldmError;
use core::convert::TryFrom;

pub type Ver32 = u32;
pub type ProtocolVersionStr = &'static str;

/// PLDM base (Type 0) protocol version implemented by the responder.
pub const PLDM_BASE_PROTOCOL_VERSION: ProtocolVersionStr = "1.1.0";

/// PLDM platform monitoring and control (Type 2) protocol version.
pub const PLDM_PLATFORM_PROTOCOL_VERSION: ProtocolVersionStr = "1.2.2";

/// Size of one ver32 entry on the wire.
pub const VER32_LEN: usize = core::mem::size_of::<Ver32>();

/// A PLDM version in DSP0240 ver32 form.
///
/// Major, minor and update are packed BCD, two digits per byte. A high nibble of
/// 0xF marks a single-digit field. An update of 0xFF means the field is absent.
/// Alpha is an optional ISO 8859-1 character, 0 when unused.
///
/// - 3.7.10a → 0xF3F71061
/// - 1.2.2 → 0xF1F2F200
/// - 3.1 → 0xF3F1FF00
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PldmVersion {
    pub major: u8,
    pub minor: u8,
    pub update: u8,
    pub alpha: u8,
}

const FIELD_ABSENT: u8 = 0xFF;

fn to_bcd(value: u8) -> u8 {
    if value < 10 {
        0xF0 | value
    } else {
        ((value / 10) << 4) | (value % 10)
    }
}

fn from_bcd(bcd: u8) -> u8 {
    if bcd >> 4 == 0xF {
        bcd & 0x0F
    } else {
        (bcd >> 4) * 10 + (bcd & 0x0F)
    }
}

fn split_alpha(field: &str) -> (&str, u8) {
    match field.as_bytes().last() {
        Some(&c) if c.is_ascii_alphabetic() => (&field[..field.len() - 1], c),
        _ => (field, 0),
    }
}

fn parse_field(field: &str) -> Result<u8, PldmError> {
    field
        .parse::<u8>()
        .map_err(|_| PldmError::InvalidProtocolVersion)
}

impl PldmVersion {
    pub const fn new(major: u8, minor: u8, update: u8, alpha: u8) -> Self {
        PldmVersion {
            major,
            minor,
            update,
            alpha,
        }
    }

    pub fn to_ver32(&self) -> Ver32 {
        let update = if self.update == FIELD_ABSENT {
            FIELD_ABSENT
        } else {
            to_bcd(self.update)
        };
        u32::from_be_bytes([to_bcd(self.major), to_bcd(self.minor), update, self.alpha])
    }

    pub fn from_ver32(ver: Ver32) -> Self {
        let [major, minor, update, alpha] = ver.to_be_bytes();
        PldmVersion {
            major: from_bcd(major),
            minor: from_bcd(minor),
            update: if update == FIELD_ABSENT {
                FIELD_ABSENT
            } else {
                from_bcd(update)
            },
            alpha,
        }
    }
}

impl TryFrom<&str> for PldmVersion {
    type Error = PldmError;

    /// Parses `major.minor[.update][alpha]`.
    fn try_from(version: &str) -> Result<Self, PldmError> {
        let mut parts = version.split('.');
        let major = parts.next().ok_or(PldmError::InvalidProtocolVersion)?;
        let minor = parts.next().ok_or(PldmError::InvalidProtocolVersion)?;
        let update = parts.next();
        if parts.next().is_some() {
            return Err(PldmError::InvalidProtocolVersion);
        }

        let (major, minor, update, alpha) = match update {
            Some(update) => {
                let (update, alpha) = split_alpha(update);
                (
                    parse_field(major)?,
                    parse_field(minor)?,
                    parse_field(update)?,
                    alpha,
                )
            }
            None => {
                let (minor, alpha) = split_alpha(minor);
                (parse_field(major)?, parse_field(minor)?, FIELD_ABSENT, alpha)
            }
        };

        if major == FIELD_ABSENT || minor == FIELD_ABSENT {
            return Err(PldmError::InvalidProtocolVersion);
        }
        Ok(PldmVersion::new(major, minor, update, alpha))
    }
}

/// Converts a version string straight to its ver32 value.
pub fn ver32_from_str(version: &str) -> Result<Ver32, PldmError> {
    PldmVersion::try_from(version).map(|v| v.to_ver32())
}
