//! Error-detection codecs.
//!
//! Two interchangeable codes compute a 32-bit frame check sequence over
//! a bit-string payload: CRC-32 by modulo-2 polynomial division and a
//! one's-complement checksum with end-around carry. Both are pure; the
//! same payload always yields the same FCS.

use std::fmt;
use std::str::FromStr;

use crate::bits::BitBuf;
use crate::error::{Error, Result};

pub mod checksum;
pub mod crc;

/// Width of the frame check sequence in bits.
pub const FCS_BITS: usize = 32;

/// Selects the error-detection technique for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FcsScheme {
    /// CRC-32 polynomial division.
    Crc32,

    /// 32-bit one's-complement checksum.
    Checksum,
}

impl FcsScheme {
    /// Computes the FCS for `data`.
    pub fn generate(self, data: &BitBuf) -> u32 {
        match self {
            Self::Crc32 => crc::generate(data),
            Self::Checksum => checksum::generate(data),
        }
    }

    /// Returns true if `fcs` is consistent with `data`.
    pub fn validate(self, data: &BitBuf, fcs: u32) -> bool {
        match self {
            Self::Crc32 => crc::validate(data, fcs),
            Self::Checksum => checksum::validate(data, fcs),
        }
    }

    /// The canonical technique name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crc32 => "CRC",
            Self::Checksum => "Checksum",
        }
    }
}

impl fmt::Display for FcsScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FcsScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("CRC") || s == "1" {
            Ok(Self::Crc32)
        } else if s.eq_ignore_ascii_case("Checksum") || s == "2" {
            Ok(Self::Checksum)
        } else {
            Err(Error::UnknownScheme(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!("CRC".parse::<FcsScheme>().unwrap(), FcsScheme::Crc32);
        assert_eq!("1".parse::<FcsScheme>().unwrap(), FcsScheme::Crc32);
        assert_eq!("checksum".parse::<FcsScheme>().unwrap(), FcsScheme::Checksum);
        assert_eq!("2".parse::<FcsScheme>().unwrap(), FcsScheme::Checksum);
        assert!("parity".parse::<FcsScheme>().is_err());
    }

    #[test]
    fn both_schemes_accept_their_own_fcs() {
        let data = BitBuf::parse("11010110101101011010101101101010").unwrap();
        for scheme in [FcsScheme::Crc32, FcsScheme::Checksum] {
            let fcs = scheme.generate(&data);
            assert!(scheme.validate(&data, fcs), "{scheme} rejected its own FCS");
        }
    }
}
