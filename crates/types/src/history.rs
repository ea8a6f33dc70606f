//! History sample width.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width of one packed history sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SampleWidth {
    #[serde(rename = "8bit")]
    Bits8,
    #[serde(rename = "16bit")]
    Bits16,
    #[serde(rename = "32bit")]
    Bits32,
    #[default]
    #[serde(rename = "64bit")]
    Bits64,
}

impl SampleWidth {
    /// All-ones pattern of this width, reserved as the "unknown" marker
    pub const fn sentinel(&self) -> u64 {
        match self {
            SampleWidth::Bits8 => u8::MAX as u64,
            SampleWidth::Bits16 => u16::MAX as u64,
            SampleWidth::Bits32 => u32::MAX as u64,
            SampleWidth::Bits64 => u64::MAX,
        }
    }

    /// Largest storable known value
    pub const fn max_value(&self) -> u64 {
        self.sentinel() - 1
    }

    pub const fn bytes(&self) -> usize {
        match self {
            SampleWidth::Bits8 => 1,
            SampleWidth::Bits16 => 2,
            SampleWidth::Bits32 => 4,
            SampleWidth::Bits64 => 8,
        }
    }
}

impl fmt::Display for SampleWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bit", self.bytes() * 8)
    }
}

impl FromStr for SampleWidth {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "8bit" => Ok(SampleWidth::Bits8),
            "16bit" => Ok(SampleWidth::Bits16),
            "32bit" => Ok(SampleWidth::Bits32),
            "64bit" => Ok(SampleWidth::Bits64),
            _ => Err(ConfigError::UnknownSampleWidth(s.to_string())),
        }
    }
}
