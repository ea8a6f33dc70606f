//! Attribute definition types.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

/// Semantic kind of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttrKind {
    /// Monotonic counter, rates are derived by differencing
    #[default]
    Counter,
    /// The source already reports a per-second rate
    Rate,
    /// The source reports a percentage
    Percent,
}

impl AttrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrKind::Counter => "counter",
            AttrKind::Rate => "rate",
            AttrKind::Percent => "percent",
        }
    }
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttrKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "counter" => Ok(AttrKind::Counter),
            "rate" => Ok(AttrKind::Rate),
            "percent" => Ok(AttrKind::Percent),
            _ => Err(ConfigError::UnknownAttrKind(s.to_string())),
        }
    }
}

/// Behavior flags of an attribute definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttrFlags(u8);

impl AttrFlags {
    /// Always collect history for this attribute
    pub const FORCE_HISTORY: Self = Self(0x01);
    /// Treat a counter going backwards as a restart from zero
    pub const IGNORE_OVERFLOWS: Self = Self(0x02);
    /// Counter wraps at 2^64 instead of 2^32
    pub const TRUE_64BIT: Self = Self(0x04);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for AttrFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!("Counter".parse::<AttrKind>().unwrap(), AttrKind::Counter);
        assert_eq!("RATE".parse::<AttrKind>().unwrap(), AttrKind::Rate);
        assert_eq!("percent".parse::<AttrKind>().unwrap(), AttrKind::Percent);
        assert_eq!(
            "gauge".parse::<AttrKind>(),
            Err(ConfigError::UnknownAttrKind("gauge".to_string()))
        );
    }

    #[test]
    fn test_flags() {
        let mut flags = AttrFlags::FORCE_HISTORY | AttrFlags::TRUE_64BIT;
        assert!(flags.contains(AttrFlags::FORCE_HISTORY));
        assert!(!flags.contains(AttrFlags::IGNORE_OVERFLOWS));

        flags.remove(AttrFlags::FORCE_HISTORY);
        assert_eq!(flags, AttrFlags::TRUE_64BIT);

        flags.insert(AttrFlags::IGNORE_OVERFLOWS);
        assert_eq!(flags.bits(), 0x06);
    }
}
