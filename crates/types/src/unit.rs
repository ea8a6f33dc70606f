//! Unit variant selector.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Divisor table flavour of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitVariant {
    /// Binary prefixes (KiB, MiB, ...)
    #[default]
    Default,
    /// Decimal prefixes (KB, MB, ...)
    Si,
    /// Values expressed in bits
    Bit,
}

impl UnitVariant {
    pub const ALL: [UnitVariant; 3] = [UnitVariant::Default, UnitVariant::Si, UnitVariant::Bit];

    pub const fn index(&self) -> usize {
        match self {
            UnitVariant::Default => 0,
            UnitVariant::Si => 1,
            UnitVariant::Bit => 2,
        }
    }
}

impl FromStr for UnitVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(UnitVariant::Default),
            "si" => Ok(UnitVariant::Si),
            "bit" => Ok(UnitVariant::Bit),
            _ => Err(ConfigError::UnknownUnitVariant(s.to_string())),
        }
    }
}
