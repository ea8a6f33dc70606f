//! Configuration error type.

use thiserror::Error;

/// Errors detected while validating or applying configuration.
///
/// All of these are fatal at startup: the application logs them and exits.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// An attribute references a unit that was never defined.
    #[error("Unknown unit '{unit}' in attribute '{attr}'")]
    UnknownUnit { unit: String, attr: String },

    /// A history definition uses an unsupported sample width.
    #[error("Invalid type '{0}', must be \"(8|16|32|64)bit\"")]
    UnknownSampleWidth(String),

    /// An attribute type other than counter, rate or percent.
    #[error("Unknown attribute type '{0}'")]
    UnknownAttrKind(String),

    /// A unit variant other than default, si or bit.
    #[error("Unknown unit variant '{0}'")]
    UnknownUnitVariant(String),

    /// Divisor and label lists of a unit variant differ in length.
    #[error("Number of elements for div and txt not equal in unit '{0}'")]
    DivisorMismatch(String),

    /// A history definition with zero capacity.
    #[error("History '{0}' must hold at least one sample")]
    EmptyHistory(String),

    /// A numeric setting outside its valid range.
    #[error("Invalid value {value} for setting '{name}'")]
    InvalidSetting { name: &'static str, value: f64 },
}
