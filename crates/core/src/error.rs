//! Engine error type.

use bwmon_types::ConfigError;
use thiserror::Error;

/// Errors raised by engine operations that callers are expected to handle.
///
/// Per-tick data problems (unknown attribute ids in a report, elements
/// rejected by policy) are not errors; they are dropped silently.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("Group header '{0}' already exists")]
    HeaderExists(String),

    #[error("Unknown group header '{0}'")]
    UnknownHeader(String),

    #[error("Unknown unit '{0}'")]
    UnknownUnit(String),

    #[error("Unknown {subsystem} module '{name}'")]
    UnknownModule { subsystem: String, name: String },

    #[error("No working {0} module found")]
    NoModule(String),
}
