//! bwmon-types: Shared data types for the bwmon bandwidth monitor.
//!
//! This crate contains pure data types (configuration structs, attribute
//! kinds, history sample widths, unit variants) shared across all bwmon
//! crates. Nothing in here knows about the engine itself, which makes it a
//! safe foundation layer for the config loader and the modules.

pub mod attr;
pub mod config;
pub mod error;
pub mod history;
pub mod unit;

// Re-export commonly used types at the crate root for convenience
pub use attr::{AttrFlags, AttrKind};
pub use config::{
    AppConfig, AttrConfig, ElementConfig, EngineSettings, HistoryConfig, UnitConfig,
    UnitVariantConfig, DEFAULT_GROUP,
};
pub use error::ConfigError;
pub use history::SampleWidth;
pub use unit::UnitVariant;
