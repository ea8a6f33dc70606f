//! bwmon-core: Statistics and element engine for the bwmon bandwidth monitor.
//!
//! This crate turns raw counter readings into smoothed rates and
//! multi-resolution histories, and keeps the observed elements in a forest
//! of groups with policy based admission, lifecycle expiry and navigation
//! cursors. Input and output modules plug in through the [`Module`] trait.

pub mod attr;
pub mod attr_def;
pub mod element;
pub mod engine;
pub mod error;
pub mod graph;
pub mod group;
pub mod history;
pub mod module;
pub mod policy;
pub mod rate;
pub mod unit;

pub use attr::{AttrStatus, Attribute};
pub use attr_def::{AttrDef, AttrDefRegistry, AttrId, AttrMapEntry};
pub use element::{Element, ElementFlags, ElementId, Info};
pub use engine::Engine;
pub use error::EngineError;
pub use graph::{ElementGraph, Lookup};
pub use group::{Group, GroupHeader, GroupId, HeaderRegistry};
pub use history::{Direction, History, HistoryDef, HistoryDefId, HistoryDefRegistry};
pub use module::{parse_selection, BoxedModule, Flow, Module, ModuleSelection, Subsystem};
pub use policy::Policy;
pub use rate::RateSample;
pub use unit::{Scaled, UnitId, UnitRegistry};

// Re-export the shared types for convenience
pub use bwmon_types::{
    AppConfig, AttrFlags, AttrKind, ElementConfig, EngineSettings, SampleWidth, DEFAULT_GROUP,
};
