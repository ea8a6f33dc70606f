//! bwmon - bandwidth monitor
//!
//! Library part of the `bwmon` binary: configuration loading and the main
//! loop wiring the input and output modules to the engine.

pub mod app;
pub mod config;

pub use app::App;
