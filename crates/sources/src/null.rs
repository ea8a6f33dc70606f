//! Input module reporting nothing

use anyhow::Result;
use bwmon_core::{Engine, Flow, Module};

pub struct NullSource;

impl Module for NullSource {
    fn name(&self) -> &str {
        "null"
    }

    fn description(&self) -> &str {
        "Reports no statistics"
    }

    fn poll(&mut self, _engine: &mut Engine) -> Result<Flow> {
        Ok(Flow::Continue)
    }
}
