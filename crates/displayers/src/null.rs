//! Output module drawing nothing

use anyhow::Result;
use bwmon_core::{Engine, Flow, Module};

pub struct NullDisplayer;

impl Module for NullDisplayer {
    fn name(&self) -> &str {
        "null"
    }

    fn description(&self) -> &str {
        "Discards all output"
    }

    fn poll(&mut self, _engine: &mut Engine) -> Result<Flow> {
        Ok(Flow::Continue)
    }
}
