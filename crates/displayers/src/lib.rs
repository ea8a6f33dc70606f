//! bwmon-displayers: Output modules for the bwmon bandwidth monitor.

mod ascii;
mod format;
pub mod graph;
mod json;
mod null;

pub use ascii::AsciiDisplayer;
pub use format::FormatDisplayer;
pub use graph::{Graph, GraphStyle, GraphTable};
pub use json::JsonDisplayer;
pub use null::NullDisplayer;

use bwmon_core::Subsystem;

/// Output modules tried, in order, when none was selected
pub const PREFERRED: &[&str] = &["ascii"];

/// Register all built-in output modules
pub fn register_all(output: &mut Subsystem) {
    output.register(Box::new(AsciiDisplayer::new()));
    output.register(Box::new(FormatDisplayer::new()));
    output.register(Box::new(JsonDisplayer::new()));
    output.register(Box::new(NullDisplayer));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all() {
        let mut output = Subsystem::new("output");
        register_all(&mut output);
        let names: Vec<_> = output.modules().map(|m| m.name().to_string()).collect();
        assert_eq!(names, vec!["ascii", "format", "json", "null"]);
    }
}
