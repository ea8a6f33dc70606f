//! bwmon-sources: Input modules for the bwmon bandwidth monitor.

mod dummy;
mod network;
mod null;

pub use dummy::DummySource;
pub use network::NetworkSource;
pub use null::NullSource;

use bwmon_core::Subsystem;

/// Input modules tried, in order, when none was selected
pub const PREFERRED: &[&str] = &["sysinfo"];

/// Register all built-in input modules
pub fn register_all(input: &mut Subsystem) {
    input.register(Box::new(NetworkSource::new()));
    input.register(Box::new(DummySource::new()));
    input.register(Box::new(NullSource));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all() {
        let mut input = Subsystem::new("input");
        register_all(&mut input);
        let names: Vec<_> = input.modules().map(|m| m.name().to_string()).collect();
        assert_eq!(names, vec!["sysinfo", "dummy", "null"]);
    }
}
