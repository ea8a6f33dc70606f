//! Input and output modules.
//!
//! Data sources and renderers implement [`Module`] and are registered into a
//! [`Subsystem`]. Which modules run is chosen with a selection string such as
//! `dummy:num=3;randomize,sysinfo`.

use crate::engine::Engine;
use crate::error::EngineError;
use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};

/// Whether the main loop should keep going after a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Trait for all input and output modules
pub trait Module {
    /// Unique name within the subsystem
    fn name(&self) -> &str;

    /// One line description for module listings
    fn description(&self) -> &str {
        ""
    }

    /// Used when nothing was selected and no preferred module works
    fn is_default(&self) -> bool {
        false
    }

    /// Enabled in addition to the selected modules
    fn is_auto(&self) -> bool {
        false
    }

    /// Apply one `key[=value]` option from the selection string
    fn parse_opt(&mut self, key: &str, _value: Option<&str>) -> Result<()> {
        Err(anyhow!("Unknown option '{}' for module {}", key, self.name()))
    }

    /// Check whether the module can work on this system
    fn probe(&mut self) -> bool {
        true
    }

    fn init(&mut self, _engine: &mut Engine) -> Result<()> {
        Ok(())
    }

    fn pre_poll(&mut self, _engine: &mut Engine) -> Result<()> {
        Ok(())
    }

    fn poll(&mut self, engine: &mut Engine) -> Result<Flow>;

    fn post_poll(&mut self, _engine: &mut Engine) -> Result<()> {
        Ok(())
    }

    fn shutdown(&mut self, _engine: &mut Engine) {}
}

/// Type-erased module for dynamic dispatch
pub type BoxedModule = Box<dyn Module>;

/// One entry of a selection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSelection {
    pub name: String,
    pub options: Vec<(String, Option<String>)>,
}

/// Parse `name:key=value;flag,name2` into its entries
pub fn parse_selection(spec: &str) -> Vec<ModuleSelection> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (name, opts) = match entry.split_once(':') {
                Some((name, opts)) => (name, opts),
                None => (entry, ""),
            };

            let options = opts
                .split(';')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(|opt| match opt.split_once('=') {
                    Some((k, v)) => (k.trim().to_string(), Some(v.trim().to_string())),
                    None => (opt.to_string(), None),
                })
                .collect();

            ModuleSelection {
                name: name.trim().to_string(),
                options,
            }
        })
        .collect()
}

struct Slot {
    module: BoxedModule,
    enabled: bool,
}

/// Ordered set of modules of one kind (input or output)
pub struct Subsystem {
    name: &'static str,
    slots: Vec<Slot>,
}

impl Subsystem {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Add a module. A module with the same name is replaced.
    pub fn register(&mut self, module: BoxedModule) {
        self.slots.retain(|s| s.module.name() != module.name());
        self.slots.push(Slot {
            module,
            enabled: false,
        });
    }

    pub fn modules(&self) -> impl Iterator<Item = &dyn Module> {
        self.slots.iter().map(|s| s.module.as_ref())
    }

    pub fn enabled(&self) -> impl Iterator<Item = &dyn Module> {
        self.slots
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.module.as_ref())
    }

    pub fn enabled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.enabled).count()
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.module.name() == name)
    }

    /// Apply options and probe; a module that fails its probe stays disabled
    fn configure(slot: &mut Slot, options: &[(String, Option<String>)]) -> Result<bool> {
        for (key, value) in options {
            slot.module.parse_opt(key, value.as_deref())?;
        }

        if slot.module.probe() {
            slot.enabled = true;
            debug!("Enabled module {}", slot.module.name());
        } else {
            warn!("Module {} is not available", slot.module.name());
        }
        Ok(slot.enabled)
    }

    /// Enable the modules named in `spec`, then every auto module.
    ///
    /// Unknown modules and invalid options are errors. A selection where no
    /// module passes its probe is an error too.
    pub fn select(&mut self, spec: &str) -> Result<()> {
        let subsystem = self.name;

        for selection in parse_selection(spec) {
            let slot = self.slot_mut(&selection.name).ok_or_else(|| EngineError::UnknownModule {
                subsystem: subsystem.to_string(),
                name: selection.name.clone(),
            })?;
            Self::configure(slot, &selection.options)?;
        }

        self.enable_auto()?;

        if self.enabled_count() == 0 {
            return Err(EngineError::NoModule(subsystem.to_string()).into());
        }
        Ok(())
    }

    /// Enable a module if none was selected: the first of `preferred` that
    /// probes successfully, else the first default module.
    pub fn select_default(&mut self, preferred: &[&str]) -> Result<()> {
        if self.enabled_count() > 0 {
            return Ok(());
        }

        for name in preferred {
            if let Some(slot) = self.slot_mut(name) {
                if Self::configure(slot, &[])? {
                    info!("Using default {} module {}", self.name, name);
                    return self.enable_auto();
                }
            }
        }

        for index in 0..self.slots.len() {
            if !self.slots[index].module.is_default() {
                continue;
            }
            if Self::configure(&mut self.slots[index], &[])? {
                info!(
                    "Using fallback {} module {}",
                    self.name,
                    self.slots[index].module.name()
                );
                return self.enable_auto();
            }
        }

        Err(EngineError::NoModule(self.name.to_string()).into())
    }

    fn enable_auto(&mut self) -> Result<()> {
        for slot in self.slots.iter_mut().filter(|s| s.module.is_auto() && !s.enabled) {
            Self::configure(slot, &[])?;
        }
        Ok(())
    }

    /// Initialize enabled modules; a module failing to initialize is
    /// disabled
    pub fn init(&mut self, engine: &mut Engine) -> Result<()> {
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            if let Err(e) = slot.module.init(engine) {
                error!("Failed to initialize module {}: {}", slot.module.name(), e);
                slot.enabled = false;
            }
        }

        if self.enabled_count() == 0 {
            return Err(EngineError::NoModule(self.name.to_string()).into());
        }
        Ok(())
    }

    pub fn pre_poll(&mut self, engine: &mut Engine) {
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            if let Err(e) = slot.module.pre_poll(engine) {
                error!("{}: pre poll failed: {}", slot.module.name(), e);
            }
        }
    }

    /// Poll every enabled module. Returns [`Flow::Quit`] if any module asked
    /// to stop.
    pub fn poll(&mut self, engine: &mut Engine) -> Flow {
        let mut flow = Flow::Continue;
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            match slot.module.poll(engine) {
                Ok(Flow::Quit) => flow = Flow::Quit,
                Ok(Flow::Continue) => {}
                Err(e) => error!("{}: poll failed: {}", slot.module.name(), e),
            }
        }
        flow
    }

    pub fn post_poll(&mut self, engine: &mut Engine) {
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            if let Err(e) = slot.module.post_poll(engine) {
                error!("{}: post poll failed: {}", slot.module.name(), e);
            }
        }
    }

    pub fn shutdown(&mut self, engine: &mut Engine) {
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            slot.module.shutdown(engine);
            slot.enabled = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bwmon_types::EngineSettings;

    struct Probe {
        name: &'static str,
        available: bool,
        default: bool,
        polls: usize,
        quit_after: Option<usize>,
    }

    impl Probe {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                available: true,
                default: false,
                polls: 0,
                quit_after: None,
            }
        }
    }

    impl Module for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn is_default(&self) -> bool {
            self.default
        }

        fn parse_opt(&mut self, key: &str, value: Option<&str>) -> Result<()> {
            match (key, value) {
                ("quitafter", Some(v)) => self.quit_after = Some(v.parse()?),
                _ => return Err(anyhow!("Unknown option '{}'", key)),
            }
            Ok(())
        }

        fn probe(&mut self) -> bool {
            self.available
        }

        fn poll(&mut self, _engine: &mut Engine) -> Result<Flow> {
            self.polls += 1;
            match self.quit_after {
                Some(n) if self.polls >= n => Ok(Flow::Quit),
                _ => Ok(Flow::Continue),
            }
        }
    }

    #[test]
    fn test_parse_selection() {
        let parsed = parse_selection("dummy:num=3;randomize, json");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "dummy");
        assert_eq!(
            parsed[0].options,
            vec![
                ("num".to_string(), Some("3".to_string())),
                ("randomize".to_string(), None)
            ]
        );
        assert_eq!(parsed[1].name, "json");
        assert!(parsed[1].options.is_empty());
        assert!(parse_selection("").is_empty());
    }

    #[test]
    fn test_select_unknown_module() {
        let mut subsystem = Subsystem::new("output");
        subsystem.register(Box::new(Probe::new("ascii")));

        let err = subsystem.select("curses").unwrap_err();
        assert_eq!(err.to_string(), "Unknown output module 'curses'");
    }

    #[test]
    fn test_select_bad_option() {
        let mut subsystem = Subsystem::new("output");
        subsystem.register(Box::new(Probe::new("ascii")));
        assert!(subsystem.select("ascii:bogus").is_err());
    }

    #[test]
    fn test_default_fallback() {
        let mut subsystem = Subsystem::new("input");
        let mut broken = Probe::new("sysinfo");
        broken.available = false;
        let mut fallback = Probe::new("dummy");
        fallback.default = true;
        subsystem.register(Box::new(broken));
        subsystem.register(Box::new(fallback));

        subsystem.select_default(&["sysinfo"]).unwrap();
        let enabled: Vec<_> = subsystem.enabled().map(|m| m.name().to_string()).collect();
        assert_eq!(enabled, vec!["dummy"]);
    }

    #[test]
    fn test_poll_quit() {
        let mut engine = Engine::new(EngineSettings::default());
        let mut subsystem = Subsystem::new("output");
        subsystem.register(Box::new(Probe::new("ascii")));
        subsystem.select("ascii:quitafter=2").unwrap();
        subsystem.init(&mut engine).unwrap();

        assert_eq!(subsystem.poll(&mut engine), Flow::Continue);
        assert_eq!(subsystem.poll(&mut engine), Flow::Quit);

        subsystem.shutdown(&mut engine);
        assert_eq!(subsystem.enabled_count(), 0);
    }
}
