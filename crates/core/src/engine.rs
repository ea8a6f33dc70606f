//! The engine: registries plus the element forest.

use crate::attr_def::{AttrDefRegistry, AttrId, AttrMapEntry};
use crate::element::{Element, ElementId};
use crate::error::EngineError;
use crate::graph::{ElementGraph, Lookup};
use crate::group::GroupId;
use crate::history::HistoryDefRegistry;
use crate::policy::Policy;
use crate::unit::UnitRegistry;
use bwmon_types::{AppConfig, AttrFlags, AttrKind, EngineSettings};
use log::{debug, info, trace};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Engine {
    settings: EngineSettings,
    units: UnitRegistry,
    attr_defs: AttrDefRegistry,
    history_defs: HistoryDefRegistry,
    graph: ElementGraph,
    last_read: Instant,
}

impl Engine {
    /// Engine with empty registries
    pub fn new(settings: EngineSettings) -> Self {
        let mut graph = ElementGraph::new(Policy::parse(&settings.policy), settings.base_lifecycles());
        graph.set_show_all(settings.show_all);

        Self {
            units: UnitRegistry::new(settings.unit_variant(), settings.unit_exp),
            attr_defs: AttrDefRegistry::new(),
            history_defs: HistoryDefRegistry::new(),
            graph,
            settings,
            last_read: Instant::now(),
        }
    }

    /// Validate `config` and register its units, histories, attributes and
    /// element overrides on top of the built-in ones
    pub fn from_config(config: &AppConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let mut engine = Self::new(config.settings.clone());
        engine.units = UnitRegistry::from_configs(&config.effective_units(), &config.settings)?;
        engine.history_defs =
            HistoryDefRegistry::from_configs(&config.effective_histories(), &config.settings)?;

        for attr in &config.attrs {
            let unit = engine.units.lookup(&attr.unit).ok_or_else(|| {
                bwmon_types::ConfigError::UnknownUnit {
                    unit: attr.unit.clone(),
                    attr: attr.name.clone(),
                }
            })?;
            engine
                .attr_defs
                .register(&attr.name, &attr.description, unit, attr.kind, attr.flags());
        }

        for element in &config.elements {
            engine.graph.add_config(element.clone());
        }

        info!(
            "Engine ready: {} units, {} histories, {} attributes, read interval {}s",
            engine.units.len(),
            engine.history_defs.len(),
            engine.attr_defs.len(),
            engine.settings.read_interval
        );
        Ok(engine)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    pub fn units_mut(&mut self) -> &mut UnitRegistry {
        &mut self.units
    }

    pub fn attr_defs(&self) -> &AttrDefRegistry {
        &self.attr_defs
    }

    pub fn history_defs(&self) -> &HistoryDefRegistry {
        &self.history_defs
    }

    pub fn history_defs_mut(&mut self) -> &mut HistoryDefRegistry {
        &mut self.history_defs
    }

    pub fn graph(&self) -> &ElementGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ElementGraph {
        &mut self.graph
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.graph.get(id)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.graph.get_mut(id)
    }

    /// Time the current read pass started
    pub fn last_read(&self) -> Instant {
        self.last_read
    }

    /// Register an attribute definition whose unit is given by name
    pub fn register_attr(
        &mut self,
        name: &str,
        description: &str,
        unit: &str,
        kind: AttrKind,
        flags: AttrFlags,
    ) -> Result<AttrId, EngineError> {
        self.attr_defs
            .register_with_unit(&self.units, name, description, unit, kind, flags)
    }

    /// Bulk register attribute definitions, see [`AttrDefRegistry::load_map`]
    pub fn load_attr_map(&mut self, map: &mut [AttrMapEntry]) -> usize {
        self.attr_defs.load_map(map, &self.units)
    }

    pub fn lookup_group(&mut self, name: &str, create: bool) -> Option<GroupId> {
        self.graph.lookup_group(name, create)
    }

    /// Find or create an element. Elements created with a capacity from
    /// their config get the matching `RxMax` / `TxMax` info.
    pub fn lookup_or_create(
        &mut self,
        group: GroupId,
        name: &str,
        ident: u32,
        parent: Option<ElementId>,
        create: bool,
    ) -> Option<ElementId> {
        let lookup = self.graph.lookup_or_create(group, name, ident, parent, create)?;

        if let Lookup::Created(id) = lookup {
            if let Some((rx_max, tx_max)) = self.graph.get(id).map(|e| (e.rx_max(), e.tx_max())) {
                if rx_max != 0 {
                    self.set_rx_max(id, rx_max);
                }
                if tx_max != 0 {
                    self.set_tx_max(id, tx_max);
                }
            }
        }

        Some(lookup.id())
    }

    /// Record raw counter values of one attribute. Unregistered attribute
    /// ids and unknown elements are ignored.
    pub fn report_update(
        &mut self,
        element: ElementId,
        attr: AttrId,
        rx: Option<u64>,
        tx: Option<u64>,
        is_64bit: bool,
    ) {
        let Some(def) = self.attr_defs.lookup_by_id(attr) else {
            trace!("Dropping update for unregistered attribute {}", attr);
            return;
        };
        let Some(e) = self.graph.get_mut(element) else {
            return;
        };

        e.update_attr(
            def,
            &self.attr_defs,
            &self.history_defs,
            &self.settings,
            rx,
            tx,
            is_64bit,
            self.last_read,
        );
    }

    /// Recompute every attribute of `element`. Uses the start of the current
    /// read pass unless `now` is given.
    pub fn notify_update(&mut self, element: ElementId, now: Option<Instant>) {
        let now = now.unwrap_or(self.last_read);
        if let Some(e) = self.graph.get_mut(element) {
            e.notify_update(now, &self.settings);
        }
    }

    pub fn mark_seen(&mut self, element: ElementId, cycles: u32) {
        self.graph.mark_seen(element, cycles);
    }

    /// Set the headline attributes of an element, by definition name
    pub fn set_key_attrs(&mut self, element: ElementId, major: &str, minor: &str) -> Result<(), EngineError> {
        let major = self.attr_id(major)?;
        let minor = self.attr_id(minor)?;

        if let Some(e) = self.graph.get_mut(element) {
            e.set_key_attrs(major, minor, &self.attr_defs);
        }
        Ok(())
    }

    /// Set the attribute usage is computed from, by definition name
    pub fn set_usage_attr(&mut self, element: ElementId, name: &str) -> Result<(), EngineError> {
        let id = self.attr_id(name)?;
        if let Some(e) = self.graph.get_mut(element) {
            e.set_usage_attr(id);
        }
        Ok(())
    }

    fn attr_id(&self, name: &str) -> Result<AttrId, EngineError> {
        self.attr_defs
            .id_of(name)
            .ok_or_else(|| EngineError::UnknownAttribute(name.to_string()))
    }

    /// Set the receive capacity in bytes per second
    pub fn set_rx_max(&mut self, element: ElementId, max: u64) {
        let text = self.units.bits_to_str(max.saturating_mul(8));
        if let Some(e) = self.graph.get_mut(element) {
            e.set_rx_max(max);
            e.update_info("RxMax", &text);
        }
    }

    /// Set the transmit capacity in bytes per second
    pub fn set_tx_max(&mut self, element: ElementId, max: u64) {
        let text = self.units.bits_to_str(max.saturating_mul(8));
        if let Some(e) = self.graph.get_mut(element) {
            e.set_tx_max(max);
            e.update_info("TxMax", &text);
        }
    }

    pub fn start_collecting_history(&mut self, element: ElementId, attr: AttrId) {
        if let Some(a) = self
            .graph
            .get_mut(element)
            .and_then(|e| e.attribute_mut(attr))
        {
            a.start_collecting_history(&self.history_defs, &self.settings);
        }
    }

    pub fn reset_counter(&mut self, element: ElementId, attr: AttrId) {
        if let Some(a) = self
            .graph
            .get_mut(element)
            .and_then(|e| e.attribute_mut(attr))
        {
            a.reset_counter();
        }
    }

    /// Start a read pass
    pub fn begin_tick(&mut self, now: Instant) {
        self.last_read = now;
        self.graph.reset_update_flags();
    }

    /// Finish a read pass, removing expired elements
    pub fn end_tick(&mut self) -> usize {
        let removed = self.graph.sweep();
        if removed > 0 {
            debug!("Removed {} expired elements", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Direction;
    use bwmon_types::{AttrConfig, ElementConfig, DEFAULT_GROUP};
    use std::time::Duration;

    fn engine() -> Engine {
        let mut config = AppConfig::default();
        config.attrs.push(AttrConfig {
            name: "bytes".to_string(),
            description: "Bytes".to_string(),
            unit: "byte".to_string(),
            kind: AttrKind::Counter,
            history: false,
            ignore_overflows: false,
        });
        config.attrs.push(AttrConfig {
            name: "packets".to_string(),
            description: "Packets".to_string(),
            unit: "number".to_string(),
            kind: AttrKind::Counter,
            history: false,
            ignore_overflows: false,
        });
        let mut eth0 = ElementConfig::new("eth0");
        eth0.max = 125_000;
        config.elements.push(eth0);
        Engine::from_config(&config).unwrap()
    }

    #[test]
    fn test_from_config_rejects_unknown_unit() {
        let mut config = AppConfig::default();
        config.attrs.push(AttrConfig {
            name: "x".to_string(),
            description: String::new(),
            unit: "furlong".to_string(),
            kind: AttrKind::Counter,
            history: false,
            ignore_overflows: false,
        });

        assert!(matches!(
            Engine::from_config(&config),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_capacity_info_from_config() {
        let mut engine = engine();
        let group = engine.lookup_group(DEFAULT_GROUP, true).unwrap();
        let id = engine.lookup_or_create(group, "eth0", 0, None, true).unwrap();

        let element = engine.element(id).unwrap();
        assert_eq!(element.rx_max(), 125_000);
        assert!(element.info().iter().any(|i| i.name == "RxMax" && i.value == "1Mb"));
    }

    #[test]
    fn test_unknown_attribute_dropped() {
        let mut engine = engine();
        let group = engine.lookup_group(DEFAULT_GROUP, true).unwrap();
        let id = engine.lookup_or_create(group, "eth0", 0, None, true).unwrap();

        let bogus = {
            let mut defs = AttrDefRegistry::new();
            for n in 0..10 {
                let unit = engine.units().lookup("byte").unwrap();
                defs.register(&format!("a{}", n), "", unit, AttrKind::Counter, AttrFlags::empty());
            }
            defs.id_of("a9").unwrap()
        };

        engine.report_update(id, bogus, Some(1), Some(1), false);
        assert_eq!(engine.element(id).unwrap().attributes().count(), 0);
    }

    #[test]
    fn test_key_attrs_collect_history() {
        let mut engine = engine();
        let group = engine.lookup_group(DEFAULT_GROUP, true).unwrap();
        let id = engine.lookup_or_create(group, "eth0", 0, None, true).unwrap();
        engine.set_key_attrs(id, "bytes", "packets").unwrap();
        assert!(matches!(
            engine.set_usage_attr(id, "nope"),
            Err(EngineError::UnknownAttribute(_))
        ));

        let bytes = engine.attr_defs().id_of("bytes").unwrap();
        let start = Instant::now();
        for tick in 0..3u64 {
            let now = start + Duration::from_secs(tick);
            engine.begin_tick(now);
            engine.report_update(id, bytes, Some(tick * 1000), Some(0), false);
            engine.notify_update(id, None);
            engine.mark_seen(id, 1);
            engine.end_tick();
        }

        let attr = engine.element(id).unwrap().attribute(bytes).unwrap();
        assert!(attr.is_collecting_history());
        let second = engine.history_defs().lookup("second").unwrap().id();
        assert_eq!(attr.history(second).unwrap().latest(Direction::Rx), Some(1000));
    }

    #[test]
    fn test_unreported_element_expires() {
        let mut engine = engine();
        let group = engine.lookup_group(DEFAULT_GROUP, true).unwrap();
        let id = engine.lookup_or_create(group, "eth0", 0, None, true).unwrap();
        let base = engine.graph().base_lifecycles();

        let mut now = Instant::now();
        for _ in 0..base {
            now += Duration::from_secs(1);
            engine.begin_tick(now);
            engine.end_tick();
        }
        assert!(engine.element(id).is_none());
    }
}
