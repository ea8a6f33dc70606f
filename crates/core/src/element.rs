//! Elements: observed objects (interfaces, queues, classes) and their
//! attributes.

use crate::attr::Attribute;
use crate::attr_def::{AttrDef, AttrDefRegistry, AttrId};
use crate::group::GroupId;
use crate::history::HistoryDefRegistry;
use bwmon_types::{AttrFlags, EngineSettings};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

/// Arena handle of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementFlags(u8);

impl ElementFlags {
    /// Created during the current tick, cleared by the source once set up
    pub const CREATED: Self = Self(0x01);
    /// Refreshed during the current tick
    pub const UPDATED: Self = Self(0x02);
    pub const EXCLUDED: Self = Self(0x04);
    /// Children are hidden in tree views
    pub const FOLDED: Self = Self(0x08);

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

/// Name/value pair shown in detail views
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub(crate) id: ElementId,
    name: String,
    ident: u32,
    description: Option<String>,
    pub(crate) flags: ElementFlags,
    level: u32,
    pub(crate) group: GroupId,
    pub(crate) parent: Option<ElementId>,
    pub(crate) children: Vec<ElementId>,
    attrs: HashMap<AttrId, Attribute>,
    /// Display order of `attrs`
    attr_order: Vec<AttrId>,
    info: Vec<Info>,
    key_attrs: [Option<AttrId>; 2],
    usage_attr: Option<AttrId>,
    pub(crate) lifecycles: i64,
    rx_usage: Option<f64>,
    tx_usage: Option<f64>,
    rx_max: u64,
    tx_max: u64,
    current_attr: Option<AttrId>,
}

impl Element {
    pub(crate) fn new(
        id: ElementId,
        name: &str,
        ident: u32,
        group: GroupId,
        parent: Option<(ElementId, u32)>,
        lifecycles: i64,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            ident,
            description: None,
            flags: ElementFlags::CREATED,
            level: parent.map(|(_, level)| level + 1).unwrap_or(0),
            group,
            parent: parent.map(|(id, _)| id),
            children: Vec::new(),
            attrs: HashMap::new(),
            attr_order: Vec::new(),
            info: Vec::new(),
            key_attrs: [None, None],
            usage_attr: None,
            lifecycles,
            rx_usage: None,
            tx_usage: None,
            rx_max: 0,
            tx_max: 0,
            current_attr: None,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Numeric id disambiguating same-named siblings
    pub fn ident(&self) -> u32 {
        self.ident
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = Some(description.to_string());
    }

    pub fn flags(&self) -> ElementFlags {
        self.flags
    }

    pub fn is_updated(&self) -> bool {
        self.flags.contains(ElementFlags::UPDATED)
    }

    /// Returns whether the element was created this tick and clears the mark
    pub fn take_created(&mut self) -> bool {
        let created = self.flags.contains(ElementFlags::CREATED);
        self.flags.remove(ElementFlags::CREATED);
        created
    }

    pub fn toggle_folded(&mut self) {
        if self.flags.contains(ElementFlags::FOLDED) {
            self.flags.remove(ElementFlags::FOLDED);
        } else {
            self.flags.insert(ElementFlags::FOLDED);
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    pub fn lifecycles(&self) -> i64 {
        self.lifecycles
    }

    pub fn rx_usage(&self) -> Option<f64> {
        self.rx_usage
    }

    pub fn tx_usage(&self) -> Option<f64> {
        self.tx_usage
    }

    pub fn rx_max(&self) -> u64 {
        self.rx_max
    }

    pub fn tx_max(&self) -> u64 {
        self.tx_max
    }

    pub(crate) fn set_rx_max(&mut self, max: u64) {
        self.rx_max = max;
    }

    pub(crate) fn set_tx_max(&mut self, max: u64) {
        self.tx_max = max;
    }

    pub fn major_attr(&self) -> Option<AttrId> {
        self.key_attrs[0]
    }

    pub fn minor_attr(&self) -> Option<AttrId> {
        self.key_attrs[1]
    }

    pub fn usage_attr(&self) -> Option<AttrId> {
        self.usage_attr
    }

    pub fn info(&self) -> &[Info] {
        &self.info
    }

    /// Insert or replace an info entry, keeping insertion order
    pub fn update_info(&mut self, name: &str, value: &str) {
        match self.info.iter_mut().find(|i| i.name == name) {
            Some(info) => info.value = value.to_string(),
            None => self.info.push(Info {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn attribute(&self, id: AttrId) -> Option<&Attribute> {
        self.attrs.get(&id)
    }

    pub fn attribute_mut(&mut self, id: AttrId) -> Option<&mut Attribute> {
        self.attrs.get_mut(&id)
    }

    /// Attributes in display order
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attr_order.iter().filter_map(|id| self.attrs.get(id))
    }

    pub fn attribute_ids(&self) -> &[AttrId] {
        &self.attr_order
    }

    fn is_key_attr(&self, id: AttrId) -> bool {
        self.key_attrs.contains(&Some(id))
    }

    fn display_cmp(&self, defs: &AttrDefRegistry, a: AttrId, b: AttrId) -> Ordering {
        let rank = |id| {
            if Some(id) == self.key_attrs[0] {
                0
            } else if Some(id) == self.key_attrs[1] {
                1
            } else {
                2
            }
        };
        let description = |id| {
            defs.lookup_by_id(id)
                .map(|d| d.description().to_lowercase())
                .unwrap_or_default()
        };

        rank(a)
            .cmp(&rank(b))
            .then_with(|| description(a).cmp(&description(b)))
    }

    pub(crate) fn set_key_attrs(&mut self, major: AttrId, minor: AttrId, defs: &AttrDefRegistry) {
        self.key_attrs = [Some(major), Some(minor)];
        let mut order = std::mem::take(&mut self.attr_order);
        order.sort_by(|a, b| self.display_cmp(defs, *a, *b));
        self.attr_order = order;
    }

    pub(crate) fn set_usage_attr(&mut self, id: AttrId) {
        self.usage_attr = Some(id);
    }

    /// Store a raw reading, creating the attribute on first report
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn update_attr(
        &mut self,
        def: &AttrDef,
        defs: &AttrDefRegistry,
        history_defs: &HistoryDefRegistry,
        settings: &EngineSettings,
        rx: Option<u64>,
        tx: Option<u64>,
        is_64bit: bool,
        now: Instant,
    ) {
        let id = def.id();

        if !self.attrs.contains_key(&id) {
            let mut attr = Attribute::new(def);
            if def.flags().contains(AttrFlags::FORCE_HISTORY) || self.is_key_attr(id) {
                attr.start_collecting_history(history_defs, settings);
            }
            self.attrs.insert(id, attr);

            let pos = self
                .attr_order
                .iter()
                .position(|other| self.display_cmp(defs, id, *other) == Ordering::Less)
                .unwrap_or(self.attr_order.len());
            self.attr_order.insert(pos, id);
        }

        if let Some(attr) = self.attrs.get_mut(&id) {
            attr.set_raw(rx, tx, is_64bit, now);
        }
    }

    /// Mark the element updated, recompute every attribute and refresh the
    /// cached usage
    pub(crate) fn notify_update(&mut self, now: Instant, settings: &EngineSettings) {
        self.flags.insert(ElementFlags::UPDATED);

        for attr in self.attrs.values_mut() {
            attr.recompute(now, settings);
        }

        let usage = self
            .usage_attr
            .and_then(|id| self.attrs.get(&id))
            .map(|attr| attr.calc_usage(self.rx_max, self.tx_max, settings.rate_interval));

        (self.rx_usage, self.tx_usage) = usage.unwrap_or((None, None));
    }

    pub fn current_attr(&self) -> Option<AttrId> {
        self.current_attr
    }

    pub fn select_first_attr(&mut self) -> Option<AttrId> {
        self.current_attr = self.attr_order.first().copied();
        self.current_attr
    }

    pub fn select_last_attr(&mut self) -> Option<AttrId> {
        self.current_attr = self.attr_order.last().copied();
        self.current_attr
    }

    /// Next attribute in display order, wrapping to the first
    pub fn select_next_attr(&mut self) -> Option<AttrId> {
        let pos = self
            .current_attr
            .and_then(|id| self.attr_order.iter().position(|a| *a == id));
        match pos {
            Some(p) if p + 1 < self.attr_order.len() => {
                self.current_attr = Some(self.attr_order[p + 1]);
                self.current_attr
            }
            _ => self.select_first_attr(),
        }
    }

    /// Previous attribute in display order, wrapping to the last
    pub fn select_prev_attr(&mut self) -> Option<AttrId> {
        let pos = self
            .current_attr
            .and_then(|id| self.attr_order.iter().position(|a| *a == id));
        match pos {
            Some(p) if p > 0 => {
                self.current_attr = Some(self.attr_order[p - 1]);
                self.current_attr
            }
            _ => self.select_last_attr(),
        }
    }

    /// The selected attribute, selecting the first one if none is
    pub fn select_current_attr(&mut self) -> Option<AttrId> {
        let valid = self
            .current_attr
            .is_some_and(|id| self.attrs.contains_key(&id));
        if valid {
            self.current_attr
        } else {
            self.select_first_attr()
        }
    }
}
