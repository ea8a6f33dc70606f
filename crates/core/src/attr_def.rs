//! Registry of attribute definitions.
//!
//! Every kind of statistic the engine tracks (bytes, packets, errors, ...)
//! is described once here. Ids are assigned sequentially starting at 1 and
//! are never reused.

use crate::error::EngineError;
use crate::unit::{UnitId, UnitRegistry};
use bwmon_types::{AttrFlags, AttrKind};
use log::{debug, warn};
use std::fmt;

/// Identifier of an attribute definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrId(u32);

impl AttrId {
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct AttrDef {
    id: AttrId,
    name: String,
    description: String,
    kind: AttrKind,
    unit: UnitId,
    flags: AttrFlags,
}

impl AttrDef {
    pub fn id(&self) -> AttrId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> AttrKind {
        self.kind
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn flags(&self) -> AttrFlags {
        self.flags
    }
}

/// Static table entry for bulk registration by input modules
#[derive(Debug, Clone)]
pub struct AttrMapEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: &'static str,
    pub kind: AttrKind,
    pub flags: AttrFlags,
    /// Filled in by [`AttrDefRegistry::load_map`]
    pub id: Option<AttrId>,
}

impl AttrMapEntry {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        unit: &'static str,
        kind: AttrKind,
    ) -> Self {
        Self {
            name,
            description,
            unit,
            kind,
            flags: AttrFlags::empty(),
            id: None,
        }
    }

    pub fn with_flags(mut self, flags: AttrFlags) -> Self {
        self.flags = flags;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttrDefRegistry {
    defs: Vec<AttrDef>,
}

impl AttrDefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition.
    ///
    /// Registering an existing name returns its id and leaves the stored
    /// definition untouched.
    pub fn register(
        &mut self,
        name: &str,
        description: &str,
        unit: UnitId,
        kind: AttrKind,
        flags: AttrFlags,
    ) -> AttrId {
        if let Some(def) = self.lookup_by_name(name) {
            debug!("Attribute '{}' already registered as {}", name, def.id);
            return def.id;
        }

        let id = AttrId(self.defs.len() as u32 + 1);
        self.defs.push(AttrDef {
            id,
            name: name.to_string(),
            description: description.to_string(),
            kind,
            unit,
            flags,
        });
        id
    }

    /// Register a definition whose unit is given by name
    pub fn register_with_unit(
        &mut self,
        units: &UnitRegistry,
        name: &str,
        description: &str,
        unit: &str,
        kind: AttrKind,
        flags: AttrFlags,
    ) -> Result<AttrId, EngineError> {
        let unit = units
            .lookup(unit)
            .ok_or_else(|| EngineError::UnknownUnit(unit.to_string()))?;
        Ok(self.register(name, description, unit, kind, flags))
    }

    /// Register every entry of `map` and store the assigned ids back.
    ///
    /// Entries with an unknown unit are skipped. Returns the number of
    /// entries that could not be registered.
    pub fn load_map(&mut self, map: &mut [AttrMapEntry], units: &UnitRegistry) -> usize {
        let mut failed = 0;

        for entry in map.iter_mut() {
            match self.register_with_unit(
                units,
                entry.name,
                entry.description,
                entry.unit,
                entry.kind,
                entry.flags,
            ) {
                Ok(id) => entry.id = Some(id),
                Err(e) => {
                    warn!("Cannot register attribute '{}': {}", entry.name, e);
                    entry.id = None;
                    failed += 1;
                }
            }
        }

        failed
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&AttrDef> {
        self.defs.iter().find(|d| d.name == name)
    }

    pub fn lookup_by_id(&self, id: AttrId) -> Option<&AttrDef> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.defs.get(index)
    }

    pub fn id_of(&self, name: &str) -> Option<AttrId> {
        self.lookup_by_name(name).map(|d| d.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttrDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
