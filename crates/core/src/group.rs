//! Element groups and their header templates.

use crate::element::ElementId;
use crate::error::EngineError;
use bwmon_types::DEFAULT_GROUP;
use std::fmt;

/// Handle of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(usize);

impl GroupId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Title and column labels shown above a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupHeader {
    pub name: String,
    pub title: String,
    pub columns: [String; 4],
}

#[derive(Debug, Clone)]
pub struct HeaderRegistry {
    headers: Vec<GroupHeader>,
}

impl Default for HeaderRegistry {
    /// Registry holding the interface header
    fn default() -> Self {
        Self {
            headers: vec![GroupHeader {
                name: DEFAULT_GROUP.to_string(),
                title: "Interfaces".to_string(),
                columns: ["RX bps", "pps", "TX bps", "pps"].map(String::from),
            }],
        }
    }
}

impl HeaderRegistry {
    pub fn empty() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&GroupHeader> {
        self.headers.iter().find(|h| h.name == name)
    }

    pub fn add(&mut self, name: &str, title: &str, columns: [&str; 4]) -> Result<(), EngineError> {
        if self.lookup(name).is_some() {
            return Err(EngineError::HeaderExists(name.to_string()));
        }

        self.headers.push(GroupHeader {
            name: name.to_string(),
            title: title.to_string(),
            columns: columns.map(String::from),
        });
        Ok(())
    }

    /// Register `name` with the columns of the existing header `template`
    pub fn derive(&mut self, name: &str, title: &str, template: &str) -> Result<(), EngineError> {
        let columns = self
            .lookup(template)
            .ok_or_else(|| EngineError::UnknownHeader(template.to_string()))?
            .columns
            .clone();

        if self.lookup(name).is_some() {
            return Err(EngineError::HeaderExists(name.to_string()));
        }

        self.headers.push(GroupHeader {
            name: name.to_string(),
            title: title.to_string(),
            columns,
        });
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupHeader> {
        self.headers.iter()
    }
}

/// Named collection of root elements
#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    name: String,
    header: GroupHeader,
    pub(crate) roots: Vec<ElementId>,
    pub(crate) current: Option<ElementId>,
    pub(crate) count: usize,
}

impl Group {
    pub(crate) fn new(id: GroupId, header: GroupHeader) -> Self {
        Self {
            id,
            name: header.name.clone(),
            header,
            roots: Vec::new(),
            current: None,
            count: 0,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &GroupHeader {
        &self.header
    }

    pub fn roots(&self) -> &[ElementId] {
        &self.roots
    }

    /// Selected element of this group
    pub fn current(&self) -> Option<ElementId> {
        self.current
    }

    /// Number of elements in the group, nested ones included
    pub fn element_count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
