//! The element forest.
//!
//! Elements live in an id keyed arena and reference their parent and
//! children by id. Every root element belongs to a [`Group`]; nested
//! elements belong to the group of their root. Tree-wide walks take a
//! snapshot of ids first so elements may be destroyed while walking.

use crate::element::{Element, ElementFlags, ElementId};
use crate::group::{Group, GroupHeader, GroupId, HeaderRegistry};
use crate::policy::Policy;
use bwmon_types::ElementConfig;
use log::{debug, info, trace};
use std::collections::HashMap;

/// Result of [`ElementGraph::lookup_or_create`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Existing(ElementId),
    Created(ElementId),
}

impl Lookup {
    pub fn id(&self) -> ElementId {
        match self {
            Lookup::Existing(id) | Lookup::Created(id) => *id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElementGraph {
    elements: HashMap<ElementId, Element>,
    groups: Vec<Group>,
    headers: HeaderRegistry,
    configs: Vec<ElementConfig>,
    policy: Policy,
    show_all: bool,
    base_lifecycles: i64,
    current_group: Option<GroupId>,
    next_id: u64,
}

impl ElementGraph {
    pub fn new(policy: Policy, base_lifecycles: i64) -> Self {
        Self {
            elements: HashMap::new(),
            groups: Vec::new(),
            headers: HeaderRegistry::default(),
            configs: Vec::new(),
            policy,
            show_all: false,
            base_lifecycles,
            current_group: None,
            next_id: 1,
        }
    }

    pub fn set_show_all(&mut self, show_all: bool) {
        self.show_all = show_all;
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn base_lifecycles(&self) -> i64 {
        self.base_lifecycles
    }

    pub fn headers(&self) -> &HeaderRegistry {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderRegistry {
        &mut self.headers
    }

    pub fn add_config(&mut self, config: ElementConfig) {
        self.configs.retain(|c| c.name != config.name);
        self.configs.push(config);
    }

    pub fn config(&self, name: &str) -> Option<&ElementConfig> {
        self.configs.iter().find(|c| c.name == name)
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(&id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.index())
    }

    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name() == name)
    }

    /// Find a group, creating it from the header of the same name.
    ///
    /// Returns `None` if the group does not exist and either `create` is not
    /// set or no such header is registered.
    pub fn lookup_group(&mut self, name: &str, create: bool) -> Option<GroupId> {
        if let Some(group) = self.group_by_name(name) {
            return Some(group.id());
        }
        if !create {
            return None;
        }

        let header: GroupHeader = self.headers.lookup(name)?.clone();
        let id = GroupId::new(self.groups.len());
        info!("Creating group '{}'", name);
        self.groups.push(Group::new(id, header));
        Some(id)
    }

    fn is_admitted(&self, name: &str) -> bool {
        if self.show_all {
            return true;
        }

        match self.config(name).and_then(|c| c.show) {
            Some(show) => show,
            None => self.policy.is_allowed(name),
        }
    }

    /// Find the element `(name, ident)` below `parent` (or among the roots of
    /// `group`), creating it if `create` is set and the element is admitted.
    pub fn lookup_or_create(
        &mut self,
        group: GroupId,
        name: &str,
        ident: u32,
        parent: Option<ElementId>,
        create: bool,
    ) -> Option<Lookup> {
        let group_index = group.index();
        if group_index >= self.groups.len() {
            return None;
        }

        let siblings = match parent {
            Some(p) => self.elements.get(&p)?.children.as_slice(),
            None => self.groups[group_index].roots.as_slice(),
        };

        let existing = siblings.iter().copied().find(|id| {
            self.elements
                .get(id)
                .is_some_and(|e| e.name() == name && e.ident() == ident)
        });

        if let Some(id) = existing {
            return Some(Lookup::Existing(id));
        }

        if !create {
            return None;
        }

        if !self.is_admitted(name) {
            trace!("Element '{}' refused by policy", name);
            return None;
        }

        let id = ElementId::new(self.next_id);
        self.next_id += 1;

        let parent_info = match parent {
            Some(p) => Some((p, self.elements.get(&p)?.level())),
            None => None,
        };
        let mut element = Element::new(id, name, ident, group, parent_info, self.base_lifecycles);

        if let Some(config) = self.config(name) {
            if let Some(description) = &config.description {
                element.update_info("Description", description);
            }
            element.set_rx_max(config.rx_max());
            element.set_tx_max(config.tx_max());
        }

        match parent {
            Some(p) => {
                if let Some(parent) = self.elements.get_mut(&p) {
                    parent.children.push(id);
                }
            }
            None => self.groups[group_index].roots.push(id),
        }
        self.groups[group_index].count += 1;
        self.elements.insert(id, element);

        debug!("Created element '{}' ({}) in group {}", name, id, group);
        Some(Lookup::Created(id))
    }

    /// Destroy `id` and its whole subtree. Returns the number of elements
    /// removed.
    pub fn destroy(&mut self, id: ElementId) -> usize {
        if !self.elements.contains_key(&id) {
            return 0;
        }

        let victims = self.post_order(id);
        for victim in &victims {
            self.unlink(*victim);
        }
        victims.len()
    }

    /// Remove a single element whose children are already gone
    fn unlink(&mut self, id: ElementId) {
        let Some((group, parent)) = self.elements.get(&id).map(|e| (e.group, e.parent)) else {
            return;
        };
        let group_index = group.index();

        if self.groups[group_index].current == Some(id) {
            let replacement = self.dfs_prev(id).or_else(|| self.subtree_next(id));
            self.groups[group_index].current = replacement;
        }

        match parent {
            Some(p) => {
                if let Some(parent) = self.elements.get_mut(&p) {
                    parent.children.retain(|c| *c != id);
                }
            }
            None => self.groups[group_index].roots.retain(|r| *r != id),
        }

        if let Some(element) = self.elements.remove(&id) {
            trace!("Destroyed element '{}' ({})", element.name(), id);
        }
        self.groups[group_index].count = self.groups[group_index].count.saturating_sub(1);
    }

    /// Subtree of `root`, children before their parent
    fn post_order(&self, root: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack = vec![(root, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            if let Some(element) = self.elements.get(&id) {
                for child in element.children.iter().rev() {
                    stack.push((*child, false));
                }
            }
        }

        out
    }

    /// Subtree of `root`, parents before their children
    fn pre_order(&self, root: ElementId, out: &mut Vec<ElementId>) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(element) = self.elements.get(&id) {
                out.push(id);
                stack.extend(element.children.iter().rev());
            }
        }
    }

    /// Snapshot of the elements of `group` in depth-first order
    pub fn group_elements(&self, group: GroupId) -> Vec<ElementId> {
        let mut out = Vec::new();
        if let Some(g) = self.groups.get(group.index()) {
            for root in &g.roots {
                self.pre_order(*root, &mut out);
            }
        }
        out
    }

    /// Snapshot of every element of every group in depth-first order
    pub fn walk_order(&self) -> Vec<ElementId> {
        let mut out = Vec::with_capacity(self.elements.len());
        for group in &self.groups {
            for root in &group.roots {
                self.pre_order(*root, &mut out);
            }
        }
        out
    }

    /// Keep `id` alive for `cycles` lifetimes
    pub fn mark_seen(&mut self, id: ElementId, cycles: u32) {
        let base = self.base_lifecycles;
        if let Some(element) = self.elements.get_mut(&id) {
            element.lifecycles = i64::from(cycles) * base;
        }
    }

    /// Age every element by one tick and destroy those out of lifecycles.
    /// Returns the number of elements removed.
    pub fn sweep(&mut self) -> usize {
        let mut removed = 0;

        for id in self.walk_order() {
            // Gone with an ancestor earlier in this sweep
            let Some(element) = self.elements.get_mut(&id) else {
                continue;
            };

            element.lifecycles -= 1;
            if element.lifecycles <= 0 {
                debug!("Element '{}' ({}) expired", element.name(), id);
                removed += self.destroy(id);
            }
        }

        removed
    }

    /// Clear the updated mark of every element
    pub fn reset_update_flags(&mut self) {
        for element in self.elements.values_mut() {
            element.flags.remove(ElementFlags::UPDATED);
        }
    }

    fn siblings(&self, id: ElementId) -> &[ElementId] {
        let Some(element) = self.elements.get(&id) else {
            return &[];
        };
        match element.parent {
            Some(p) => self
                .elements
                .get(&p)
                .map(|parent| parent.children.as_slice())
                .unwrap_or(&[]),
            None => self
                .groups
                .get(element.group.index())
                .map(|g| g.roots.as_slice())
                .unwrap_or(&[]),
        }
    }

    fn sibling_offset(&self, id: ElementId, forward: bool) -> Option<ElementId> {
        let siblings = self.siblings(id);
        let pos = siblings.iter().position(|s| *s == id)?;
        if forward {
            siblings.get(pos + 1).copied()
        } else {
            pos.checked_sub(1).and_then(|p| siblings.get(p).copied())
        }
    }

    fn last_descendant(&self, mut id: ElementId) -> ElementId {
        while let Some(last) = self.elements.get(&id).and_then(|e| e.children.last()) {
            id = *last;
        }
        id
    }

    /// First element after the subtree of `id` within its group
    fn subtree_next(&self, mut id: ElementId) -> Option<ElementId> {
        loop {
            if let Some(next) = self.sibling_offset(id, true) {
                return Some(next);
            }
            id = self.elements.get(&id)?.parent?;
        }
    }

    /// Depth-first successor of `id` within its group
    fn dfs_next(&self, id: ElementId) -> Option<ElementId> {
        match self.elements.get(&id)?.children.first() {
            Some(child) => Some(*child),
            None => self.subtree_next(id),
        }
    }

    /// Depth-first predecessor of `id` within its group
    fn dfs_prev(&self, id: ElementId) -> Option<ElementId> {
        match self.sibling_offset(id, false) {
            Some(prev) => Some(self.last_descendant(prev)),
            None => self.elements.get(&id)?.parent,
        }
    }

    /// Nearest group in `forward` direction (wrapping, `from` itself last)
    /// holding at least one element
    fn adjacent_populated_group(&self, from: GroupId, forward: bool) -> Option<GroupId> {
        let n = self.groups.len();
        (1..=n)
            .map(|step| {
                if forward {
                    (from.index() + step) % n
                } else {
                    (from.index() + n - step % n) % n
                }
            })
            .map(GroupId::new)
            .find(|g| !self.groups[g.index()].is_empty())
    }

    pub fn current_group(&self) -> Option<GroupId> {
        self.current_group
    }

    pub fn select_first_group(&mut self) -> Option<GroupId> {
        self.current_group = self.groups.first().map(|g| g.id());
        self.current_group
    }

    pub fn select_last_group(&mut self) -> Option<GroupId> {
        self.current_group = self.groups.last().map(|g| g.id());
        self.current_group
    }

    /// Next group, wrapping to the first
    pub fn select_next_group(&mut self) -> Option<GroupId> {
        match self.current_group {
            Some(g) if g.index() + 1 < self.groups.len() => {
                self.current_group = Some(GroupId::new(g.index() + 1));
                self.current_group
            }
            _ => self.select_first_group(),
        }
    }

    /// Previous group, wrapping to the last
    pub fn select_prev_group(&mut self) -> Option<GroupId> {
        match self.current_group {
            Some(g) if g.index() > 0 && g.index() < self.groups.len() => {
                self.current_group = Some(GroupId::new(g.index() - 1));
                self.current_group
            }
            _ => self.select_last_group(),
        }
    }

    /// The selected group, selecting the first one if none is
    pub fn select_current_group(&mut self) -> Option<GroupId> {
        if self.current_group.is_none() {
            self.select_first_group();
        }
        self.current_group
    }

    /// First root of the current group
    pub fn select_first(&mut self) -> Option<ElementId> {
        let group = self.select_current_group()?;
        let first = self.groups[group.index()].roots.first().copied();
        self.groups[group.index()].current = first;
        first
    }

    /// Deepest last element of the current group
    pub fn select_last(&mut self) -> Option<ElementId> {
        let group = self.select_current_group()?;
        let last = self.groups[group.index()]
            .roots
            .last()
            .map(|root| self.last_descendant(*root));
        self.groups[group.index()].current = last;
        last
    }

    /// Depth-first next element, continuing in the next populated group
    pub fn select_next(&mut self) -> Option<ElementId> {
        let current = self.current();
        let next = current.and_then(|id| self.dfs_next(id));
        match next {
            Some(id) => {
                self.select(id);
                Some(id)
            }
            None => {
                let from = self.select_current_group()?;
                let group = self.adjacent_populated_group(from, true)?;
                self.current_group = Some(group);
                self.select_first()
            }
        }
    }

    /// Depth-first previous element, continuing in the previous populated
    /// group
    pub fn select_prev(&mut self) -> Option<ElementId> {
        let current = self.current();
        let prev = current.and_then(|id| self.dfs_prev(id));
        match prev {
            Some(id) => {
                self.select(id);
                Some(id)
            }
            None => {
                let from = self.select_current_group()?;
                let group = self.adjacent_populated_group(from, false)?;
                self.current_group = Some(group);
                self.select_last()
            }
        }
    }

    /// Select `id` and make its group current
    pub fn select(&mut self, id: ElementId) {
        if let Some(group) = self.elements.get(&id).map(|e| e.group) {
            self.groups[group.index()].current = Some(id);
            self.current_group = Some(group);
        }
    }

    /// The selected element of the current group.
    ///
    /// If nothing is selected yet the first root matching an allow rule of
    /// the policy is picked, otherwise the first root.
    pub fn current(&mut self) -> Option<ElementId> {
        let group = self.select_current_group()?;
        let index = group.index();

        if let Some(id) = self.groups[index].current {
            return Some(id);
        }

        let roots = &self.groups[index].roots;
        let preferred = roots
            .iter()
            .copied()
            .find(|id| {
                self.elements
                    .get(id)
                    .is_some_and(|e| self.policy.matches_allow_rule(e.name()))
            })
            .or_else(|| roots.first().copied());

        self.groups[index].current = preferred;
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bwmon_types::DEFAULT_GROUP;

    fn graph() -> (ElementGraph, GroupId) {
        let mut graph = ElementGraph::new(Policy::default(), 3);
        let group = graph.lookup_group(DEFAULT_GROUP, true).unwrap();
        (graph, group)
    }

    fn add(graph: &mut ElementGraph, group: GroupId, name: &str, parent: Option<ElementId>) -> ElementId {
        graph
            .lookup_or_create(group, name, 0, parent, true)
            .unwrap()
            .id()
    }

    #[test]
    fn test_lookup_or_create() {
        let (mut graph, group) = graph();

        let created = graph.lookup_or_create(group, "eth0", 0, None, true).unwrap();
        assert!(matches!(created, Lookup::Created(_)));

        let found = graph.lookup_or_create(group, "eth0", 0, None, true).unwrap();
        assert_eq!(found, Lookup::Existing(created.id()));

        // Same name, different ident
        let other = graph.lookup_or_create(group, "eth0", 1, None, false);
        assert!(other.is_none());

        let e = graph.get(created.id()).unwrap();
        assert_eq!(e.level(), 0);
        assert_eq!(e.lifecycles(), 3);
        assert!(e.flags().contains(ElementFlags::CREATED));
        assert_eq!(graph.group(group).unwrap().element_count(), 1);
    }

    #[test]
    fn test_group_requires_header() {
        let (mut graph, _) = graph();
        assert!(graph.lookup_group("nope", true).is_none());
        assert!(graph.lookup_group(DEFAULT_GROUP, false).is_some());
    }

    #[test]
    fn test_policy_and_config_admission() {
        let mut graph = ElementGraph::new(Policy::parse("eth*,!eth1"), 3);
        let group = graph.lookup_group(DEFAULT_GROUP, true).unwrap();

        let mut hidden = ElementConfig::new("eth2");
        hidden.show = Some(false);
        graph.add_config(hidden);
        let mut shown = ElementConfig::new("lo");
        shown.show = Some(true);
        shown.description = Some("loopback".to_string());
        shown.max = 1000;
        graph.add_config(shown);

        assert!(graph.lookup_or_create(group, "eth0", 0, None, true).is_some());
        assert!(graph.lookup_or_create(group, "eth1", 0, None, true).is_none());
        assert!(graph.lookup_or_create(group, "eth2", 0, None, true).is_none());

        let lo = graph.lookup_or_create(group, "lo", 0, None, true).unwrap().id();
        let lo = graph.get(lo).unwrap();
        assert_eq!(lo.info()[0].value, "loopback");
        assert_eq!(lo.rx_max(), 1000);

        graph.set_show_all(true);
        assert!(graph.lookup_or_create(group, "eth1", 0, None, true).is_some());
    }

    #[test]
    fn test_config_without_override_follows_policy() {
        let mut graph = ElementGraph::new(Policy::parse("!eth1"), 3);
        let group = graph.lookup_group(DEFAULT_GROUP, true).unwrap();
        let mut eth1 = ElementConfig::new("eth1");
        eth1.max = 1000;
        graph.add_config(eth1);

        assert!(graph.lookup_or_create(group, "eth1", 0, None, true).is_none());

        let mut graph = ElementGraph::new(Policy::parse("wlan*"), 3);
        let group = graph.lookup_group(DEFAULT_GROUP, true).unwrap();
        let mut eth0 = ElementConfig::new("eth0");
        eth0.rxmax = 500;
        eth0.description = Some("uplink".to_string());
        graph.add_config(eth0);

        assert!(graph.lookup_or_create(group, "eth0", 0, None, true).is_none());
        assert!(graph.lookup_or_create(group, "wlan0", 0, None, true).is_some());
    }

    #[test]
    fn test_nested_levels() {
        let (mut graph, group) = graph();
        let eth0 = add(&mut graph, group, "eth0", None);
        let qdisc = add(&mut graph, group, "qdisc", Some(eth0));
        let class = add(&mut graph, group, "class", Some(qdisc));

        assert_eq!(graph.get(class).unwrap().level(), 2);
        assert_eq!(graph.get(eth0).unwrap().children(), &[qdisc]);
        assert_eq!(graph.group_elements(group), vec![eth0, qdisc, class]);
        assert_eq!(graph.group(group).unwrap().element_count(), 3);
    }

    #[test]
    fn test_destroy_subtree() {
        let (mut graph, group) = graph();
        let eth0 = add(&mut graph, group, "eth0", None);
        let child = add(&mut graph, group, "child", Some(eth0));
        add(&mut graph, group, "grandchild", Some(child));
        let eth1 = add(&mut graph, group, "eth1", None);

        assert_eq!(graph.destroy(eth0), 3);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.group(group).unwrap().roots(), &[eth1]);
        assert_eq!(graph.group(group).unwrap().element_count(), 1);
        assert_eq!(graph.destroy(eth0), 0);
    }

    #[test]
    fn test_destroy_moves_selection() {
        let (mut graph, group) = graph();
        let a = add(&mut graph, group, "a", None);
        let b = add(&mut graph, group, "b", None);
        let c = add(&mut graph, group, "c", None);

        graph.select(b);
        graph.destroy(b);
        assert_eq!(graph.group(group).unwrap().current(), Some(a));

        graph.destroy(a);
        assert_eq!(graph.group(group).unwrap().current(), Some(c));

        graph.destroy(c);
        assert_eq!(graph.group(group).unwrap().current(), None);
    }

    #[test]
    fn test_destroy_selected_child_selects_parent() {
        let (mut graph, group) = graph();
        let a = add(&mut graph, group, "a", None);
        let child = add(&mut graph, group, "child", Some(a));
        let b = add(&mut graph, group, "b", None);

        graph.select(child);
        graph.destroy(a);
        // child falls back to a, a has no predecessor so b follows
        assert_eq!(graph.group(group).unwrap().current(), Some(b));
    }

    #[test]
    fn test_sweep_lifecycles() {
        let (mut graph, group) = graph();
        let kept = add(&mut graph, group, "kept", None);
        let dropped = add(&mut graph, group, "dropped", None);

        for _ in 0..graph.base_lifecycles() - 1 {
            graph.mark_seen(kept, 1);
            assert_eq!(graph.sweep(), 0);
        }

        graph.mark_seen(kept, 1);
        assert_eq!(graph.sweep(), 1);
        assert!(!graph.contains(dropped));

        for _ in 0..10 {
            graph.mark_seen(kept, 1);
            graph.sweep();
        }
        assert!(graph.contains(kept));
    }

    #[test]
    fn test_sweep_removes_children_with_parent() {
        let (mut graph, group) = graph();
        let parent = add(&mut graph, group, "parent", None);
        let child = add(&mut graph, group, "child", Some(parent));

        // Child is kept alive but goes down with its parent
        for _ in 0..3 {
            graph.mark_seen(child, 5);
            graph.sweep();
        }
        assert!(graph.is_empty());
        assert_eq!(graph.group(group).unwrap().element_count(), 0);
    }

    #[test]
    fn test_reset_update_flags() {
        let (mut graph, group) = graph();
        let id = add(&mut graph, group, "eth0", None);
        graph.get_mut(id).unwrap().flags.insert(ElementFlags::UPDATED);

        graph.reset_update_flags();
        assert!(!graph.get(id).unwrap().is_updated());
    }

    #[test]
    fn test_navigation_across_groups() {
        let (mut graph, intf) = graph();
        graph
            .headers_mut()
            .derive("group01", "Group 01", DEFAULT_GROUP)
            .unwrap();
        graph.headers_mut().derive("group02", "Empty", DEFAULT_GROUP).unwrap();
        let other = graph.lookup_group("group01", true).unwrap();
        graph.lookup_group("group02", true).unwrap();

        let a = add(&mut graph, intf, "a", None);
        let a1 = add(&mut graph, intf, "a1", Some(a));
        let b = add(&mut graph, intf, "b", None);
        let c = add(&mut graph, other, "c", None);

        assert_eq!(graph.current(), Some(a));
        assert_eq!(graph.select_next(), Some(a1));
        assert_eq!(graph.select_next(), Some(b));
        assert_eq!(graph.select_next(), Some(c));
        assert_eq!(graph.current_group(), Some(other));
        // The empty group is skipped
        assert_eq!(graph.select_next(), Some(a));

        assert_eq!(graph.select_prev(), Some(c));
        assert_eq!(graph.select_prev(), Some(b));
        assert_eq!(graph.select_prev(), Some(a1));
        assert_eq!(graph.select_last(), Some(b));
        assert_eq!(graph.select_first(), Some(a));
    }

    #[test]
    fn test_current_prefers_allow_rule() {
        let mut graph = ElementGraph::new(Policy::parse("lo,eth*"), 3);
        let group = graph.lookup_group(DEFAULT_GROUP, true).unwrap();
        graph.set_show_all(true);

        add(&mut graph, group, "wlan0", None);
        let eth = add(&mut graph, group, "eth0", None);
        assert_eq!(graph.current(), Some(eth));
    }

    #[test]
    fn test_group_cursor_wraps() {
        let (mut graph, intf) = graph();
        graph.headers_mut().derive("group01", "Group 01", DEFAULT_GROUP).unwrap();
        let other = graph.lookup_group("group01", true).unwrap();

        assert_eq!(graph.select_current_group(), Some(intf));
        assert_eq!(graph.select_next_group(), Some(other));
        assert_eq!(graph.select_next_group(), Some(intf));
        assert_eq!(graph.select_prev_group(), Some(other));
    }
}
