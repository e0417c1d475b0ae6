//! Immutable machine definitions and the pure transition algorithms.
//!
//! Everything here is a function of the definition, a configuration, a
//! context and an event. The interpreter in [`crate::actor`] drives these
//! functions and owns all side effects.

use super::configuration::{Configuration, StateValue};
use super::event::Event;
use super::guard::GuardError;
use super::node::{StateId, StateKind, StateNode, Transition};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub(crate) const ROOT: StateId = StateId(0);

/// Immutable description of a state tree.
///
/// Built with [`MachineBuilder`](crate::builder::MachineBuilder). Nodes live
/// in an arena indexed by [`StateId`]; the root is always the first node.
pub struct Machine<C, E: Event> {
    pub(crate) id: String,
    pub(crate) nodes: Vec<StateNode<C, E>>,
}

/// A transition chosen for the current event, with the node declaring it.
pub(crate) struct Selected<'m, C, E: Event> {
    pub(crate) source: StateId,
    pub(crate) transition: &'m Transition<C, E>,
}

/// Outcome of looking up transitions for an event.
pub(crate) enum Selection<'m, C, E: Event> {
    /// No active node declares a transition for the event kind.
    Unhandled,
    /// Some node declares transitions for the kind but none was enabled.
    Blocked,
    /// Enabled, conflict-free transitions in document order.
    Enabled(Vec<Selected<'m, C, E>>),
}

impl<C, E: Event> Machine<C, E> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &StateNode<C, E> {
        &self.nodes[ROOT.0]
    }

    pub fn get(&self, id: StateId) -> Option<&StateNode<C, E>> {
        self.nodes.get(id.0)
    }

    pub(crate) fn node(&self, id: StateId) -> &StateNode<C, E> {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &StateNode<C, E>> {
        self.nodes.iter()
    }

    /// Look up a node by dotted path relative to the root.
    ///
    /// The empty path resolves the root.
    pub fn resolve(&self, path: &str) -> Option<&StateNode<C, E>> {
        if path.is_empty() {
            return Some(self.root());
        }
        let mut current = self.root();
        for segment in path.split('.') {
            let next = current
                .children
                .iter()
                .map(|&child| self.node(child))
                .find(|child| child.name == segment)?;
            current = next;
        }
        Some(current)
    }

    /// Proper ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: StateId) -> impl Iterator<Item = StateId> + '_ {
        std::iter::successors(self.node(id).parent, move |&current| {
            self.node(current).parent
        })
    }

    /// Whether `id` is a proper descendant of `ancestor`.
    pub fn is_descendant(&self, id: StateId, ancestor: StateId) -> bool {
        self.ancestors(id).any(|candidate| candidate == ancestor)
    }

    fn is_descendant_or_self(&self, id: StateId, ancestor: StateId) -> bool {
        id == ancestor || self.is_descendant(id, ancestor)
    }

    /// Configuration reached at start: every compound descends into its
    /// initial child (chosen against `context`), every parallel node into all
    /// of its children.
    pub fn initial_configuration(&self, context: &C) -> Configuration {
        let mut states = BTreeSet::new();
        self.add_descendants(ROOT, context, &mut states);
        states.into_iter().collect()
    }

    /// Active leaf states (atomic or final) in document order.
    pub fn leaves(&self, configuration: &Configuration) -> Vec<StateId> {
        configuration
            .iter()
            .filter(|&id| self.node(id).kind.is_leaf())
            .collect()
    }

    /// Whether the node at `path` is active.
    pub fn matches(&self, configuration: &Configuration, path: &str) -> bool {
        self.resolve(path)
            .is_some_and(|node| configuration.contains(node.id))
    }

    /// Whether a top-level final state is active.
    pub fn is_done(&self, configuration: &Configuration) -> bool {
        configuration.iter().any(|id| {
            let node = self.node(id);
            node.kind == StateKind::Final && node.parent == Some(ROOT)
        })
    }

    /// Dotted paths of the active leaves.
    pub fn leaf_paths(&self, configuration: &Configuration) -> Vec<&str> {
        self.leaves(configuration)
            .into_iter()
            .map(|id| self.node(id).path.as_str())
            .collect()
    }

    /// Nested view of the configuration, rooted below the root node.
    pub fn state_value(&self, configuration: &Configuration) -> StateValue {
        self.value_of(ROOT, configuration)
    }

    fn value_of(&self, id: StateId, configuration: &Configuration) -> StateValue {
        let node = self.node(id);
        match node.kind {
            StateKind::Compound => {
                let active = node
                    .children
                    .iter()
                    .copied()
                    .find(|&child| configuration.contains(child));
                match active {
                    Some(child) if self.node(child).kind.is_leaf() => {
                        StateValue::leaf(self.node(child).name.clone())
                    }
                    Some(child) => StateValue::nested(
                        self.node(child).name.clone(),
                        self.value_of(child, configuration),
                    ),
                    None => StateValue::Node(BTreeMap::new()),
                }
            }
            StateKind::Parallel => StateValue::Node(
                node.children
                    .iter()
                    .map(|&child| {
                        (
                            self.node(child).name.clone(),
                            self.value_of(child, configuration),
                        )
                    })
                    .collect(),
            ),
            StateKind::Atomic | StateKind::Final => StateValue::Node(BTreeMap::new()),
        }
    }

    /// Find the transitions an event enables.
    ///
    /// Every active leaf is searched innermost first. A node that declares no
    /// transition for the event kind passes the search to its parent; a node
    /// that declares some consumes the event even when every guard is false.
    /// The first enabled transition of a node wins. Guard failures count as
    /// `false` and are reported through `on_guard_error`.
    pub(crate) fn select<'m>(
        &'m self,
        configuration: &Configuration,
        context: &C,
        event: &E,
        on_guard_error: &mut dyn FnMut(StateId, &GuardError),
    ) -> Selection<'m, C, E> {
        let kind = event.kind();
        let mut handled = false;
        let mut selected: Vec<Selected<'m, C, E>> = Vec::new();

        for leaf in self.leaves(configuration) {
            let mut cursor = Some(leaf);
            while let Some(id) = cursor {
                let node = self.node(id);
                let Some(candidates) = node.transitions.get(&kind) else {
                    cursor = node.parent;
                    continue;
                };
                handled = true;
                let enabled = candidates.iter().find(|transition| {
                    transition
                        .enabled(context, event)
                        .unwrap_or_else(|error| {
                            on_guard_error(id, &error);
                            false
                        })
                });
                if let Some(transition) = enabled {
                    let duplicate = selected
                        .iter()
                        .any(|existing| std::ptr::eq(existing.transition, transition));
                    if !duplicate {
                        selected.push(Selected {
                            source: id,
                            transition,
                        });
                    }
                }
                break;
            }
        }

        if !handled {
            return Selection::Unhandled;
        }
        if selected.is_empty() {
            return Selection::Blocked;
        }
        Selection::Enabled(self.remove_conflicts(configuration, selected))
    }

    /// Keep transitions whose exit sets do not overlap an earlier one's.
    fn remove_conflicts<'m>(
        &self,
        configuration: &Configuration,
        selected: Vec<Selected<'m, C, E>>,
    ) -> Vec<Selected<'m, C, E>> {
        let mut claimed = BTreeSet::new();
        let mut kept = Vec::with_capacity(selected.len());
        for candidate in selected {
            let exits = self.exits_of(configuration, &candidate);
            if exits.is_disjoint(&claimed) {
                claimed.extend(exits);
                kept.push(candidate);
            }
        }
        kept
    }

    /// Node whose descendants a transition exits and re-enters.
    ///
    /// `None` for targetless transitions. An internal transition whose
    /// targets all lie inside its compound source stays inside the source;
    /// otherwise the domain is the nearest compound ancestor containing the
    /// source and every target.
    pub(crate) fn domain(&self, source: StateId, transition: &Transition<C, E>) -> Option<StateId> {
        if transition.targets.is_empty() {
            return None;
        }
        let source_node = self.node(source);
        if transition.internal
            && source_node.kind == StateKind::Compound
            && transition
                .targets
                .iter()
                .all(|&target| self.is_descendant(target, source))
        {
            return Some(source);
        }
        let domain = self
            .ancestors(source)
            .find(|&candidate| {
                (self.node(candidate).kind == StateKind::Compound || candidate == ROOT)
                    && transition
                        .targets
                        .iter()
                        .all(|&target| self.is_descendant(target, candidate))
            })
            .unwrap_or(ROOT);
        Some(domain)
    }

    fn exits_of(&self, configuration: &Configuration, selected: &Selected<'_, C, E>) -> BTreeSet<StateId> {
        match self.domain(selected.source, selected.transition) {
            Some(domain) => configuration
                .iter()
                .filter(|&id| self.is_descendant(id, domain))
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// States exited by the selected transitions, deepest first.
    pub(crate) fn exit_set(
        &self,
        configuration: &Configuration,
        selected: &[Selected<'_, C, E>],
    ) -> Vec<StateId> {
        let mut exits = BTreeSet::new();
        for candidate in selected {
            exits.extend(self.exits_of(configuration, candidate));
        }
        exits.into_iter().rev().collect()
    }

    /// States entered by the selected transitions, parents first.
    pub(crate) fn entry_set(&self, selected: &[Selected<'_, C, E>], context: &C) -> Vec<StateId> {
        let mut entries = BTreeSet::new();
        for candidate in selected {
            for &target in &candidate.transition.targets {
                self.add_descendants(target, context, &mut entries);
            }
        }
        for candidate in selected {
            let Some(domain) = self.domain(candidate.source, candidate.transition) else {
                continue;
            };
            for &target in &candidate.transition.targets {
                self.add_ancestors(target, domain, context, &mut entries);
            }
        }
        entries.into_iter().collect()
    }

    fn add_descendants(&self, id: StateId, context: &C, entries: &mut BTreeSet<StateId>) {
        entries.insert(id);
        let node = self.node(id);
        match node.kind {
            StateKind::Compound => {
                let already_targeted = entries
                    .iter()
                    .any(|&entered| self.is_descendant(entered, id));
                if !already_targeted {
                    if let Some(initial) = node.initial_for(context) {
                        self.add_descendants(initial, context, entries);
                    }
                }
            }
            StateKind::Parallel => {
                for &child in &node.children {
                    self.enter_region(child, context, entries);
                }
            }
            StateKind::Atomic | StateKind::Final => {}
        }
    }

    fn add_ancestors(
        &self,
        id: StateId,
        domain: StateId,
        context: &C,
        entries: &mut BTreeSet<StateId>,
    ) {
        let ancestors: Vec<StateId> = self
            .ancestors(id)
            .take_while(|&ancestor| ancestor != domain)
            .collect();
        for ancestor in ancestors {
            entries.insert(ancestor);
            let node = self.node(ancestor);
            if node.kind == StateKind::Parallel {
                for &child in &node.children {
                    self.enter_region(child, context, entries);
                }
            }
        }
    }

    fn enter_region(&self, region: StateId, context: &C, entries: &mut BTreeSet<StateId>) {
        let covered = entries
            .iter()
            .any(|&entered| self.is_descendant_or_self(entered, region));
        if !covered {
            self.add_descendants(region, context, entries);
        }
    }
}

impl<C, E: Event> fmt::Debug for Machine<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("id", &self.id)
            .field("nodes", &self.nodes)
            .finish()
    }
}
