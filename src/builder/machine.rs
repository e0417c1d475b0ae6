//! Builder for machine definitions.
//!
//! Building lowers the nested [`StateBuilder`] tree into the machine's
//! arena, resolves transition targets and validates the result. Validation
//! collects every problem with stillwater's `Validation` so a broken
//! definition is reported in one pass.

use crate::builder::error::{BuildError, DefinitionError};
use crate::builder::state::StateBuilder;
use crate::builder::transition::TransitionBuilder;
use crate::core::node::InitialChoice;
use crate::core::{Event, Machine, StateId, StateKind, StateNode, Transition};
use std::collections::{HashMap, HashSet};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<DefinitionError>>;

/// Builder for constructing machines with a fluent API.
///
/// # Example
///
/// ```rust
/// use choreo::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
/// use choreo::event_enum;
///
/// event_enum! {
///     pub enum LightEvent {
///         Next,
///     }
///     kind: LightEventKind
/// }
///
/// let machine = MachineBuilder::<(), LightEvent>::new("light")
///     .initial("red")
///     .state(StateBuilder::new("red").on(TransitionBuilder::on(LightEventKind::Next).target("green")))
///     .state(StateBuilder::new("green").on(TransitionBuilder::on(LightEventKind::Next).target("red")))
///     .build()
///     .unwrap();
///
/// assert!(machine.resolve("green").is_some());
/// ```
pub struct MachineBuilder<C, E: Event> {
    root: StateBuilder<C, E>,
}

impl<C: 'static, E: Event> MachineBuilder<C, E> {
    /// Create a builder; `id` names the machine and its root node.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            root: StateBuilder::new(id),
        }
    }

    /// Initial top-level state. Without one, the first state is used.
    pub fn initial(mut self, child: impl Into<String>) -> Self {
        self.root = self.root.initial(child);
        self
    }

    /// Conditional initial top-level state.
    pub fn initial_if<F>(mut self, predicate: F, child: impl Into<String>) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.root = self.root.initial_if(predicate, child);
        self
    }

    /// Make the top-level states parallel regions.
    pub fn parallel(mut self) -> Self {
        self.root = self.root.parallel();
        self
    }

    /// Add a top-level state.
    pub fn state(mut self, state: StateBuilder<C, E>) -> Self {
        self.root = self.root.state(state);
        self
    }

    /// Add a transition declared on the root; it applies in every state
    /// that does not handle the event itself.
    pub fn on(mut self, transition: TransitionBuilder<C, E>) -> Self {
        self.root = self.root.on(transition);
        self
    }

    /// Build the machine.
    /// Returns every definition problem at once if the tree is invalid.
    pub fn build(self) -> Result<Machine<C, E>, BuildError> {
        let machine_id = self.root.name.clone();
        let mut checks: Vec<Check> = Vec::new();

        if self.root.children.is_empty() {
            checks.push(Validation::fail(DefinitionError::Empty));
        }

        let mut nodes = Vec::new();
        lower(self.root, None, "", &mut nodes, &mut checks, true);
        resolve_targets(&mut nodes, &mut checks);

        match Validation::all_vec(checks).map(|_| ()) {
            Validation::Success(()) => Ok(Machine {
                id: machine_id,
                nodes,
            }),
            Validation::Failure(errors) => Err(BuildError::Invalid {
                machine: machine_id,
                errors: errors.iter().cloned().collect(),
            }),
        }
    }
}

fn fail(error: DefinitionError) -> Check {
    Validation::fail(error)
}

fn lower<C: 'static, E: Event>(
    builder: StateBuilder<C, E>,
    parent: Option<StateId>,
    parent_path: &str,
    nodes: &mut Vec<StateNode<C, E>>,
    checks: &mut Vec<Check>,
    is_root: bool,
) -> StateId {
    let StateBuilder {
        name,
        parallel,
        terminal,
        initial,
        initial_choices,
        children,
        transitions,
        entry,
        exit,
        invoke,
        delays,
    } = builder;

    let path = match (is_root, parent_path.is_empty()) {
        (true, _) => String::new(),
        (false, true) => name.clone(),
        (false, false) => format!("{parent_path}.{name}"),
    };

    if !is_root && (name.is_empty() || name.contains('.')) {
        checks.push(fail(DefinitionError::InvalidName { name: name.clone() }));
    }

    let kind = if terminal {
        if !children.is_empty() {
            checks.push(fail(DefinitionError::FinalWithChildren { path: path.clone() }));
        }
        StateKind::Final
    } else if parallel {
        if children.is_empty() {
            checks.push(fail(DefinitionError::EmptyParallel { path: path.clone() }));
        }
        if initial.is_some() || !initial_choices.is_empty() {
            checks.push(fail(DefinitionError::InitialOnParallel { path: path.clone() }));
        }
        StateKind::Parallel
    } else if children.is_empty() {
        StateKind::Atomic
    } else {
        StateKind::Compound
    };

    let mut table: HashMap<E::Kind, Vec<Transition<C, E>>> = HashMap::new();
    for transition in transitions {
        let kind = transition.kind;
        table.entry(kind).or_default().push(transition.build());
    }

    let id = StateId(nodes.len());
    nodes.push(StateNode {
        id,
        name,
        path: path.clone(),
        parent,
        kind,
        children: Vec::new(),
        initial: None,
        initial_choices: Vec::new(),
        transitions: table,
        entry,
        exit,
        invoke,
        delays,
    });

    let mut seen = HashSet::new();
    let mut child_ids = Vec::with_capacity(children.len());
    for child in children {
        if !seen.insert(child.name.clone()) {
            checks.push(fail(DefinitionError::DuplicateChild {
                path: path.clone(),
                name: child.name.clone(),
            }));
        }
        child_ids.push(lower(child, Some(id), &path, nodes, checks, false));
    }

    let find_child = |nodes: &[StateNode<C, E>], wanted: &str| {
        child_ids
            .iter()
            .copied()
            .find(|&child| nodes[child.0].name == wanted)
    };

    let mut initial_id = None;
    if kind == StateKind::Compound {
        initial_id = match &initial {
            Some(wanted) => {
                let found = find_child(nodes, wanted);
                if found.is_none() {
                    checks.push(fail(DefinitionError::UnknownInitial {
                        path: path.clone(),
                        initial: wanted.clone(),
                    }));
                }
                found
            }
            None => child_ids.first().copied(),
        };
    }

    let mut choices = Vec::with_capacity(initial_choices.len());
    for (when, child) in initial_choices {
        let target = find_child(nodes, &child);
        if target.is_none() && kind == StateKind::Compound {
            checks.push(fail(DefinitionError::UnknownInitial {
                path: path.clone(),
                initial: child.clone(),
            }));
        }
        choices.push(InitialChoice {
            when,
            child,
            target,
        });
    }

    let node = &mut nodes[id.0];
    node.children = child_ids;
    node.initial = initial_id;
    node.initial_choices = choices;
    id
}

/// Resolve `path` below `scope`, one child name per segment.
fn resolve_below<C, E: Event>(nodes: &[StateNode<C, E>], scope: StateId, path: &str) -> Option<StateId> {
    let mut current = scope;
    for segment in path.split('.') {
        current = nodes[current.0]
            .children
            .iter()
            .copied()
            .find(|&child| nodes[child.0].name == segment)?;
    }
    Some(current)
}

/// Resolve a transition target as seen from `source`.
fn resolve_target<C, E: Event>(nodes: &[StateNode<C, E>], source: StateId, path: &str) -> Option<StateId> {
    if let Some(below) = path.strip_prefix('.') {
        return resolve_below(nodes, source, below);
    }
    let mut scope = nodes[source.0].parent.or(Some(source));
    while let Some(current) = scope {
        if let Some(found) = resolve_below(nodes, current, path) {
            return Some(found);
        }
        scope = nodes[current.0].parent;
    }
    None
}

fn resolve_targets<C, E: Event>(nodes: &mut [StateNode<C, E>], checks: &mut Vec<Check>) {
    let mut resolved: Vec<(usize, E::Kind, usize, Vec<StateId>)> = Vec::new();

    let view: &[StateNode<C, E>] = nodes;
    for node in view {
        for (kind, transitions) in &node.transitions {
            for (position, transition) in transitions.iter().enumerate() {
                let mut targets = Vec::with_capacity(transition.target_paths.len());
                for target in &transition.target_paths {
                    match resolve_target(view, node.id, target) {
                        Some(found) => targets.push(found),
                        None => checks.push(fail(DefinitionError::UnknownTarget {
                            path: node.path.clone(),
                            event: format!("{kind:?}"),
                            target: target.clone(),
                        })),
                    }
                }
                if !in_distinct_regions(view, &targets) {
                    checks.push(fail(DefinitionError::ConflictingTargets {
                        path: node.path.clone(),
                        event: format!("{kind:?}"),
                    }));
                }
                resolved.push((node.id.0, *kind, position, targets));
            }
        }
    }

    for (index, kind, position, targets) in resolved {
        if let Some(transition) = nodes[index]
            .transitions
            .get_mut(&kind)
            .and_then(|list| list.get_mut(position))
        {
            transition.targets = targets;
        }
    }
}

/// Whether every pair of targets sits in a different region of a common
/// parallel ancestor.
fn in_distinct_regions<C, E: Event>(nodes: &[StateNode<C, E>], targets: &[StateId]) -> bool {
    targets.iter().enumerate().all(|(index, &first)| {
        targets[index + 1..]
            .iter()
            .all(|&second| common_parallel(nodes, first, second))
    })
}

fn common_parallel<C, E: Event>(nodes: &[StateNode<C, E>], first: StateId, second: StateId) -> bool {
    let mut lineage = Vec::new();
    let mut current = Some(first);
    while let Some(id) = current {
        lineage.push(id);
        current = nodes[id.0].parent;
    }

    let mut current = Some(second);
    while let Some(id) = current {
        if lineage.contains(&id) {
            return id != first && id != second && nodes[id.0].kind == StateKind::Parallel;
        }
        current = nodes[id.0].parent;
    }
    false
}
