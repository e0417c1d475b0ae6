//! The set of simultaneously active state nodes.

use super::node::StateId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Active state set of an actor, ancestors included.
///
/// Iteration is in document order (parents before children).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    active: BTreeSet<StateId>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.active.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = StateId> + '_ {
        self.active.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub(crate) fn insert(&mut self, id: StateId) {
        self.active.insert(id);
    }

    pub(crate) fn remove(&mut self, id: StateId) {
        self.active.remove(&id);
    }
}

impl FromIterator<StateId> for Configuration {
    fn from_iter<I: IntoIterator<Item = StateId>>(iter: I) -> Self {
        Self {
            active: iter.into_iter().collect(),
        }
    }
}

/// Nested, serializable view of a configuration.
///
/// A compound state whose active child is a leaf renders as that child's
/// name; deeper or parallel states render as maps.
///
/// ```rust
/// use choreo::core::StateValue;
///
/// let value = StateValue::nested("liked", StateValue::nested("yes", StateValue::leaf("idle")));
/// assert_eq!(
///     serde_json::to_string(&value).unwrap(),
///     r#"{"liked":{"yes":"idle"}}"#
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Leaf(String),
    Node(BTreeMap<String, StateValue>),
}

impl StateValue {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self::Leaf(name.into())
    }

    pub fn nested(name: impl Into<String>, value: StateValue) -> Self {
        let mut map = BTreeMap::new();
        map.insert(name.into(), value);
        Self::Node(map)
    }
}
