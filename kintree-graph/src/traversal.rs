//! Rooted expansion of the family graph.
//!
//! Starting from one person, the graph is unfolded into a tree:
//! descendants downward, ancestors upward, and siblings and spouses
//! sideways. Cousins, aunts and uncles are reached by re-entering the
//! downward walk from each sibling found on the way up.
//!
//! Each direction keeps its own visited set, so every id is expanded at
//! most once per direction and the walk terminates even on cyclic data.

use crate::adjacency::AdjacencyIndex;
use kintree_core::Person;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// A lightweight reference to a person, used for spouse links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: String,
    pub name: String,
}

impl From<&Person> for PersonRef {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id.clone(),
            name: person.name.clone(),
        }
    }
}

/// One node of a rooted expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionNode {
    pub id: String,
    pub name: String,
    /// Generation relative to the root: negative for ancestors.
    pub level: i32,
    /// True when this node's descendants were left out because it is collapsed.
    pub collapsed: bool,
    pub children: Vec<ExpansionNode>,
    pub parents: Vec<ExpansionNode>,
    pub siblings: Vec<ExpansionNode>,
    pub spouses: Vec<PersonRef>,
}

impl ExpansionNode {
    fn leaf(person: &Person, level: i32, collapsed: bool) -> Self {
        Self {
            id: person.id.clone(),
            name: person.name.clone(),
            level,
            collapsed,
            children: Vec::new(),
            parents: Vec::new(),
            siblings: Vec::new(),
            spouses: Vec::new(),
        }
    }

    /// Number of expansion nodes in this subtree, including this one.
    /// Spouse refs are not counted.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .chain(&self.parents)
            .chain(&self.siblings)
            .map(ExpansionNode::node_count)
            .sum::<usize>()
    }

    /// Finds the first node with the given id, depth first.
    pub fn find(&self, id: &str) -> Option<&ExpansionNode> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter()
            .chain(&self.parents)
            .chain(&self.siblings)
            .find_map(|node| node.find(id))
    }
}

/// Ids whose descendants are hidden from the expansion.
///
/// Empty on load and cleared on reload; only changed by an explicit toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollapsedSet {
    ids: BTreeSet<String>,
}

impl CollapsedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the collapsed state of `id` and returns the new state.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drops every id for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.ids.retain(|id| keep(id.as_str()));
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CollapsedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Builds the rooted expansion for `root_id`.
///
/// Returns `None` when the root names no person. Any other missing id
/// only drops the branch that leads to it.
pub fn build_rooted_view(
    root_id: &str,
    people: &[Person],
    adjacency: &AdjacencyIndex,
    collapsed: &CollapsedSet,
) -> Option<ExpansionNode> {
    let traversal = Traversal::new(people, adjacency, collapsed);
    let view = traversal.expand_root(root_id);
    if let Some(root) = &view {
        debug!(
            "Expanded {} nodes around root {}",
            root.node_count(),
            root.id
        );
    } else {
        warn!("Root person {} not found, nothing to expand", root_id);
    }
    view
}

/// Shared state for one expansion run.
struct Traversal<'a> {
    people: HashMap<&'a str, &'a Person>,
    adjacency: &'a AdjacencyIndex,
    collapsed: &'a CollapsedSet,
}

impl<'a> Traversal<'a> {
    fn new(
        people: &'a [Person],
        adjacency: &'a AdjacencyIndex,
        collapsed: &'a CollapsedSet,
    ) -> Self {
        let mut lookup = HashMap::with_capacity(people.len());
        for person in people {
            // first record wins on duplicate ids
            lookup.entry(person.id.as_str()).or_insert(person);
        }
        Self {
            people: lookup,
            adjacency,
            collapsed,
        }
    }

    fn person(&self, id: &str) -> Option<&'a Person> {
        self.people.get(id).copied()
    }

    fn expand_root(&self, root_id: &str) -> Option<ExpansionNode> {
        let root = self.person(root_id)?;
        let id = root.id.as_str();
        let is_collapsed = self.collapsed.contains(id);
        let mut node = ExpansionNode::leaf(root, 0, is_collapsed);

        let mut visited_down: HashSet<&'a str> = HashSet::new();
        visited_down.insert(id);
        if !is_collapsed {
            for child in self.adjacency.children_of(id) {
                if let Some(child_node) = self.expand_descendants(child, &mut visited_down, 1) {
                    node.children.push(child_node);
                }
            }
        }

        let mut visited_up: HashSet<&'a str> = HashSet::new();
        visited_up.insert(id);
        for parent in self.adjacency.parents_of(id) {
            if let Some(parent_node) = self.expand_ancestors(parent, &mut visited_up, -1, id) {
                node.parents.push(parent_node);
            }
        }

        for sibling in self.sibling_ids(id, id, &visited_down) {
            if let Some(sibling_node) = self.expand_descendants(sibling, &mut visited_down, 0) {
                node.siblings.push(sibling_node);
            }
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for spouse in self.adjacency.spouses_of(id) {
            if !seen.insert(spouse.as_str()) {
                continue;
            }
            if let Some(person) = self.person(spouse) {
                node.spouses.push(PersonRef::from(person));
            }
        }

        Some(node)
    }

    /// Walks `id` and everything below it.
    fn expand_descendants(
        &self,
        id: &'a str,
        visited: &mut HashSet<&'a str>,
        level: i32,
    ) -> Option<ExpansionNode> {
        if !visited.insert(id) {
            return None;
        }
        let Some(person) = self.person(id) else {
            debug!("Skipping missing person {} below level {}", id, level - 1);
            return None;
        };

        let is_collapsed = self.collapsed.contains(id);
        let mut node = ExpansionNode::leaf(person, level, is_collapsed);

        if !is_collapsed {
            for child in self.adjacency.children_of(id) {
                if let Some(child_node) = self.expand_descendants(child, visited, level + 1) {
                    node.children.push(child_node);
                }
            }
        }

        node.spouses = self.spouse_refs(id, visited);
        Some(node)
    }

    /// Walks `id`, its ancestors, and the siblings met on the way up.
    fn expand_ancestors(
        &self,
        id: &'a str,
        visited: &mut HashSet<&'a str>,
        level: i32,
        exclude_child: &str,
    ) -> Option<ExpansionNode> {
        if !visited.insert(id) {
            return None;
        }
        let Some(person) = self.person(id) else {
            debug!("Skipping missing ancestor {} at level {}", id, level);
            return None;
        };

        let mut node = ExpansionNode::leaf(person, level, self.collapsed.contains(id));

        for parent in self.adjacency.parents_of(id) {
            if let Some(parent_node) = self.expand_ancestors(parent, visited, level - 1, id) {
                node.parents.push(parent_node);
            }
        }

        for sibling in self.sibling_ids(id, exclude_child, visited) {
            if let Some(sibling_node) = self.expand_descendants(sibling, visited, level) {
                node.siblings.push(sibling_node);
            }
        }

        node.spouses = self.spouse_refs(id, visited);
        Some(node)
    }

    /// Other children of `id`'s parents, in insertion order, without
    /// duplicates. A child with any collapsed parent is left out, since it
    /// belongs to that parent's hidden subtree.
    fn sibling_ids(
        &self,
        id: &str,
        exclude_child: &str,
        visited: &HashSet<&'a str>,
    ) -> Vec<&'a str> {
        let mut siblings: Vec<&'a str> = Vec::new();
        for parent in self.adjacency.parents_of(id) {
            for child in self.adjacency.children_of(parent) {
                let child = child.as_str();
                if child == id
                    || child == exclude_child
                    || visited.contains(child)
                    || siblings.contains(&child)
                    || self.has_collapsed_parent(child)
                {
                    continue;
                }
                siblings.push(child);
            }
        }
        siblings
    }

    fn has_collapsed_parent(&self, id: &str) -> bool {
        self.adjacency
            .parents_of(id)
            .iter()
            .any(|parent| self.collapsed.contains(parent))
    }

    fn spouse_refs(&self, id: &str, visited: &HashSet<&'a str>) -> Vec<PersonRef> {
        let mut refs: Vec<PersonRef> = Vec::new();
        for spouse in self.adjacency.spouses_of(id) {
            if visited.contains(spouse.as_str()) || refs.iter().any(|r| &r.id == spouse) {
                continue;
            }
            if let Some(person) = self.person(spouse) {
                refs.push(PersonRef::from(person));
            }
        }
        refs
    }
}
