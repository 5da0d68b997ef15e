//! Adjacency index over the flat relationship list.
//!
//! The index is a pure function of the relationships: it is rebuilt from
//! scratch after every mutation and never patched in place. Lists keep
//! relationship insertion order so every traversal over them is
//! deterministic.

use kintree_core::Relationship;
use std::collections::HashMap;

/// Lookup tables for parents, children and spouses of each person id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyIndex {
    children_of: HashMap<String, Vec<String>>,
    parents_of: HashMap<String, Vec<String>>,
    spouses_of: HashMap<String, Vec<String>>,
}

impl AdjacencyIndex {
    /// Builds the index from a relationship list.
    ///
    /// Nothing is validated here. Self-loops and ids that name no person
    /// are indexed as-is; traversal skips them when it fails to find the
    /// person.
    pub fn build(relationships: &[Relationship]) -> Self {
        let mut index = Self::default();

        for rel in relationships {
            match rel {
                Relationship::ParentChild(pc) => {
                    index
                        .children_of
                        .entry(pc.parent_id.clone())
                        .or_default()
                        .push(pc.child_id.clone());
                    index
                        .parents_of
                        .entry(pc.child_id.clone())
                        .or_default()
                        .push(pc.parent_id.clone());
                }
                Relationship::Spouse(s) => {
                    let [a, b] = &s.people;
                    index
                        .spouses_of
                        .entry(a.clone())
                        .or_default()
                        .push(b.clone());
                    index
                        .spouses_of
                        .entry(b.clone())
                        .or_default()
                        .push(a.clone());
                }
            }
        }

        index
    }

    pub fn children_of(&self, id: &str) -> &[String] {
        self.children_of.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parents_of(&self, id: &str) -> &[String] {
        self.parents_of.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn spouses_of(&self, id: &str) -> &[String] {
        self.spouses_of.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The raw child → parents table, as consumed by the cycle guard.
    pub fn parents_table(&self) -> &HashMap<String, Vec<String>> {
        &self.parents_of
    }

    /// Number of parent-child edges indexed.
    pub fn parent_child_count(&self) -> usize {
        self.children_of.values().map(Vec::len).sum()
    }
}
