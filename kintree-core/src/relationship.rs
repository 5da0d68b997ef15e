//! Relationship records.
//!
//! There are only two kinds of edge in a family document. Parent-child
//! edges are directed; spouse edges are an unordered pair. Each edge has
//! a semantic identity ([`RelationshipKey`]) and a document holds at most
//! one record per identity.

use serde::{Deserialize, Serialize};

/// A stored relationship between two people.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Relationship {
    #[serde(rename = "parentChild")]
    ParentChild(ParentChild),

    #[serde(rename = "spouse")]
    Spouse(Spouse),
}

/// Directed edge: `parent_id` is a parent of `child_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentChild {
    pub parent_id: String,
    pub child_id: String,
    #[serde(default = "default_biological")]
    pub biological: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Undirected edge between two partners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spouse {
    pub people: [String; 2],
    #[serde(default)]
    pub start_year: Option<i32>,
    #[serde(default)]
    pub end_year: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_biological() -> bool {
    true
}

/// The kind of a relationship, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipKind {
    ParentChild,
    Spouse,
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParentChild => write!(f, "parentChild"),
            Self::Spouse => write!(f, "spouse"),
        }
    }
}

/// The semantic identity of a relationship.
///
/// Spouse keys are normalized so that `(a, b)` and `(b, a)` compare equal;
/// always build them through [`RelationshipKey::spouse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RelationshipKey {
    #[serde(rename_all = "camelCase")]
    ParentChild { parent_id: String, child_id: String },
    Spouse { people: [String; 2] },
}

impl RelationshipKey {
    pub fn parent_child(parent_id: impl Into<String>, child_id: impl Into<String>) -> Self {
        Self::ParentChild {
            parent_id: parent_id.into(),
            child_id: child_id.into(),
        }
    }

    pub fn spouse(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        let people = if a <= b { [a, b] } else { [b, a] };
        Self::Spouse { people }
    }

    /// Normalizes a key that may have been deserialized with an unsorted pair.
    pub fn normalized(self) -> Self {
        match self {
            Self::Spouse { people: [a, b] } => Self::spouse(a, b),
            key => key,
        }
    }
}

impl std::fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParentChild {
                parent_id,
                child_id,
            } => write!(f, "{} -> {}", parent_id, child_id),
            Self::Spouse { people } => write!(f, "{} <-> {}", people[0], people[1]),
        }
    }
}

impl Relationship {
    /// Creates a biological parent-child edge with no notes.
    pub fn parent_child(parent_id: impl Into<String>, child_id: impl Into<String>) -> Self {
        Self::ParentChild(ParentChild {
            parent_id: parent_id.into(),
            child_id: child_id.into(),
            biological: true,
            notes: None,
        })
    }

    /// Creates a spouse edge with no years or notes.
    pub fn spouse(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self::Spouse(Spouse {
            people: [a.into(), b.into()],
            start_year: None,
            end_year: None,
            notes: None,
        })
    }

    pub fn kind(&self) -> RelationshipKind {
        match self {
            Self::ParentChild(_) => RelationshipKind::ParentChild,
            Self::Spouse(_) => RelationshipKind::Spouse,
        }
    }

    pub fn key(&self) -> RelationshipKey {
        match self {
            Self::ParentChild(pc) => RelationshipKey::parent_child(&pc.parent_id, &pc.child_id),
            Self::Spouse(s) => RelationshipKey::spouse(&s.people[0], &s.people[1]),
        }
    }

    /// Both endpoint ids, in stored order.
    pub fn endpoints(&self) -> (&str, &str) {
        match self {
            Self::ParentChild(pc) => (&pc.parent_id, &pc.child_id),
            Self::Spouse(s) => (&s.people[0], &s.people[1]),
        }
    }

    /// Returns true if `id` is either endpoint of this relationship.
    pub fn involves(&self, id: &str) -> bool {
        let (a, b) = self.endpoints();
        a == id || b == id
    }

    pub fn notes(&self) -> Option<&str> {
        match self {
            Self::ParentChild(pc) => pc.notes.as_deref(),
            Self::Spouse(s) => s.notes.as_deref(),
        }
    }
}
