//! Kintree Core - The family document model
//!
//! This crate owns the canonical data of a family tree: people, the
//! relationships between them, and the document metadata that travels
//! with them on disk. Everything else in Kintree (adjacency, traversal,
//! layout) is derived from these types and recomputed on demand.
//!
//! # Document format
//!
//! A document is a single JSON object with `people`, `relationships`
//! and `meta` keys. Relationships are tagged by `type`:
//!
//! ```json
//! { "type": "parentChild", "parentId": "ramesh", "childId": "kartik", "biological": true }
//! { "type": "spouse", "people": ["ramesh", "aneeta"], "startYear": 1990 }
//! ```
//!
//! # Example
//!
//! ```
//! use kintree_core::{FamilyDocument, Person, Relationship};
//!
//! let mut doc = FamilyDocument::new("Hakim family");
//! doc.people.push(Person::new("ramesh", "Ramesh Hakim"));
//! doc.people.push(Person::new("kartik", "Kartik Hakim"));
//! doc.relationships.push(Relationship::parent_child("ramesh", "kartik"));
//!
//! assert_eq!(doc.resolve_root(), Some("ramesh"));
//! ```

pub mod document;
pub mod error;
pub mod person;
pub mod relationship;

pub use document::{timestamp_now, DocumentIssue, FamilyDocument, Meta};
pub use error::{DocumentError, PersonError, Result};
pub use person::{generate_id, Gender, Person, PersonFields};
pub use relationship::{ParentChild, Relationship, RelationshipKey, RelationshipKind, Spouse};
