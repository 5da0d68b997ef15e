//! Kintree Graph - Traversal and layout for family trees
//!
//! This crate turns a flat list of relationships into something that
//! can be drawn. It builds adjacency lookups, expands the graph into a
//! tree around a chosen root, assigns every visible person a generation
//! level and a slot, and guards edits so a person never becomes their
//! own ancestor by accident.
//!
//! # Pipeline
//!
//! ```text
//! RelationshipStore -> AdjacencyIndex -> rooted expansion -> PositionMap
//! ```
//!
//! Nothing is cached between runs. Each mutation rebuilds the index and
//! each render walks the graph again.
//!
//! # Example
//!
//! ```
//! use kintree_core::{FamilyDocument, PersonFields};
//! use kintree_graph::EngineContext;
//!
//! let mut engine = EngineContext::new(FamilyDocument::new("Example"));
//! engine.add_person(PersonFields::named("Ramesh Hakim")).unwrap();
//! engine.add_person(PersonFields::named("Kartik Hakim")).unwrap();
//! engine
//!     .add_or_update_parent_child("ramesh_hakim", "kartik_hakim", true, None)
//!     .unwrap();
//!
//! let positions = engine.render_default().unwrap();
//! assert_eq!(positions.get("kartik_hakim").unwrap().level, 1);
//! ```

mod adjacency;
mod cycle;
mod engine;
mod layout;
mod store;
mod traversal;

pub use adjacency::AdjacencyIndex;
pub use cycle::{ancestry_cycles, would_create_cycle};
pub use engine::{EngineContext, RenderError};
pub use layout::{assign_positions, rendered_edges, LayoutConfig, LayoutEdge, Position, PositionMap};
pub use store::{DeletionImpact, EdgeOutcome, RelationshipStore, StoreError};
pub use traversal::{build_rooted_view, CollapsedSet, ExpansionNode, PersonRef};
