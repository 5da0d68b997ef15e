//! The engine context.
//!
//! `EngineContext` holds the canonical document plus everything derived
//! from it: the adjacency index, the collapsed set and the layout
//! geometry. Every render and every edit goes through it, and derived
//! state is rebuilt from scratch after each successful mutation.

use crate::adjacency::AdjacencyIndex;
use crate::cycle::{ancestry_cycles, would_create_cycle};
use crate::layout::{assign_positions, rendered_edges, LayoutConfig, LayoutEdge, PositionMap};
use crate::store::{self, DeletionImpact, EdgeOutcome, RelationshipStore};
use crate::traversal::{build_rooted_view, CollapsedSet, ExpansionNode};
use kintree_core::{DocumentIssue, FamilyDocument, Person, PersonFields, Relationship, RelationshipKey};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Root person not found: {0}")]
    RootNotFound(String),

    #[error("The document has no people to render")]
    EmptyDocument,
}

/// Document, derived index and view state for one open family tree.
#[derive(Debug, Clone, Default)]
pub struct EngineContext {
    store: RelationshipStore,
    adjacency: AdjacencyIndex,
    collapsed: CollapsedSet,
    layout: LayoutConfig,
}

impl EngineContext {
    /// Creates a context for `document` with the default layout.
    pub fn new(document: FamilyDocument) -> Self {
        let mut engine = Self::default();
        engine.load(document);
        engine
    }

    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Replaces the open document.
    ///
    /// The collapsed set is cleared and the index rebuilt. Integrity
    /// problems are logged but do not stop the load.
    pub fn load(&mut self, document: FamilyDocument) {
        info!(
            "Loading \"{}\": {} people, {} relationships",
            document.meta.title,
            document.people.len(),
            document.relationships.len()
        );
        self.store = RelationshipStore::new(document);
        self.collapsed.clear();
        self.rebuild();

        for issue in self.issues() {
            warn!("{}", issue);
        }
    }

    fn rebuild(&mut self) {
        let start = Instant::now();
        self.adjacency = AdjacencyIndex::build(self.store.relationships());
        let store = &self.store;
        self.collapsed.retain(|id| store.person(id).is_some());
        debug!(
            "Rebuilt adjacency for {} relationships in {:?}",
            self.store.relationships().len(),
            start.elapsed()
        );
    }

    pub fn document(&self) -> &FamilyDocument {
        self.store.document()
    }

    pub fn store(&self) -> &RelationshipStore {
        &self.store
    }

    pub fn adjacency(&self) -> &AdjacencyIndex {
        &self.adjacency
    }

    pub fn collapsed(&self) -> &CollapsedSet {
        &self.collapsed
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Structural problems in the open document, including ancestry loops.
    pub fn issues(&self) -> Vec<DocumentIssue> {
        let mut issues = self.document().issues();
        issues.extend(
            ancestry_cycles(&self.adjacency)
                .into_iter()
                .map(|people| DocumentIssue::AncestryCycle { people }),
        );
        issues
    }

    /// The root a default render starts from.
    pub fn default_root(&self) -> Option<&str> {
        self.document().resolve_root()
    }

    /// Expands the graph around `root_id` without laying it out.
    pub fn rooted_view(&self, root_id: &str) -> Result<ExpansionNode, RenderError> {
        build_rooted_view(
            root_id,
            self.store.people(),
            &self.adjacency,
            &self.collapsed,
        )
        .ok_or_else(|| RenderError::RootNotFound(root_id.to_string()))
    }

    /// Runs the full pipeline for `root_id` and returns the positions.
    pub fn render(&self, root_id: &str) -> Result<PositionMap, RenderError> {
        let start = Instant::now();
        let view = self.rooted_view(root_id)?;
        let positions = assign_positions(&view, &self.layout);
        debug!(
            "Rendered {} people on {} levels from {} in {:?}",
            positions.len(),
            positions.levels.len(),
            root_id,
            start.elapsed()
        );
        Ok(positions)
    }

    /// Renders from the document's root.
    pub fn render_default(&self) -> Result<PositionMap, RenderError> {
        let root = self.default_root().ok_or(RenderError::EmptyDocument)?;
        self.render(root)
    }

    /// Relationships to draw for a rendered layout.
    pub fn rendered_edges(&self, positions: &PositionMap) -> Vec<LayoutEdge> {
        rendered_edges(self.store.relationships(), positions)
    }

    /// Flips whether `id`'s descendants are shown and returns the new state.
    pub fn toggle_collapse(&mut self, id: &str) -> bool {
        let collapsed = self.collapsed.toggle(id);
        debug!("{} {}", if collapsed { "Collapsed" } else { "Expanded" }, id);
        collapsed
    }

    pub fn is_collapsed(&self, id: &str) -> bool {
        self.collapsed.contains(id)
    }

    /// Would storing `parent -> child` make `child` its own ancestor?
    pub fn check_cycle(&self, parent: &str, child: &str) -> bool {
        would_create_cycle(parent, child, &self.adjacency)
    }

    pub fn search(&self, term: &str) -> Vec<&Person> {
        self.store.search(term)
    }

    pub fn find_existing_relationship(&self, key: &RelationshipKey) -> Option<&Relationship> {
        self.store.find_existing_relationship(key)
    }

    pub fn deletion_impact(&self, id: &str) -> store::Result<DeletionImpact> {
        self.store.deletion_impact(id)
    }

    fn mutate<T>(
        &mut self,
        edit: impl FnOnce(&mut RelationshipStore) -> store::Result<T>,
    ) -> store::Result<T> {
        let result = edit(&mut self.store);
        if result.is_ok() {
            self.rebuild();
        }
        result
    }

    pub fn add_person(&mut self, fields: PersonFields) -> store::Result<String> {
        self.mutate(|store| store.add_person(fields))
    }

    pub fn update_person(&mut self, id: &str, fields: PersonFields) -> store::Result<()> {
        self.mutate(|store| store.update_person(id, fields))
    }

    pub fn delete_person(&mut self, id: &str) -> store::Result<DeletionImpact> {
        self.mutate(|store| store.delete_person(id))
    }

    pub fn add_or_update_parent_child(
        &mut self,
        parent: &str,
        child: &str,
        biological: bool,
        notes: Option<String>,
    ) -> store::Result<EdgeOutcome> {
        self.mutate(|store| store.add_or_update_parent_child(parent, child, biological, notes))
    }

    pub fn add_or_update_parent_child_allowing_cycle(
        &mut self,
        parent: &str,
        child: &str,
        biological: bool,
        notes: Option<String>,
    ) -> store::Result<EdgeOutcome> {
        self.mutate(|store| {
            store.add_or_update_parent_child_allowing_cycle(parent, child, biological, notes)
        })
    }

    pub fn add_parents(
        &mut self,
        father: Option<&str>,
        mother: Option<&str>,
        child: &str,
        biological: bool,
        notes: Option<String>,
        allow_cycle: bool,
    ) -> store::Result<Vec<EdgeOutcome>> {
        self.mutate(|store| store.add_parents(father, mother, child, biological, notes, allow_cycle))
    }

    pub fn add_or_update_spouse(
        &mut self,
        a: &str,
        b: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        notes: Option<String>,
    ) -> store::Result<EdgeOutcome> {
        self.mutate(|store| store.add_or_update_spouse(a, b, start_year, end_year, notes))
    }

    pub fn delete_relationship(&mut self, key: &RelationshipKey) -> store::Result<Relationship> {
        self.mutate(|store| store.delete_relationship(key))
    }

    pub fn set_root(&mut self, id: &str) -> store::Result<()> {
        self.mutate(|store| store.set_root(id))
    }

    pub fn update_meta(&mut self, title: Option<String>, notes: Option<String>) {
        self.store.update_meta(title, notes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use tempfile::tempdir;

    fn family() -> EngineContext {
        let mut engine = EngineContext::new(FamilyDocument::new("Test"));
        for name in ["A", "B", "C"] {
            engine.add_person(PersonFields::named(name)).unwrap();
        }
        engine.add_or_update_spouse("a", "b", None, None, None).unwrap();
        engine
            .add_parents(Some("a"), Some("b"), "c", true, None, false)
            .unwrap();
        engine
    }

    #[test]
    fn test_spouse_child_scenario() {
        let engine = family();
        let positions = engine.render_default().unwrap();

        assert_eq!(positions.len(), 3);
        assert_eq!(positions.get("a").unwrap().level, 0);
        assert_eq!(positions.get("b").unwrap().level, 0);
        assert_eq!(positions.get("c").unwrap().level, 1);

        let edges = engine.rendered_edges(&positions);
        let pairs: Vec<(&str, &str)> = edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert!(pairs.contains(&("a", "c")));
        assert!(pairs.contains(&("b", "c")));
    }

    #[test]
    fn test_render_unknown_root() {
        let engine = family();
        assert_eq!(
            engine.render("nobody"),
            Err(RenderError::RootNotFound("nobody".into()))
        );

        let empty = EngineContext::new(FamilyDocument::new("Empty"));
        assert_eq!(empty.render_default(), Err(RenderError::EmptyDocument));
    }

    #[test]
    fn test_render_is_idempotent() {
        let engine = family();
        assert_eq!(engine.render("c").unwrap(), engine.render("c").unwrap());
    }

    #[test]
    fn test_toggle_collapse_round_trip() {
        let mut engine = family();
        let open = engine.render("a").unwrap();

        assert!(engine.toggle_collapse("a"));
        let closed = engine.render("a").unwrap();
        assert!(!closed.contains("c"));
        assert!(closed.contains("b"));

        assert!(!engine.toggle_collapse("a"));
        assert_eq!(engine.render("a").unwrap(), open);
    }

    #[test]
    fn test_mutations_rebuild_index() {
        let mut engine = family();
        assert!(engine.check_cycle("c", "a"));
        assert!(!engine.check_cycle("a", "c"));

        engine
            .delete_relationship(&RelationshipKey::parent_child("a", "c"))
            .unwrap();
        assert!(!engine.check_cycle("c", "a"));
        assert_eq!(engine.adjacency().parents_of("c"), ["b"]);
    }

    #[test]
    fn test_cycle_error_leaves_index_untouched() {
        let mut engine = family();
        let before = engine.adjacency().clone();
        assert!(matches!(
            engine.add_or_update_parent_child("c", "a", true, None),
            Err(StoreError::WouldCreateCycle { .. })
        ));
        assert_eq!(engine.adjacency(), &before);
    }

    #[test]
    fn test_delete_drops_collapsed_id_and_moves_root() {
        let mut engine = family();
        engine.toggle_collapse("a");
        let report = engine.delete_person("a").unwrap();

        assert_eq!(report.relationships.len(), 2);
        assert!(!engine.is_collapsed("a"));
        assert_eq!(engine.default_root(), Some("b"));
        assert_eq!(engine.render_default().unwrap().len(), 2);
    }

    #[test]
    fn test_update_meta_keeps_graph() {
        let mut engine = family();
        let before = engine.render_default().unwrap();

        engine.update_meta(Some("Hakim family".into()), None);
        engine.update_meta(None, Some("From the 1998 reunion".into()));

        let meta = &engine.document().meta;
        assert_eq!(meta.title, "Hakim family");
        assert_eq!(meta.notes, "From the 1998 reunion");
        assert!(meta.modified.is_some());
        assert_eq!(engine.render_default().unwrap(), before);
    }

    #[test]
    fn test_load_resets_collapsed_and_reports_cycles() {
        let mut engine = family();
        engine.toggle_collapse("b");

        let mut doc = engine.document().clone();
        doc.relationships.push(Relationship::parent_child("c", "a"));
        engine.load(doc);

        assert!(engine.collapsed().is_empty());
        assert!(engine.issues().contains(&DocumentIssue::AncestryCycle {
            people: vec!["a".into(), "c".into()]
        }));
        // cyclic data still renders
        assert_eq!(engine.render("a").unwrap().len(), 3);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("family.json");
        family().document().save(&path).unwrap();

        let engine = EngineContext::new(FamilyDocument::load(&path).unwrap());
        assert_eq!(engine.document().people.len(), 3);
        assert!(engine.issues().is_empty());
        assert_eq!(engine.render_default().unwrap().len(), 3);
    }
}
