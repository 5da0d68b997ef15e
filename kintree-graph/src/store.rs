//! Guarded edits to a family document.
//!
//! Every operation here checks its preconditions before touching the
//! document, so a rejected call leaves the document exactly as it was.
//! Successful mutations stamp `meta.modified`. Nothing here triggers a
//! re-render; the engine rebuilds derived state after each call.

use crate::adjacency::AdjacencyIndex;
use crate::cycle::would_create_cycle;
use kintree_core::{
    generate_id, FamilyDocument, ParentChild, Person, PersonError, PersonFields, Relationship,
    RelationshipKey, Spouse,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid person: {0}")]
    InvalidPerson(#[from] PersonError),

    #[error("A person with id {0:?} already exists")]
    DuplicatePersonId(String),

    #[error("Person not found: {0}")]
    PersonNotFound(String),

    #[error("{0} cannot be their own parent")]
    SelfParent(String),

    #[error("{0} cannot be their own spouse")]
    SelfSpouse(String),

    #[error("At least one parent is required")]
    NoParents,

    #[error("Father and mother cannot be the same person ({0})")]
    SameParents(String),

    #[error("Adding {parent} as a parent of {child} would make {child} their own ancestor")]
    WouldCreateCycle { parent: String, child: String },

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(RelationshipKey),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Whether an edit created a new relationship or merged into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeOutcome {
    Added,
    Updated,
}

impl std::fmt::Display for EdgeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeOutcome::Added => write!(f, "added"),
            EdgeOutcome::Updated => write!(f, "updated"),
        }
    }
}

/// What deleting a person removes, or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionImpact {
    pub id: String,
    pub name: String,
    /// Every relationship that references the person.
    pub relationships: Vec<Relationship>,
    pub was_root: bool,
    /// The root after deletion, when `was_root` is set.
    pub new_root: Option<String>,
}

/// Owns a family document and applies edits to it.
#[derive(Debug, Clone, Default)]
pub struct RelationshipStore {
    document: FamilyDocument,
}

impl From<FamilyDocument> for RelationshipStore {
    fn from(document: FamilyDocument) -> Self {
        Self::new(document)
    }
}

impl RelationshipStore {
    pub fn new(document: FamilyDocument) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &FamilyDocument {
        &self.document
    }

    pub fn people(&self) -> &[Person] {
        &self.document.people
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.document.relationships
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        self.document.person(id)
    }

    fn require_person(&self, id: &str) -> Result<&Person> {
        self.document
            .person(id)
            .ok_or_else(|| StoreError::PersonNotFound(id.to_string()))
    }

    /// Adds a person and returns the id they were stored under.
    ///
    /// Without an explicit id one is generated from the name. The first
    /// person added to a document with no root becomes the root.
    pub fn add_person(&mut self, fields: PersonFields) -> Result<String> {
        let requested = fields
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let id = match requested {
            Some(id) => {
                if self.document.contains(&id) {
                    return Err(StoreError::DuplicatePersonId(id));
                }
                id
            }
            None => generate_id(&fields.name, |candidate| self.document.contains(candidate)),
        };

        let person = fields.into_person(id.clone());
        person.validate()?;

        info!("Adding person {} ({})", person.name, id);
        self.document.people.push(person);
        if self.document.meta.root_person_id.is_none() {
            self.document.meta.root_person_id = Some(id.clone());
        }
        self.document.touch();
        Ok(id)
    }

    /// Overwrites the editable fields of an existing person. The id never
    /// changes.
    pub fn update_person(&mut self, id: &str, fields: PersonFields) -> Result<()> {
        self.require_person(id)?;
        let updated = fields.into_person(id);
        updated.validate()?;

        if let Some(person) = self.document.person_mut(id) {
            *person = updated;
        }
        debug!("Updated person {}", id);
        self.document.touch();
        Ok(())
    }

    /// Describes what [`delete_person`](Self::delete_person) would remove.
    pub fn deletion_impact(&self, id: &str) -> Result<DeletionImpact> {
        let person = self.require_person(id)?;
        let was_root = self.document.meta.root_person_id.as_deref() == Some(id);
        let new_root = if was_root {
            self.document
                .people
                .iter()
                .find(|p| p.id != id)
                .map(|p| p.id.clone())
        } else {
            self.document.meta.root_person_id.clone()
        };

        Ok(DeletionImpact {
            id: person.id.clone(),
            name: person.name.clone(),
            relationships: self
                .document
                .relationships
                .iter()
                .filter(|rel| rel.involves(id))
                .cloned()
                .collect(),
            was_root,
            new_root,
        })
    }

    /// Deletes a person together with every relationship that references
    /// them. If they were the root, the first remaining person (if any)
    /// becomes root.
    pub fn delete_person(&mut self, id: &str) -> Result<DeletionImpact> {
        let impact = self.deletion_impact(id)?;

        self.document.relationships.retain(|rel| !rel.involves(id));
        self.document.people.retain(|p| p.id != id);
        if impact.was_root {
            self.document.meta.root_person_id = impact.new_root.clone();
        }

        info!(
            "Deleted person {} and {} relationships",
            id,
            impact.relationships.len()
        );
        self.document.touch();
        Ok(impact)
    }

    pub fn set_root(&mut self, id: &str) -> Result<()> {
        self.require_person(id)?;
        self.document.meta.root_person_id = Some(id.to_string());
        self.document.touch();
        Ok(())
    }

    /// Updates the document title and notes; `None` leaves a field as is.
    pub fn update_meta(&mut self, title: Option<String>, notes: Option<String>) {
        if let Some(title) = title {
            self.document.meta.title = title;
        }
        if let Some(notes) = notes {
            self.document.meta.notes = notes;
        }
        self.document.touch();
    }

    /// Case-insensitive substring search over names, ids and aliases, in
    /// document order.
    pub fn search(&self, term: &str) -> Vec<&Person> {
        let term_lower = term.trim().to_lowercase();
        self.document
            .people
            .iter()
            .filter(|p| p.matches(&term_lower))
            .collect()
    }

    /// Looks up the stored record with the given identity.
    pub fn find_existing_relationship(&self, key: &RelationshipKey) -> Option<&Relationship> {
        let key = key.clone().normalized();
        self.document
            .relationships
            .iter()
            .find(|rel| rel.key() == key)
    }

    fn position_of(&self, key: &RelationshipKey) -> Option<usize> {
        self.document
            .relationships
            .iter()
            .position(|rel| &rel.key() == key)
    }

    fn check_parent_child(&self, parent: &str, child: &str, allow_cycle: bool) -> Result<()> {
        if parent == child {
            return Err(StoreError::SelfParent(child.to_string()));
        }
        self.require_person(parent)?;
        self.require_person(child)?;

        let key = RelationshipKey::parent_child(parent, child);
        if !allow_cycle && self.position_of(&key).is_none() {
            let adjacency = AdjacencyIndex::build(&self.document.relationships);
            if would_create_cycle(parent, child, &adjacency) {
                return Err(StoreError::WouldCreateCycle {
                    parent: parent.to_string(),
                    child: child.to_string(),
                });
            }
        }
        Ok(())
    }

    fn upsert_parent_child(
        &mut self,
        parent: &str,
        child: &str,
        biological: bool,
        notes: Option<String>,
    ) -> EdgeOutcome {
        let key = RelationshipKey::parent_child(parent, child);
        if let Some(index) = self.position_of(&key) {
            if let Relationship::ParentChild(pc) = &mut self.document.relationships[index] {
                pc.biological = biological;
                pc.notes = notes;
            }
            debug!("Updated parent-child {} -> {}", parent, child);
            EdgeOutcome::Updated
        } else {
            self.document
                .relationships
                .push(Relationship::ParentChild(ParentChild {
                    parent_id: parent.to_string(),
                    child_id: child.to_string(),
                    biological,
                    notes,
                }));
            debug!("Added parent-child {} -> {}", parent, child);
            EdgeOutcome::Added
        }
    }

    /// Adds a parent-child edge, or merges into the existing one.
    ///
    /// A new edge that would make the child their own ancestor is
    /// rejected with [`StoreError::WouldCreateCycle`]. Use
    /// [`add_or_update_parent_child_allowing_cycle`](Self::add_or_update_parent_child_allowing_cycle)
    /// once the caller has confirmed it anyway.
    pub fn add_or_update_parent_child(
        &mut self,
        parent: &str,
        child: &str,
        biological: bool,
        notes: Option<String>,
    ) -> Result<EdgeOutcome> {
        self.check_parent_child(parent, child, false)?;
        let outcome = self.upsert_parent_child(parent, child, biological, notes);
        self.document.touch();
        Ok(outcome)
    }

    /// Same as [`add_or_update_parent_child`](Self::add_or_update_parent_child)
    /// without the cycle check. Self-parent edges are still refused.
    pub fn add_or_update_parent_child_allowing_cycle(
        &mut self,
        parent: &str,
        child: &str,
        biological: bool,
        notes: Option<String>,
    ) -> Result<EdgeOutcome> {
        self.check_parent_child(parent, child, true)?;
        let outcome = self.upsert_parent_child(parent, child, biological, notes);
        self.document.touch();
        Ok(outcome)
    }

    /// Links a child to a father, a mother, or both in one edit.
    ///
    /// All checks run before anything is stored, so either every edge is
    /// written or none is. Outcomes are returned father first.
    pub fn add_parents(
        &mut self,
        father: Option<&str>,
        mother: Option<&str>,
        child: &str,
        biological: bool,
        notes: Option<String>,
        allow_cycle: bool,
    ) -> Result<Vec<EdgeOutcome>> {
        let parents: Vec<&str> = father.into_iter().chain(mother).collect();
        if parents.is_empty() {
            return Err(StoreError::NoParents);
        }
        if let (Some(father), Some(mother)) = (father, mother) {
            if father == mother {
                return Err(StoreError::SameParents(father.to_string()));
            }
        }
        for parent in &parents {
            self.check_parent_child(parent, child, allow_cycle)?;
        }

        let outcomes: Vec<EdgeOutcome> = parents
            .iter()
            .map(|parent| self.upsert_parent_child(parent, child, biological, notes.clone()))
            .collect();
        self.document.touch();
        Ok(outcomes)
    }

    /// Adds a spouse edge, or merges years and notes into the existing
    /// record for the same pair (in either order).
    pub fn add_or_update_spouse(
        &mut self,
        a: &str,
        b: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        notes: Option<String>,
    ) -> Result<EdgeOutcome> {
        if a == b {
            return Err(StoreError::SelfSpouse(a.to_string()));
        }
        self.require_person(a)?;
        self.require_person(b)?;

        let key = RelationshipKey::spouse(a, b);
        let outcome = if let Some(index) = self.position_of(&key) {
            if let Relationship::Spouse(s) = &mut self.document.relationships[index] {
                s.start_year = start_year;
                s.end_year = end_year;
                s.notes = notes;
            }
            debug!("Updated spouse {}", key);
            EdgeOutcome::Updated
        } else {
            self.document.relationships.push(Relationship::Spouse(Spouse {
                people: [a.to_string(), b.to_string()],
                start_year,
                end_year,
                notes,
            }));
            debug!("Added spouse {}", key);
            EdgeOutcome::Added
        };

        self.document.touch();
        Ok(outcome)
    }

    /// Removes the relationship with the given identity and returns it.
    pub fn delete_relationship(&mut self, key: &RelationshipKey) -> Result<Relationship> {
        let key = key.clone().normalized();
        let index = self
            .position_of(&key)
            .ok_or_else(|| StoreError::RelationshipNotFound(key.clone()))?;
        let removed = self.document.relationships.remove(index);
        info!("Deleted relationship {}", key);
        self.document.touch();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(ids: &[&str]) -> RelationshipStore {
        let mut doc = FamilyDocument::new("Test");
        for id in ids {
            doc.people.push(Person::new(*id, id.to_uppercase()));
        }
        doc.meta.root_person_id = ids.first().map(|id| id.to_string());
        RelationshipStore::new(doc)
    }

    #[test]
    fn test_add_person_generates_id_and_sets_root() {
        let mut store = RelationshipStore::new(FamilyDocument::new("Empty"));
        let id = store.add_person(PersonFields::named("Rani Hakim")).unwrap();
        assert_eq!(id, "rani_hakim");
        assert_eq!(store.document().meta.root_person_id.as_deref(), Some("rani_hakim"));

        let second = store.add_person(PersonFields::named("Rani Hakim")).unwrap();
        assert_eq!(second, "rani_hakim_1");
        assert_eq!(store.document().meta.root_person_id.as_deref(), Some("rani_hakim"));
    }

    #[test]
    fn test_add_person_rejects_duplicates_and_bad_years() {
        let mut store = store_with(&["a"]);
        let fields = PersonFields {
            id: Some("a".into()),
            ..PersonFields::named("Another A")
        };
        assert_eq!(
            store.add_person(fields),
            Err(StoreError::DuplicatePersonId("a".into()))
        );

        let fields = PersonFields {
            birth_year: Some(2000),
            death_year: Some(1990),
            ..PersonFields::named("Time Traveller")
        };
        assert!(matches!(
            store.add_person(fields),
            Err(StoreError::InvalidPerson(PersonError::InvalidLifespan { .. }))
        ));
        assert_eq!(
            store.add_person(PersonFields::named("  ")),
            Err(StoreError::InvalidPerson(PersonError::EmptyName))
        );
        assert_eq!(store.people().len(), 1);
    }

    #[test]
    fn test_update_person_keeps_id() {
        let mut store = store_with(&["a"]);
        let fields = PersonFields {
            id: Some("ignored".into()),
            aliases: vec!["Bunty".into()],
            ..PersonFields::named("Renamed")
        };
        store.update_person("a", fields).unwrap();

        let person = store.person("a").unwrap();
        assert_eq!(person.name, "Renamed");
        assert_eq!(person.aliases, vec!["Bunty".to_string()]);
        assert!(store.person("ignored").is_none());

        assert_eq!(
            store.update_person("zz", PersonFields::named("x")),
            Err(StoreError::PersonNotFound("zz".into()))
        );
    }

    #[test]
    fn test_parent_child_merge_and_guards() {
        let mut store = store_with(&["p", "c"]);
        assert_eq!(
            store.add_or_update_parent_child("p", "c", true, None),
            Ok(EdgeOutcome::Added)
        );
        assert_eq!(
            store.add_or_update_parent_child("p", "c", false, Some("adopted".into())),
            Ok(EdgeOutcome::Updated)
        );
        assert_eq!(store.relationships().len(), 1);
        match &store.relationships()[0] {
            Relationship::ParentChild(pc) => {
                assert!(!pc.biological);
                assert_eq!(pc.notes.as_deref(), Some("adopted"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            store.add_or_update_parent_child("p", "p", true, None),
            Err(StoreError::SelfParent("p".into()))
        );
        assert_eq!(
            store.add_or_update_parent_child("p", "ghost", true, None),
            Err(StoreError::PersonNotFound("ghost".into()))
        );
    }

    #[test]
    fn test_cycle_rejected_unless_allowed() {
        let mut store = store_with(&["a", "b"]);
        store.add_or_update_parent_child("a", "b", true, None).unwrap();

        let before = store.document().clone();
        assert_eq!(
            store.add_or_update_parent_child("b", "a", true, None),
            Err(StoreError::WouldCreateCycle {
                parent: "b".into(),
                child: "a".into()
            })
        );
        assert_eq!(store.document(), &before);

        assert_eq!(
            store.add_or_update_parent_child_allowing_cycle("b", "a", true, None),
            Ok(EdgeOutcome::Added)
        );
        assert_eq!(store.relationships().len(), 2);
    }

    #[test]
    fn test_add_parents_is_all_or_nothing() {
        let mut store = store_with(&["dad", "mum", "kid"]);

        assert_eq!(
            store.add_parents(None, None, "kid", true, None, false),
            Err(StoreError::NoParents)
        );
        assert_eq!(
            store.add_parents(Some("dad"), Some("dad"), "kid", true, None, false),
            Err(StoreError::SameParents("dad".into()))
        );
        assert_eq!(
            store.add_parents(Some("dad"), Some("ghost"), "kid", true, None, false),
            Err(StoreError::PersonNotFound("ghost".into()))
        );
        assert!(store.relationships().is_empty());

        let outcomes = store
            .add_parents(Some("dad"), Some("mum"), "kid", true, None, false)
            .unwrap();
        assert_eq!(outcomes, vec![EdgeOutcome::Added, EdgeOutcome::Added]);

        let outcomes = store
            .add_parents(None, Some("mum"), "kid", false, None, false)
            .unwrap();
        assert_eq!(outcomes, vec![EdgeOutcome::Updated]);
    }

    #[test]
    fn test_spouse_merge_is_unordered() {
        let mut store = store_with(&["a", "b"]);
        assert_eq!(
            store.add_or_update_spouse("a", "b", Some(1990), None, None),
            Ok(EdgeOutcome::Added)
        );
        assert_eq!(
            store.add_or_update_spouse("b", "a", Some(1991), Some(2001), None),
            Ok(EdgeOutcome::Updated)
        );
        assert_eq!(store.relationships().len(), 1);

        let existing = store
            .find_existing_relationship(&RelationshipKey::spouse("b", "a"))
            .unwrap();
        match existing {
            Relationship::Spouse(s) => {
                assert_eq!(s.start_year, Some(1991));
                assert_eq!(s.end_year, Some(2001));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            store.add_or_update_spouse("a", "a", None, None, None),
            Err(StoreError::SelfSpouse("a".into()))
        );
    }

    #[test]
    fn test_delete_person_cascades_and_reassigns_root() {
        let mut store = store_with(&["a", "b", "c"]);
        store.add_or_update_parent_child("a", "b", true, None).unwrap();
        store.add_or_update_spouse("a", "c", None, None, None).unwrap();
        store.add_or_update_parent_child("c", "b", true, None).unwrap();

        let impact = store.deletion_impact("a").unwrap();
        assert_eq!(impact.relationships.len(), 2);
        assert!(impact.was_root);
        assert_eq!(impact.new_root.as_deref(), Some("b"));
        assert_eq!(store.people().len(), 3);

        let report = store.delete_person("a").unwrap();
        assert_eq!(report, impact);
        assert_eq!(store.people().len(), 2);
        assert_eq!(store.relationships().len(), 1);
        assert!(store.relationships().iter().all(|rel| !rel.involves("a")));
        assert_eq!(store.document().meta.root_person_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_delete_last_person_clears_root() {
        let mut store = store_with(&["solo"]);
        store.delete_person("solo").unwrap();
        assert!(store.people().is_empty());
        assert_eq!(store.document().meta.root_person_id, None);
        assert_eq!(
            store.delete_person("solo"),
            Err(StoreError::PersonNotFound("solo".into()))
        );
    }

    #[test]
    fn test_delete_relationship() {
        let mut store = store_with(&["a", "b"]);
        store.add_or_update_spouse("a", "b", None, None, None).unwrap();

        let removed = store
            .delete_relationship(&RelationshipKey::spouse("b", "a"))
            .unwrap();
        assert_eq!(removed.key(), RelationshipKey::spouse("a", "b"));
        assert!(store.relationships().is_empty());

        let missing = RelationshipKey::parent_child("a", "b");
        assert_eq!(
            store.delete_relationship(&missing),
            Err(StoreError::RelationshipNotFound(missing))
        );
    }

    #[test]
    fn test_mutations_stamp_modified() {
        let mut store = store_with(&["a"]);
        store.document.meta.modified = Some("2000-01-01T00:00:00.000Z".into());
        store.set_root("a").unwrap();
        assert_ne!(
            store.document().meta.modified.as_deref(),
            Some("2000-01-01T00:00:00.000Z")
        );
    }

    #[test]
    fn test_search_and_meta() {
        let mut store = store_with(&["aneeta_sapru", "kartik"]);
        let found = store.search("SAPRU");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "aneeta_sapru");

        store.update_meta(Some("Hakim family".into()), None);
        assert_eq!(store.document().meta.title, "Hakim family");
        assert_eq!(store.document().meta.notes, "");

        assert_eq!(
            store.set_root("nobody"),
            Err(StoreError::PersonNotFound("nobody".into()))
        );
    }
}
