//! The family document: people, relationships and metadata.
//!
//! This is the only wire/file contract Kintree has. Loading is lenient
//! (missing `meta` or timestamps are filled in) and structural problems
//! are reported as [`DocumentIssue`]s instead of failing the load, so a
//! partially broken file still renders partially.

use crate::error::Result;
use crate::person::Person;
use crate::relationship::{Relationship, RelationshipKey};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Returns the current UTC time as an ISO-8601 string with millisecond
/// precision, e.g. `2024-05-01T09:30:00.000Z`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Document-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Meta {
    pub title: String,
    pub root_person_id: Option<String>,
    pub notes: String,
    pub created: Option<String>,
    pub modified: Option<String>,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            title: "Family Tree".to_string(),
            root_person_id: None,
            notes: String::new(),
            created: None,
            modified: None,
        }
    }
}

/// A complete family tree as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyDocument {
    pub people: Vec<Person>,
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub meta: Meta,
}

impl Default for FamilyDocument {
    fn default() -> Self {
        Self::new("Family Tree")
    }
}

/// A structural problem found in a loaded document.
///
/// None of these stop the engine from running. They are surfaced so the
/// caller can warn about data that will render partially.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DocumentIssue {
    /// Two people share an id; only the first is addressable.
    DuplicatePersonId { id: String },
    /// A relationship names a person that does not exist.
    DanglingReference { relationship: usize, id: String },
    /// A relationship connects a person to themself.
    SelfReference { relationship: usize, id: String },
    /// Two relationship records share the same identity.
    DuplicateRelationship { relationship: usize, key: RelationshipKey },
    /// `deathYear` is earlier than `birthYear`.
    InvalidLifespan { id: String, birth: i32, death: i32 },
    /// `meta.rootPersonId` names a person that does not exist.
    UnknownRoot { id: String },
    /// The parent-of graph already contains a loop through these people.
    AncestryCycle { people: Vec<String> },
}

impl std::fmt::Display for DocumentIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicatePersonId { id } => write!(f, "duplicate person id {:?}", id),
            Self::DanglingReference { relationship, id } => write!(
                f,
                "relationship #{} references unknown person {:?}",
                relationship, id
            ),
            Self::SelfReference { relationship, id } => write!(
                f,
                "relationship #{} connects {:?} to themself",
                relationship, id
            ),
            Self::DuplicateRelationship { relationship, key } => {
                write!(f, "relationship #{} duplicates {}", relationship, key)
            }
            Self::InvalidLifespan { id, birth, death } => write!(
                f,
                "{:?} died ({}) before being born ({})",
                id, death, birth
            ),
            Self::UnknownRoot { id } => write!(f, "root person {:?} does not exist", id),
            Self::AncestryCycle { people } => {
                write!(f, "ancestry cycle through {}", people.join(" -> "))
            }
        }
    }
}

impl FamilyDocument {
    /// Creates an empty document with fresh timestamps.
    pub fn new(title: impl Into<String>) -> Self {
        let now = timestamp_now();
        Self {
            people: Vec::new(),
            relationships: Vec::new(),
            meta: Meta {
                title: title.into(),
                created: Some(now.clone()),
                modified: Some(now),
                ..Meta::default()
            },
        }
    }

    /// Parses a document from JSON, filling in missing timestamps.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut doc: FamilyDocument = serde_json::from_str(json)?;
        doc.ensure_timestamps();
        Ok(doc)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a document from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let doc = Self::from_json(&text)?;
        debug!(
            "Loaded {} people and {} relationships from {}",
            doc.people.len(),
            doc.relationships.len(),
            path.as_ref().display()
        );
        Ok(doc)
    }

    /// Writes the document to a file.
    ///
    /// The new contents go to `<path>.tmp` first. Only once that write
    /// succeeds is the existing file copied to `<path>.bak` and replaced,
    /// so a failed save leaves `path` untouched.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json_pretty()?;
        let staged = with_suffix(path, ".tmp");
        fs::write(&staged, json)?;
        if path.exists() {
            fs::copy(path, with_suffix(path, ".bak"))?;
        }
        fs::rename(&staged, path)?;
        debug!("Saved document to {}", path.display());
        Ok(())
    }

    /// Fills in `created` and `modified` when a document arrives without them.
    pub fn ensure_timestamps(&mut self) {
        if self.meta.created.is_none() {
            self.meta.created = Some(timestamp_now());
        }
        if self.meta.modified.is_none() {
            self.meta.modified = self.meta.created.clone();
        }
    }

    /// Stamps the modification time.
    pub fn touch(&mut self) {
        self.meta.modified = Some(timestamp_now());
    }

    /// Gets a person by id.
    pub fn person(&self, id: &str) -> Option<&Person> {
        self.people.iter().find(|p| p.id == id)
    }

    pub fn person_mut(&mut self, id: &str) -> Option<&mut Person> {
        self.people.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.people.iter().any(|p| p.id == id)
    }

    /// The root to render from: `meta.rootPersonId` when it names an
    /// existing person, otherwise the first person in the document.
    pub fn resolve_root(&self) -> Option<&str> {
        self.meta
            .root_person_id
            .as_deref()
            .filter(|id| self.contains(id))
            .or_else(|| self.people.first().map(|p| p.id.as_str()))
    }

    /// Checks the document for structural problems.
    ///
    /// Ancestry cycles are not detected here; that needs the adjacency
    /// index and lives in the graph crate.
    pub fn issues(&self) -> Vec<DocumentIssue> {
        let mut issues = Vec::new();
        let mut ids: HashSet<&str> = HashSet::new();

        for person in &self.people {
            if !ids.insert(person.id.as_str()) {
                issues.push(DocumentIssue::DuplicatePersonId {
                    id: person.id.clone(),
                });
            }
            if let (Some(birth), Some(death)) = (person.birth_year, person.death_year) {
                if death < birth {
                    issues.push(DocumentIssue::InvalidLifespan {
                        id: person.id.clone(),
                        birth,
                        death,
                    });
                }
            }
        }

        let mut keys: HashSet<RelationshipKey> = HashSet::new();
        for (index, rel) in self.relationships.iter().enumerate() {
            let (a, b) = rel.endpoints();
            for id in [a, b] {
                if !ids.contains(id) {
                    issues.push(DocumentIssue::DanglingReference {
                        relationship: index,
                        id: id.to_string(),
                    });
                }
            }
            if a == b {
                issues.push(DocumentIssue::SelfReference {
                    relationship: index,
                    id: a.to_string(),
                });
            }
            let key = rel.key();
            if !keys.insert(key.clone()) {
                issues.push(DocumentIssue::DuplicateRelationship {
                    relationship: index,
                    key,
                });
            }
        }

        if let Some(root) = &self.meta.root_person_id {
            if !ids.contains(root.as_str()) {
                issues.push(DocumentIssue::UnknownRoot { id: root.clone() });
            }
        }

        issues
    }
}
