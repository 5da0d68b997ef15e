//! People in a family document.
//!
//! A person is referenced everywhere else by `id` only. Nothing in this
//! struct points back at relationships; those live in the document's
//! flat relationship list.

use crate::error::PersonError;
use serde::{Deserialize, Serialize};

/// Recorded gender of a person.
///
/// Serialized as `"M"`, `"F"`, any other string, or `null`. Strings we
/// don't recognize are kept verbatim so a load/save cycle never rewrites
/// someone's data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Gender {
    Male,
    Female,
    Other(String),
    #[default]
    Unspecified,
}

impl From<Option<String>> for Gender {
    fn from(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            None | Some("") => Gender::Unspecified,
            Some("M") => Gender::Male,
            Some("F") => Gender::Female,
            Some(other) => Gender::Other(other.to_string()),
        }
    }
}

impl From<Gender> for Option<String> {
    fn from(value: Gender) -> Self {
        match value {
            Gender::Male => Some("M".to_string()),
            Gender::Female => Some("F".to_string()),
            Gender::Other(s) => Some(s),
            Gender::Unspecified => None,
        }
    }
}

impl From<&str> for Gender {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" => Gender::Unspecified,
            "m" | "male" => Gender::Male,
            "f" | "female" => Gender::Female,
            _ => Gender::Other(value.trim().to_string()),
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "M"),
            Gender::Female => write!(f, "F"),
            Gender::Other(s) => write!(f, "{}", s),
            Gender::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// A person in the family tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Unique, stable key.
    pub id: String,

    /// Full display name.
    pub name: String,

    #[serde(default)]
    pub gender: Gender,

    /// Nicknames and alternate names, in the order they were entered.
    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub birth_year: Option<i32>,

    #[serde(default)]
    pub death_year: Option<i32>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl Person {
    /// Creates a person with only an id and a name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gender: Gender::Unspecified,
            aliases: Vec::new(),
            birth_year: None,
            death_year: None,
            notes: None,
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_years(mut self, birth: Option<i32>, death: Option<i32>) -> Self {
        self.birth_year = birth;
        self.death_year = death;
        self
    }

    /// Checks the record-level invariants (non-empty name, death not
    /// before birth).
    pub fn validate(&self) -> Result<(), PersonError> {
        if self.name.trim().is_empty() {
            return Err(PersonError::EmptyName);
        }
        if let (Some(birth), Some(death)) = (self.birth_year, self.death_year) {
            if death < birth {
                return Err(PersonError::InvalidLifespan { birth, death });
            }
        }
        Ok(())
    }

    /// Name followed by aliases in parentheses, e.g. `Rani Hakim (JaiKishori Razdan)`.
    pub fn display_name(&self) -> String {
        if self.aliases.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.aliases.join(", "))
        }
    }

    /// Case-insensitive substring match against name, id and aliases.
    ///
    /// `term_lower` must already be lowercased.
    pub fn matches(&self, term_lower: &str) -> bool {
        self.name.to_lowercase().contains(term_lower)
            || self.id.to_lowercase().contains(term_lower)
            || self
                .aliases
                .iter()
                .any(|alias| alias.to_lowercase().contains(term_lower))
    }
}

/// Editable fields of a person, used for both add and update.
///
/// `id` is only consulted on add; when absent an id is generated from
/// the name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonFields {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub birth_year: Option<i32>,
    #[serde(default)]
    pub death_year: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PersonFields {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builds the person record for the given id, normalizing whitespace
    /// and dropping empty aliases and notes.
    pub fn into_person(self, id: impl Into<String>) -> Person {
        let aliases = self
            .aliases
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        let notes = self
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Person {
            id: id.into(),
            name: self.name.trim().to_string(),
            gender: self.gender,
            aliases,
            birth_year: self.birth_year,
            death_year: self.death_year,
            notes,
        }
    }
}

/// Generates an id from a display name.
///
/// Lowercases the name, turns whitespace runs into `_` and drops anything
/// outside `[a-z0-9_]`. If `taken` reports a clash, `_1`, `_2`, ... are
/// appended until the id is free.
pub fn generate_id(name: &str, taken: impl Fn(&str) -> bool) -> String {
    let base: String = name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();
    let base = if base.is_empty() {
        "person".to_string()
    } else {
        base
    };

    if !taken(&base) {
        return base;
    }

    let mut counter = 1;
    loop {
        let candidate = format!("{}_{}", base, counter);
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_gender_round_trip() {
        let json = r#"[{"id":"a","name":"A","gender":"M"},
                       {"id":"b","name":"B","gender":"F"},
                       {"id":"c","name":"C","gender":"Other"},
                       {"id":"d","name":"D","gender":null},
                       {"id":"e","name":"E"}]"#;
        let people: Vec<Person> = serde_json::from_str(json).unwrap();

        assert_eq!(people[0].gender, Gender::Male);
        assert_eq!(people[1].gender, Gender::Female);
        assert_eq!(people[2].gender, Gender::Other("Other".to_string()));
        assert_eq!(people[3].gender, Gender::Unspecified);
        assert_eq!(people[4].gender, Gender::Unspecified);

        let out = serde_json::to_value(&people[2]).unwrap();
        assert_eq!(out["gender"], "Other");
        let out = serde_json::to_value(&people[3]).unwrap();
        assert!(out["gender"].is_null());
    }

    #[test]
    fn test_person_serializes_camel_case_with_nulls() {
        let person = Person::new("rani", "Rani Hakim").with_years(Some(1940), None);
        let value = serde_json::to_value(&person).unwrap();

        assert_eq!(value["birthYear"], 1940);
        assert!(value["deathYear"].is_null());
        assert!(value["notes"].is_null());
        assert_eq!(value["aliases"], serde_json::json!([]));
    }

    #[test]
    fn test_validate_lifespan() {
        let ok = Person::new("a", "A").with_years(Some(1900), Some(1900));
        assert!(ok.validate().is_ok());

        let bad = Person::new("a", "A").with_years(Some(1950), Some(1949));
        assert_eq!(
            bad.validate(),
            Err(PersonError::InvalidLifespan {
                birth: 1950,
                death: 1949
            })
        );

        let unnamed = Person::new("a", "   ");
        assert_eq!(unnamed.validate(), Err(PersonError::EmptyName));
    }

    #[test]
    fn test_matches_name_id_and_alias() {
        let person = Person::new("aneeta", "Aneeta Sapru")
            .with_aliases(vec!["Anita Hakim".into(), "Bunty".into()]);

        assert!(person.matches("sapru"));
        assert!(person.matches("aneeta"));
        assert!(person.matches("bunty"));
        assert!(!person.matches("razdan"));
        assert_eq!(person.display_name(), "Aneeta Sapru (Anita Hakim, Bunty)");
    }

    #[test]
    fn test_generate_id() {
        let mut taken = HashSet::new();
        assert_eq!(
            generate_id("Giridhari Lal Hakim", |id| taken.contains(id)),
            "giridhari_lal_hakim"
        );

        taken.insert("rani_hakim".to_string());
        assert_eq!(generate_id("Rani  Hakim", |id| taken.contains(id)), "rani_hakim_1");

        taken.insert("rani_hakim_1".to_string());
        assert_eq!(generate_id("Rani Hakim", |id| taken.contains(id)), "rani_hakim_2");

        assert_eq!(generate_id("O'Brien-Smith", |_| false), "obriensmith");
        assert_eq!(generate_id("???", |_| false), "person");
    }

    #[test]
    fn test_fields_into_person_trims() {
        let fields = PersonFields {
            name: "  Veena Sapru ".into(),
            aliases: vec![" RajKumari Raina ".into(), "  ".into()],
            notes: Some("   ".into()),
            ..PersonFields::default()
        };
        let person = fields.into_person("veena");

        assert_eq!(person.name, "Veena Sapru");
        assert_eq!(person.aliases, vec!["RajKumari Raina".to_string()]);
        assert_eq!(person.notes, None);
    }
}
