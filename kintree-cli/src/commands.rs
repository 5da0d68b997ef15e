//! CLI command implementations.

use crate::config::KintreeConfig;
use crate::PersonArgs;
use colored::Colorize;
use kintree_core::{FamilyDocument, Gender, Person, PersonFields, Relationship, RelationshipKey};
use kintree_graph::{EngineContext, PositionMap, StoreError};
use kintree_server::{KintreeServer, ServerConfig};
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::warn;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Resolves the document path from `--file` or the workspace config.
fn document_path(file: Option<&Path>) -> Result<(PathBuf, KintreeConfig)> {
    let dir = std::env::current_dir()?;
    let config = KintreeConfig::load(&dir)?;
    let path = match file {
        Some(file) => file.to_path_buf(),
        None => config.document_path(&dir),
    };
    Ok((path, config))
}

/// Loads the document into an engine.
fn open(file: Option<&Path>) -> Result<(EngineContext, PathBuf)> {
    let (path, config) = document_path(file)?;
    if !path.exists() {
        return Err(format!(
            "No family document at {} (run `kintree init` first)",
            path.display()
        )
        .into());
    }
    let document = FamilyDocument::load(&path)?;
    let engine = EngineContext::new(document).with_layout(config.layout);
    Ok((engine, path))
}

fn save(engine: &EngineContext, path: &Path) -> Result<()> {
    engine.document().save(path)?;
    Ok(())
}

/// Asks a yes/no question on stdin. Anything but `y`/`yes` means no.
fn confirm(question: &str) -> Result<bool> {
    print!("{} {} ", question, "[y/N]".dimmed());
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes"
    ))
}

fn label(engine: &EngineContext, id: &str) -> String {
    match engine.store().person(id) {
        Some(person) => format!("{} ({})", person.name, id),
        None => id.to_string(),
    }
}

/// Initialize a workspace in a directory.
pub fn init(path: &Path, title: &str) -> Result<()> {
    let config_path = KintreeConfig::path(path);
    let config = if config_path.exists() {
        println!("{} Config already present", "✓".green());
        KintreeConfig::load(path)?
    } else {
        let config = KintreeConfig::default();
        config.save(path)?;
        config
    };

    let document_path = config.document_path(path);
    if document_path.exists() {
        println!("{} Using existing {}", "✓".green(), document_path.display());
    } else {
        FamilyDocument::new(title).save(&document_path)?;
        println!(
            "{} Created {} ({})",
            "✓".green(),
            document_path.display(),
            title.cyan()
        );
    }

    println!("  Run {} to add the first person", "kintree add-person".cyan());
    Ok(())
}

/// Render the tree and print it level by level.
pub fn show(file: Option<&Path>, root: Option<&str>, collapse: &[String], json: bool) -> Result<()> {
    let (mut engine, _) = open(file)?;

    for id in collapse {
        if engine.store().person(id).is_none() {
            warn!("Cannot collapse unknown person {}", id);
            continue;
        }
        if !engine.is_collapsed(id) {
            engine.toggle_collapse(id);
        }
    }

    let positions = match root {
        Some(root) => engine.render(root)?,
        None => engine.render_default()?,
    };
    let edges = engine.rendered_edges(&positions);

    if json {
        let output = serde_json::json!({
            "root": root.or_else(|| engine.default_root()),
            "positions": positions.positions,
            "levels": positions.levels,
            "edges": edges,
            "collapsed": engine.collapsed(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", engine.document().meta.title.cyan().bold());
    println!();
    for line in level_lines(&engine, &positions) {
        println!("{}", line);
    }
    println!();
    println!(
        "{} people, {} links drawn",
        positions.len().to_string().cyan(),
        edges.len().to_string().cyan()
    );

    Ok(())
}

/// One line per generation: `  -1  Name (id), Name (id)`.
fn level_lines(engine: &EngineContext, positions: &PositionMap) -> Vec<String> {
    positions
        .levels
        .iter()
        .map(|(level, ids)| {
            let names: Vec<String> = ids
                .iter()
                .map(|id| {
                    let name = label(engine, id);
                    if engine.is_collapsed(id) {
                        format!("{} [+]", name)
                    } else {
                        name
                    }
                })
                .collect();
            format!("  {:>3}  {}", level, names.join(", "))
        })
        .collect()
}

fn apply_details(mut fields: PersonFields, details: PersonArgs) -> PersonFields {
    if let Some(gender) = details.gender {
        fields.gender = Gender::from(gender.as_str());
    }
    if !details.aliases.is_empty() {
        fields.aliases = details.aliases;
    }
    if details.born.is_some() {
        fields.birth_year = details.born;
    }
    if details.died.is_some() {
        fields.death_year = details.died;
    }
    if details.notes.is_some() {
        fields.notes = details.notes;
    }
    fields
}

/// Editable fields of `person`, with any flags given on the command line
/// applied on top.
fn edited_fields(person: &Person, name: Option<String>, details: PersonArgs) -> PersonFields {
    let current = PersonFields {
        id: None,
        name: name.unwrap_or_else(|| person.name.clone()),
        gender: person.gender.clone(),
        aliases: person.aliases.clone(),
        birth_year: person.birth_year,
        death_year: person.death_year,
        notes: person.notes.clone(),
    };
    apply_details(current, details)
}

/// Add a person.
pub fn add_person(
    file: Option<&Path>,
    name: String,
    id: Option<String>,
    details: PersonArgs,
) -> Result<()> {
    let (mut engine, path) = open(file)?;
    let fields = apply_details(
        PersonFields {
            id,
            ..PersonFields::named(name)
        },
        details,
    );

    let id = engine.add_person(fields)?;
    save(&engine, &path)?;

    println!("{} Added {}", "✓".green(), label(&engine, &id).cyan());
    if engine.document().meta.root_person_id.as_deref() == Some(id.as_str())
        && engine.document().people.len() == 1
    {
        println!("  {} is the root of the tree", id);
    }
    Ok(())
}

/// Edit a person in place.
pub fn edit_person(
    file: Option<&Path>,
    id: &str,
    name: Option<String>,
    details: PersonArgs,
) -> Result<()> {
    let (mut engine, path) = open(file)?;
    let person = engine
        .store()
        .person(id)
        .ok_or_else(|| StoreError::PersonNotFound(id.to_string()))?;
    let fields = edited_fields(person, name, details);

    engine.update_person(id, fields)?;
    save(&engine, &path)?;

    println!("{} Updated {}", "✓".green(), label(&engine, id).cyan());
    Ok(())
}

/// Delete a person after confirmation.
pub fn remove_person(file: Option<&Path>, id: &str, yes: bool) -> Result<()> {
    let (mut engine, path) = open(file)?;
    let impact = engine.deletion_impact(id)?;

    println!(
        "{} Deleting {} also removes {} relationship(s):",
        "⚠".yellow(),
        label(&engine, id).cyan(),
        impact.relationships.len()
    );
    for rel in &impact.relationships {
        println!("  • {} {}", rel.kind(), rel.key());
    }
    if impact.was_root {
        match &impact.new_root {
            Some(new_root) => println!("  Root moves to {}", label(&engine, new_root)),
            None => println!("  The tree will have no root"),
        }
    }

    if !yes && !confirm("Delete?")? {
        println!("Aborted");
        return Ok(());
    }

    engine.delete_person(id)?;
    save(&engine, &path)?;
    println!("{} Deleted {}", "✓".green(), id);
    Ok(())
}

/// One line per parent link that `link_parents` would overwrite.
fn existing_parent_links(
    engine: &EngineContext,
    father: Option<&str>,
    mother: Option<&str>,
    child: &str,
) -> Vec<String> {
    father
        .into_iter()
        .chain(mother)
        .filter_map(|parent| {
            engine.find_existing_relationship(&RelationshipKey::parent_child(parent, child))
        })
        .map(|rel| {
            let mut line = rel.key().to_string();
            if let Relationship::ParentChild(link) = rel {
                line.push_str(if link.biological {
                    " (biological)"
                } else {
                    " (not biological)"
                });
            }
            if let Some(notes) = rel.notes() {
                line.push_str(&format!(", notes: {}", notes));
            }
            line
        })
        .collect()
}

/// Link a child to one or two parents.
pub fn link_parents(
    file: Option<&Path>,
    father: Option<&str>,
    mother: Option<&str>,
    child: &str,
    biological: bool,
    notes: Option<String>,
    force: bool,
    yes: bool,
) -> Result<()> {
    let (mut engine, path) = open(file)?;

    let existing = existing_parent_links(&engine, father, mother, child);
    if !existing.is_empty() && !yes {
        println!("{} Already recorded:", "⚠".yellow());
        for line in &existing {
            println!("  • {}", line);
        }
        if !confirm("Overwrite?")? {
            println!("Aborted");
            return Ok(());
        }
    }

    let outcomes = match engine.add_parents(father, mother, child, biological, notes.clone(), force)
    {
        Err(StoreError::WouldCreateCycle { parent, .. }) => {
            println!(
                "{} {} would become their own ancestor through {}",
                "⚠".yellow(),
                label(&engine, child).cyan(),
                label(&engine, &parent).cyan()
            );
            if !confirm("Store the link anyway?")? {
                println!("Aborted");
                return Ok(());
            }
            engine.add_parents(father, mother, child, biological, notes, true)?
        }
        result => result?,
    };
    save(&engine, &path)?;

    for (parent, outcome) in father.into_iter().chain(mother).zip(outcomes) {
        println!(
            "{} {} {} -> {}",
            "✓".green(),
            outcome,
            label(&engine, parent),
            label(&engine, child)
        );
    }
    Ok(())
}

/// Link two spouses.
pub fn link_spouse(
    file: Option<&Path>,
    a: &str,
    b: &str,
    start_year: Option<i32>,
    end_year: Option<i32>,
    notes: Option<String>,
    yes: bool,
) -> Result<()> {
    let (mut engine, path) = open(file)?;

    let key = RelationshipKey::spouse(a, b);
    if engine.find_existing_relationship(&key).is_some()
        && !yes
        && !confirm(&format!("{} are already linked. Overwrite?", key))?
    {
        println!("Aborted");
        return Ok(());
    }

    let outcome = engine.add_or_update_spouse(a, b, start_year, end_year, notes)?;
    save(&engine, &path)?;

    println!(
        "{} {} {} <-> {}",
        "✓".green(),
        outcome,
        label(&engine, a),
        label(&engine, b)
    );
    Ok(())
}

/// Remove a relationship.
pub fn unlink(file: Option<&Path>, a: &str, b: &str, spouse: bool) -> Result<()> {
    let (mut engine, path) = open(file)?;
    let key = if spouse {
        RelationshipKey::spouse(a, b)
    } else {
        RelationshipKey::parent_child(a, b)
    };

    engine.delete_relationship(&key)?;
    save(&engine, &path)?;
    println!("{} Removed {}", "✓".green(), key);
    Ok(())
}

/// Report whether a parent-child link would close an ancestry loop.
pub fn check_cycle(file: Option<&Path>, parent: &str, child: &str) -> Result<()> {
    let (engine, _) = open(file)?;

    if engine.check_cycle(parent, child) {
        println!(
            "{} {} -> {} would make {} their own ancestor",
            "✗".red(),
            parent,
            child,
            child.cyan()
        );
    } else {
        println!("{} {} -> {} is safe", "✓".green(), parent, child);
    }
    Ok(())
}

/// Search people by name, id or alias.
pub fn search(file: Option<&Path>, term: &str, limit: usize) -> Result<()> {
    let (engine, _) = open(file)?;
    let matches = engine.search(term);

    if matches.is_empty() {
        println!("No matches found for \"{}\"", term);
        return Ok(());
    }

    println!("Found {} matches:\n", matches.len());
    for person in matches.iter().take(limit) {
        let years = match (person.birth_year, person.death_year) {
            (None, None) => String::new(),
            (birth, death) => format!(
                "({}-{})",
                birth.map(|y| y.to_string()).unwrap_or_default(),
                death.map(|y| y.to_string()).unwrap_or_default()
            ),
        };
        println!(
            "  {} {} {}",
            person.id.yellow(),
            person.display_name().cyan(),
            years.dimmed()
        );
    }
    if matches.len() > limit {
        println!("  ... and {} more", matches.len() - limit);
    }
    Ok(())
}

/// Change the default root.
pub fn set_root(file: Option<&Path>, id: &str) -> Result<()> {
    let (mut engine, path) = open(file)?;
    engine.set_root(id)?;
    save(&engine, &path)?;
    println!("{} Root is now {}", "✓".green(), label(&engine, id).cyan());
    Ok(())
}

/// Show the document title and notes, changing them first when asked.
pub fn meta(file: Option<&Path>, title: Option<String>, notes: Option<String>) -> Result<()> {
    let (mut engine, path) = open(file)?;

    if title.is_some() || notes.is_some() {
        engine.update_meta(title, notes);
        save(&engine, &path)?;
        println!("{} Updated document details", "✓".green());
    }

    let meta = &engine.document().meta;
    println!("  {} {}", "Title:".dimmed(), meta.title);
    if !meta.notes.is_empty() {
        println!("  {} {}", "Notes:".dimmed(), meta.notes);
    }
    Ok(())
}

/// Show document status.
pub fn status(file: Option<&Path>) -> Result<()> {
    let (path, _) = document_path(file)?;
    if !path.exists() {
        println!("{} No family document at {}", "✗".red(), path.display());
        println!("  Run {} to create one", "kintree init".cyan());
        return Ok(());
    }
    let (engine, _) = open(file)?;
    let doc = engine.document();

    println!("{}", "Kintree Status".cyan().bold());
    println!();
    println!("  {} {}", "Document:".dimmed(), path.display());
    println!("  {} {}", "Title:".dimmed(), doc.meta.title);
    println!("  {} {}", "People:".dimmed(), doc.people.len());
    println!("  {} {}", "Relationships:".dimmed(), doc.relationships.len());
    println!(
        "  {} {}",
        "Root:".dimmed(),
        engine
            .default_root()
            .map(|id| label(&engine, id))
            .unwrap_or_else(|| "none".to_string())
    );
    if let Some(modified) = &doc.meta.modified {
        println!("  {} {}", "Modified:".dimmed(), modified);
    }

    let issues = engine.issues();
    if issues.is_empty() {
        println!("\n{} No integrity problems", "✓".green());
    } else {
        println!("\n{} {} integrity problem(s):", "⚠".yellow(), issues.len());
        for issue in &issues {
            println!("  • {}", issue);
        }
    }
    Ok(())
}

/// Start the Kintree server.
pub async fn serve(file: Option<&Path>, port: u16, headless: bool, read_only: bool) -> Result<()> {
    let bind_addr = if headless { "0.0.0.0" } else { "127.0.0.1" };

    if headless {
        println!("{}", "Starting Kintree server in headless mode...".cyan());
    } else {
        println!("{}", "Starting Kintree server...".cyan());
    }

    let (engine, path) = open(file)?;
    println!(
        "{} Loaded {} people and {} relationships",
        "✓".green(),
        engine.document().people.len(),
        engine.document().relationships.len()
    );

    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;
    let config = ServerConfig {
        addr,
        document_path: if read_only { None } else { Some(path) },
    };
    let server = KintreeServer::new(engine, config);

    println!("{} Listening on ws://{}:{}", "✓".green(), bind_addr, port);
    if read_only {
        println!("  Read-only: edits are kept in memory");
    }
    println!("  Press {} to stop", "Ctrl+C".cyan());

    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_edited_fields_keep_unset_values() {
        let person = Person::new("rani", "Rani Hakim")
            .with_aliases(vec!["JaiKishori Razdan".into()])
            .with_years(Some(1940), None);
        let details = PersonArgs {
            died: Some(2010),
            ..PersonArgs::default()
        };

        let fields = edited_fields(&person, None, details);
        assert_eq!(fields.name, "Rani Hakim");
        assert_eq!(fields.aliases, vec!["JaiKishori Razdan".to_string()]);
        assert_eq!(fields.birth_year, Some(1940));
        assert_eq!(fields.death_year, Some(2010));
        assert_eq!(fields.id, None);
    }

    #[test]
    fn test_apply_details_gender_and_aliases() {
        let details = PersonArgs {
            gender: Some("female".into()),
            aliases: vec!["Bunty".into()],
            ..PersonArgs::default()
        };
        let fields = apply_details(PersonFields::named("Aneeta"), details);
        assert_eq!(fields.gender, Gender::Female);
        assert_eq!(fields.aliases, vec!["Bunty".to_string()]);
    }

    #[test]
    fn test_existing_parent_links_describe_overwrites() {
        let mut engine = EngineContext::new(FamilyDocument::new("Test"));
        for name in ["Dad", "Mum", "Kid"] {
            engine.add_person(PersonFields::named(name)).unwrap();
        }
        engine
            .add_or_update_parent_child("mum", "kid", false, Some("step-mother".into()))
            .unwrap();

        let lines = existing_parent_links(&engine, Some("dad"), Some("mum"), "kid");
        assert_eq!(
            lines,
            vec!["mum -> kid (not biological), notes: step-mother".to_string()]
        );
        assert!(existing_parent_links(&engine, Some("dad"), None, "kid").is_empty());
    }

    #[test]
    fn test_meta_updates_document_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("family.json");
        FamilyDocument::new("Family Tree").save(&path).unwrap();

        meta(Some(path.as_path()), Some("Hakim family".into()), None).unwrap();
        meta(Some(path.as_path()), None, Some("Dates from Nani".into())).unwrap();

        let doc = FamilyDocument::load(&path).unwrap();
        assert_eq!(doc.meta.title, "Hakim family");
        assert_eq!(doc.meta.notes, "Dates from Nani");
    }

    #[test]
    fn test_level_lines_mark_collapsed() {
        let mut engine = EngineContext::new(FamilyDocument::new("Test"));
        engine.add_person(PersonFields::named("Dad")).unwrap();
        engine.add_person(PersonFields::named("Kid")).unwrap();
        engine
            .add_or_update_parent_child("dad", "kid", true, None)
            .unwrap();
        engine.toggle_collapse("dad");

        let positions = engine.render("dad").unwrap();
        let lines = level_lines(&engine, &positions);
        assert_eq!(lines, vec!["    0  Dad (dad) [+]".to_string()]);
    }
}
