//! Kintree CLI - Command-line interface for Kintree
//!
//! This is the main entry point for users working with a family tree.
//! It provides commands for editing people and relationships, rendering
//! the tree around a root, and serving it to a visual editor.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "kintree")]
#[command(author = "Kintree Contributors")]
#[command(version)]
#[command(about = "Render and edit family trees", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Family document to use (defaults to the one named in .kintree/config.json)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a config and an empty family document
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Title of the new document
        #[arg(short, long, default_value = "Family Tree")]
        title: String,
    },

    /// Lay out the tree around a root and print it
    Show {
        /// Root person id (defaults to the document's root)
        #[arg(short, long)]
        root: Option<String>,

        /// Hide the descendants of these people
        #[arg(short, long)]
        collapse: Vec<String>,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Add a person
    AddPerson {
        /// Full name
        name: String,

        /// Explicit id (generated from the name when omitted)
        #[arg(long)]
        id: Option<String>,

        #[command(flatten)]
        details: PersonArgs,
    },

    /// Change a person's details
    EditPerson {
        /// Id of the person to edit
        id: String,

        /// New full name
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        details: PersonArgs,
    },

    /// Delete a person and every relationship they are part of
    RemovePerson {
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Record the parents of a child
    LinkParents {
        #[arg(long)]
        father: Option<String>,

        #[arg(long)]
        mother: Option<String>,

        #[arg(long)]
        child: String,

        /// Mark the link as non-biological (adoptive, step)
        #[arg(long)]
        adopted: bool,

        #[arg(long)]
        notes: Option<String>,

        /// Store the link even if it makes someone their own ancestor
        #[arg(long)]
        force: bool,

        /// Overwrite existing links without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Record a marriage or partnership
    LinkSpouse {
        a: String,
        b: String,

        /// Year the partnership started
        #[arg(long)]
        from: Option<i32>,

        /// Year the partnership ended
        #[arg(long)]
        until: Option<i32>,

        #[arg(long)]
        notes: Option<String>,

        /// Overwrite an existing record without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove a relationship
    Unlink {
        /// Parent (or first spouse)
        a: String,

        /// Child (or second spouse)
        b: String,

        /// Remove a spouse link instead of a parent-child link
        #[arg(long)]
        spouse: bool,
    },

    /// Check whether a parent-child link would create an ancestry loop
    CheckCycle { parent: String, child: String },

    /// Find people by name, id or alias
    Search {
        term: String,

        /// Maximum results to return
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Change the default root person
    SetRoot { id: String },

    /// Show or change the document title and notes
    Meta {
        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Show document statistics and integrity problems
    Status,

    /// Start the Kintree server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "7432")]
        port: u16,

        /// Headless mode: bind to 0.0.0.0 for remote access
        #[arg(long)]
        headless: bool,

        /// Keep edits in memory instead of writing them back
        #[arg(long)]
        read_only: bool,
    },
}

/// Optional person details shared by add and edit.
#[derive(clap::Args, Debug, Default)]
pub struct PersonArgs {
    /// M, F, or any other value
    #[arg(long)]
    pub gender: Option<String>,

    /// Alternate name (repeatable)
    #[arg(long = "alias")]
    pub aliases: Vec<String>,

    #[arg(long)]
    pub born: Option<i32>,

    #[arg(long)]
    pub died: Option<i32>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let file = cli.file.as_deref();
    let result = match cli.command {
        Commands::Init { path, title } => commands::init(&path, &title),
        Commands::Show {
            root,
            collapse,
            json,
        } => commands::show(file, root.as_deref(), &collapse, json),
        Commands::AddPerson { name, id, details } => commands::add_person(file, name, id, details),
        Commands::EditPerson { id, name, details } => {
            commands::edit_person(file, &id, name, details)
        }
        Commands::RemovePerson { id, yes } => commands::remove_person(file, &id, yes),
        Commands::LinkParents {
            father,
            mother,
            child,
            adopted,
            notes,
            force,
            yes,
        } => commands::link_parents(
            file,
            father.as_deref(),
            mother.as_deref(),
            &child,
            !adopted,
            notes,
            force,
            yes,
        ),
        Commands::LinkSpouse {
            a,
            b,
            from,
            until,
            notes,
            yes,
        } => commands::link_spouse(file, &a, &b, from, until, notes, yes),
        Commands::Unlink { a, b, spouse } => commands::unlink(file, &a, &b, spouse),
        Commands::CheckCycle { parent, child } => commands::check_cycle(file, &parent, &child),
        Commands::Search { term, limit } => commands::search(file, &term, limit),
        Commands::SetRoot { id } => commands::set_root(file, &id),
        Commands::Meta { title, notes } => commands::meta(file, title, notes),
        Commands::Status => commands::status(file),
        Commands::Serve {
            port,
            headless,
            read_only,
        } => commands::serve(file, port, headless, read_only).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
