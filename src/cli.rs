use crate::chapter::ListScope;
use crate::selection::{Selection, Selector, SelectorError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "usfm-corpus")]
#[command(about = "Manage aligned USFM translation corpora", long_about = None)]
pub struct Cli {
    #[arg(long, global = true, default_value = ".", help = "Project directory")]
    pub project: PathBuf,

    #[arg(long, global = true, help = "Source language code (overrides config.json)")]
    pub source_language: Option<String>,

    #[arg(long, global = true, help = "Target language code (overrides config.json)")]
    pub target_language: Option<String>,

    #[arg(long, global = true, help = "Log directory (overrides config.json)")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import target-language books into a group
    ImportTarget {
        #[arg(long, help = "Group to import into")]
        group: String,

        #[arg(required = true, help = "USFM files or directories")]
        inputs: Vec<PathBuf>,

        #[arg(long, help = "Replace books already in the group")]
        overwrite: bool,
    },

    /// Attach source-language text to matching books in every group
    ImportSource {
        #[arg(required = true, help = "USFM files or directories")]
        inputs: Vec<PathBuf>,

        #[arg(long = "select", help = "Limit to these selectors (default: everything)")]
        selectors: Vec<String>,
    },

    /// List groups, books, chapters or verses
    List {
        #[arg(long, default_value = "book", value_parser = parse_scope)]
        scope: ListScope,
    },

    /// Remove every selected verse
    Remove {
        #[arg(required = true)]
        selectors: Vec<String>,
    },

    /// Move the selection into a (possibly existing) group
    Rename {
        #[arg(long, help = "Destination group")]
        to: String,

        #[arg(required = true)]
        selectors: Vec<String>,
    },

    /// Write the selected books as USFM, one folder per group
    Export {
        #[arg(long, default_value = "export", help = "Output directory")]
        out: PathBuf,

        #[arg(long, help = "Compress each file with gzip")]
        gzip: bool,

        #[arg(required = true)]
        selectors: Vec<String>,
    },

    /// Show the alignment state of a verse, or apply an edit to it
    Alignment {
        selector: String,

        #[arg(long, help = "JSON file holding the edited alignment")]
        edit: Option<PathBuf>,
    },

    /// Write training or testing samples as JSON
    TrainingData {
        #[arg(long, help = "Collect the verses held out for testing")]
        testing: bool,

        #[arg(long, help = "Output file (default: stdout)")]
        out: Option<PathBuf>,
    },

    /// Record alignment test results from a JSON file
    TestResults { results: PathBuf },

    /// Hold verses out of training, or release them with --release
    Reserve {
        #[arg(long, help = "Clear the flag instead of setting it")]
        release: bool,

        #[arg(required = true)]
        selectors: Vec<String>,
    },

    /// Corpus statistics
    Stats,

    /// Check books without importing them
    Validate {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Write the JSON schemas of the project files
    Schema {
        #[arg(long, default_value = "schema")]
        out: PathBuf,
    },
}

impl Cli {
    pub fn parse() -> Self {
        Parser::parse()
    }
}

fn parse_scope(raw: &str) -> Result<ListScope, String> {
    raw.parse()
}

/// `Group/Book/Chapter/Verse` with trailing parts optional; `*` selects all
pub fn parse_selector(raw: &str) -> Result<Selector, SelectorError> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "*" {
        return Ok(Selector::All);
    }
    let components: Vec<&str> = raw.split('/').map(str::trim).collect();
    Selector::from_components(&components)
}

pub fn parse_selection(raw: &[String]) -> Result<Selection, SelectorError> {
    let selectors = raw
        .iter()
        .map(|s| parse_selector(s))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Selection::new(selectors))
}
