use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "storyvault",
    bin_name = "storyvault",
    version,
    disable_help_subcommand = true
)]
#[command(about = "Keep, merge and back up story databases", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Data directory (defaults to STORYVAULT_DATA, then the OS data directory)
    #[arg(long, global = true, help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Print the structured outcome as JSON
    #[arg(long, global = true, help_heading = "Options")]
    pub json: bool,

    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, help_heading = "Options")]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty database and make it current
    #[command(alias = "new", display_order = 1)]
    Create { name: String },

    /// Load a database by name, or from a JSON file with --file
    #[command(display_order = 2)]
    Load {
        /// Database name, or a path when --file is given
        name: String,

        /// Treat NAME as a file path (or a name in the database directory)
        #[arg(long, short = 'f')]
        file: bool,
    },

    /// Make another database current without changing it
    #[command(alias = "use", display_order = 3)]
    Switch { name: String },

    /// List databases
    #[command(alias = "ls", display_order = 4)]
    List,

    /// Show the current database
    #[command(display_order = 5)]
    Status,

    /// Import a JSON document
    #[command(display_order = 10)]
    Import {
        path: PathBuf,

        /// Merge into the current database instead of creating a new one
        #[arg(long, short = 'm')]
        merge: bool,
    },

    /// Export the current database to a JSON document
    #[command(display_order = 11)]
    Export {
        /// File or directory (defaults to the documents directory)
        destination: Option<PathBuf>,
    },

    /// Save the current database
    #[command(display_order = 12)]
    Save,

    /// Write a timestamped backup of the current database
    #[command(display_order = 13)]
    Backup {
        /// List backups instead of writing one
        #[arg(long, short = 'l')]
        list: bool,

        /// Database whose backups to list (defaults to the current one)
        #[arg(long, requires = "list")]
        name: Option<String>,
    },

    /// Delete a database and its file
    #[command(alias = "rm-db", display_order = 14)]
    Delete { name: String },

    /// Add or replace a record (JSON object, or a plain string for titles, series, books, roles)
    #[command(display_order = 20)]
    Add {
        /// Collection (e.g. characters, plot, world-element, titles)
        collection: String,

        /// Record as JSON, or plain text for string collections
        record: String,
    },

    /// Remove a record by id (or by value for string collections)
    #[command(display_order = 21)]
    Remove { collection: String, id: String },

    /// Manage tags
    #[command(display_order = 22)]
    Tag {
        #[command(subcommand)]
        action: Option<TagCommands>,
    },

    /// Check the current database for consistency problems
    #[command(display_order = 30)]
    Doctor {
        /// Give records without an id a fresh one
        #[arg(long)]
        fix_ids: bool,
    },

    /// Show resolved directories
    #[command(display_order = 31)]
    Paths,

    /// Show configuration values
    #[command(display_order = 32)]
    Config {
        /// Configuration key (e.g. max_backups); all keys when omitted
        key: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TagCommands {
    /// List tags
    #[command(alias = "ls")]
    List,

    /// Create a tag
    Create {
        name: String,

        /// Display color (e.g. #ff8800)
        #[arg(long)]
        color: Option<String>,
    },

    /// Rename a tag, keeping its id and references
    Rename { tag: String, new_name: String },

    /// Delete a tag and remove it from every record
    Delete { tag: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("storyvault").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_import_merge_flag() {
        let cli = parse(&["import", "doc.json", "--merge"]);
        match cli.command {
            Some(Commands::Import { path, merge }) => {
                assert_eq!(path, PathBuf::from("doc.json"));
                assert!(merge);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = parse(&["list", "--json", "-vv", "--data", "/tmp/sv"]);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.data, Some(PathBuf::from("/tmp/sv")));
    }

    #[test]
    fn test_backup_name_requires_list() {
        let result = Cli::try_parse_from(["storyvault", "backup", "--name", "Novel"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_naked_invocation() {
        assert!(parse(&[]).command.is_none());
    }

    #[test]
    fn test_tag_rename() {
        let cli = parse(&["tag", "rename", "villain", "Antagonist"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Tag {
                action: Some(TagCommands::Rename { .. })
            })
        ));
    }
}
