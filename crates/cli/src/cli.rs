use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Manage transformation rules and run records through the pipeline.
#[derive(Parser, Debug)]
#[command(name = "transflow", version, about)]
pub struct Cli {
    /// Directory holding one YAML document per rule (overrides RULES_DIR).
    #[arg(long, global = true)]
    pub rules_dir: Option<PathBuf>,

    /// Directory holding per-rule version history (overrides VERSIONS_DIR).
    #[arg(long, global = true)]
    pub versions_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect and edit rule configurations.
    #[command(subcommand)]
    Rules(RulesCommand),

    /// Inspect, snapshot, and restore rule versions.
    #[command(subcommand)]
    Versions(VersionsCommand),

    /// Transform newline-delimited JSON records.
    Run(RunArgs),
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List every stored rule in execution order.
    List,

    Get { name: String },

    /// Create a rule from a YAML or JSON document.
    Create {
        #[arg(long, short)]
        file: PathBuf,
    },

    /// Apply a partial update given as YAML or JSON.
    Update {
        name: String,
        #[arg(long, short)]
        file: PathBuf,
    },

    Delete { name: String },

    /// Flip a rule between enabled and disabled.
    Toggle { name: String },

    /// Apply a document mapping rule names to partial updates.
    BatchUpdate {
        #[arg(long, short)]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum VersionsCommand {
    List { name: String },

    Get { name: String, version: u64 },

    /// Snapshot the rule's current config.
    Save {
        name: String,
        #[arg(long, short, default_value = "")]
        comment: String,
    },

    /// Restore the rule's config from a stored version.
    Rollback { name: String, version: u64 },

    /// Delete all but the newest versions.
    Cleanup {
        name: String,
        /// Versions to keep (defaults to KEEP_VERSIONS).
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// NDJSON input file, or `-` for stdin.
    #[arg(long, short, default_value = "-")]
    pub input: PathBuf,

    /// Records per window (overrides BATCH_SIZE).
    #[arg(long)]
    pub batch_size: Option<usize>,
}
