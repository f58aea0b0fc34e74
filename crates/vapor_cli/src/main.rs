//! Vapor CLI
//!
//! Command-line front end for an encrypted Vapor store.
//!
//! # Commands
//!
//! - `write` / `read` / `scan` - Raw key-value access
//! - `index` - Store every object of a JSON array as a document
//! - `search` - Case-insensitive substring search over stored documents
//! - `compact` - Rewrite the log to reclaim space
//! - `clean` - Delete the store

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Vapor encrypted store tools.
#[derive(Parser)]
#[command(name = "vapor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Passphrase the store key is derived from
    #[arg(global = true, long, env = "VAPOR_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// Keep the log in an encrypted paged file
    #[arg(global = true, long)]
    paged: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set a key to a value
    Write {
        /// Key to write
        key: String,
        /// Value to store
        value: String,
    },

    /// Print the value of a key
    Read {
        /// Key to read
        key: String,
    },

    /// List keys and values in order
    Scan {
        /// Only list keys starting with this prefix
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Store every object of a JSON array under `<provider_id>/<id>`
    Index {
        /// JSON file holding an array of objects
        json_file: PathBuf,
    },

    /// Find stored documents containing a string
    Search {
        /// Text to look for, case-insensitive
        query: String,

        /// Only search documents of this provider
        #[arg(long)]
        provider: Option<String>,
    },

    /// Compact the log
    Compact {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete the store directory
    Clean,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let path = cli.path.ok_or("Store path required (--path)")?;
    if let Commands::Clean = cli.command {
        return commands::clean::run(&path);
    }

    let passphrase = cli
        .passphrase
        .ok_or("Passphrase required (--passphrase or VAPOR_PASSPHRASE)")?;
    let store = commands::open_store(&path, &passphrase, cli.paged)?;

    let result = match cli.command {
        Commands::Write { key, value } => commands::kv::write(&store, &key, &value),
        Commands::Read { key } => commands::kv::read(&store, &key),
        Commands::Scan { prefix } => commands::kv::scan(&store, &prefix),
        Commands::Index { json_file } => commands::index::run(&store, &json_file),
        Commands::Search { query, provider } => {
            commands::search::run(&store, &query, provider.as_deref())
        }
        Commands::Compact { format } => commands::compact::run(&store, &format),
        Commands::Clean => Ok(()),
    };

    store.close()?;
    result
}
