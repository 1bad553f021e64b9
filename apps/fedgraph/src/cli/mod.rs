//! # fedgraph CLI Module
//!
//! Command-line interface over one federated store.
//!
//! ## Available Commands
//!
//! - `serve` - Start the HTTP server
//! - `graphs` - List registered graph ids
//! - `schema` - Print the merged schema
//! - `traits` - Print the traits every graph supports
//! - `add-elements` - Add elements from a JSON file
//! - `get-all` - Print every element, optionally from selected graphs
//! - `remove` - Remove a graph from the loaded federation

mod commands;

use clap::{Parser, Subcommand};
use fedgraph_core::FederationError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// fedgraph - Federated Graph Store
///
/// One logical graph over a live set of independently configured backend
/// graphs.
#[derive(Parser, Debug)]
#[command(name = "fedgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Federation file (TOML); without it the federation starts empty
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory of the file-backed graph library
    #[arg(short, long, global = true)]
    pub library: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// List registered graph ids
    Graphs,

    /// Print the merged schema
    Schema,

    /// Print the traits every graph supports
    Traits,

    /// Add elements from a JSON array file
    AddElements {
        /// Path to the elements file
        #[arg(short, long)]
        file: PathBuf,

        /// Only write to these graphs (comma-separated)
        #[arg(long)]
        graph_ids: Option<String>,
    },

    /// Print every element
    GetAll {
        /// Only read these graphs (comma-separated)
        #[arg(long)]
        graph_ids: Option<String>,
    },

    /// Remove a graph
    Remove {
        /// Graph id to remove
        graph_id: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), FederationError> {
    let sources = StoreSources {
        config: cli.config,
        library: cli.library,
    };
    let json = cli.json;

    match cli.command {
        Some(Commands::Serve { host, port }) => cmd_serve(&sources, &host, port).await,
        Some(Commands::Graphs) | None => cmd_graphs(&sources, json),
        Some(Commands::Schema) => cmd_schema(&sources),
        Some(Commands::Traits) => cmd_traits(&sources, json),
        Some(Commands::AddElements { file, graph_ids }) => {
            cmd_add_elements(&sources, json, &file, graph_ids.as_deref())
        }
        Some(Commands::GetAll { graph_ids }) => cmd_get_all(&sources, json, graph_ids.as_deref()),
        Some(Commands::Remove { graph_id }) => cmd_remove(&sources, json, &graph_id),
    }
}
