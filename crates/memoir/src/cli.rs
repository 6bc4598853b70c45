//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Client memory CLI
///
/// Inspect per-client memory and drive context/finalize by hand.
#[derive(Parser, Debug)]
#[command(name = "memoir")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Client management (list, new)
    Clients(ClientsCommand),

    /// Show stored memory for a client
    Show(ShowCommand),

    /// Prepare the memory context for a message
    Context {
        /// Client ID
        client: String,
        /// The client's current message
        message: String,
        /// Output the bundle as JSON instead of rendered text
        #[arg(short, long)]
        json: bool,
    },

    /// Finalize a session from a transcript file
    Finalize {
        /// Client ID
        client: String,
        /// JSON array of {"role", "text"} turns
        transcript: PathBuf,
        /// Output the report as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ClientsCommand {
    #[command(subcommand)]
    pub action: ClientsAction,
}

#[derive(Subcommand, Debug)]
pub enum ClientsAction {
    /// List clients with stored memory
    List,

    /// Create a new client with an empty profile
    New {
        /// Client ID (generated if omitted)
        id: Option<String>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Show Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ShowCommand {
    #[command(subcommand)]
    pub action: ShowAction,
}

#[derive(Subcommand, Debug)]
pub enum ShowAction {
    /// Show the client profile
    Profile {
        client: String,
        #[arg(short, long)]
        json: bool,
    },

    /// Show themes and progress markers
    Themes {
        client: String,
        #[arg(short, long)]
        json: bool,
    },

    /// List session summaries
    Sessions {
        client: String,
        #[arg(short, long)]
        json: bool,
    },

    /// Show one session record
    Session {
        client: String,
        /// Session index (1-based)
        index: u32,
        #[arg(short, long)]
        json: bool,
    },
}
