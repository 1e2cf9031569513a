//! CLI command definitions for the `chatwire` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod auth;
pub mod chat;
pub mod conversation;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Stream chat replies from the command line.
#[derive(Parser)]
#[command(name = "chatwire", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Chat endpoint, overriding config.toml.
    #[arg(long, global = true, env = "CHATWIRE_ENDPOINT")]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message and stream the reply.
    Send {
        /// Message text.
        message: String,

        /// Continue this conversation instead of the active one.
        #[arg(long, short, conflicts_with = "new")]
        conversation: Option<String>,

        /// Start a new conversation.
        #[arg(long)]
        new: bool,
    },

    /// Interactive chat session.
    Chat {
        /// Conversation to open.
        #[arg(long, short)]
        conversation: Option<String>,
    },

    /// List conversations.
    #[command(alias = "ls")]
    List,

    /// Show the messages of a conversation.
    Show {
        /// Conversation identifier.
        id: String,
    },

    /// Delete a conversation and its stored messages.
    #[command(alias = "rm")]
    Delete {
        /// Conversation identifier.
        id: String,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },

    /// Rename a conversation (an empty title resets it).
    Rename {
        /// Conversation identifier.
        id: String,

        /// New title.
        title: String,
    },

    /// Save a bearer token for chat requests.
    Login {
        /// Token value; prompted for when omitted.
        token: Option<String>,
    },

    /// Forget the saved bearer token.
    Logout,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
