//! Slash command parsing for the chat loop.

use std::io::{self, Write};

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    Help,
    /// Start a new conversation.
    New,
    /// List conversations.
    List,
    Switch(String),
    Delete(String),
    /// Rename the active conversation.
    Rename(String),
    /// Drop the active conversation's messages.
    Clear,
    Exit,
    /// Unknown command or missing argument.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd.to_lowercase(), arg.trim().to_string()),
        None => (trimmed.to_lowercase(), String::new()),
    };

    let with_arg = |make: fn(String) -> ChatCommand, name: &str| {
        if arg.is_empty() {
            ChatCommand::Unknown(format!("{name} requires an argument"))
        } else {
            make(arg.clone())
        }
    };

    Some(match cmd.as_str() {
        "/help" | "/h" | "/?" => ChatCommand::Help,
        "/new" => ChatCommand::New,
        "/list" | "/ls" => ChatCommand::List,
        "/switch" | "/open" => with_arg(ChatCommand::Switch, "/switch"),
        "/delete" | "/rm" => with_arg(ChatCommand::Delete, "/delete"),
        // An empty title resets to the placeholder.
        "/rename" => ChatCommand::Rename(arg.clone()),
        "/clear" => ChatCommand::Clear,
        "/exit" | "/quit" | "/q" => ChatCommand::Exit,
        other => ChatCommand::Unknown(other.to_string()),
    })
}

/// Write the help text listing all available commands.
pub fn write_help(out: &mut impl Write) -> io::Result<()> {
    let rows = [
        ("/help", "Show this help message"),
        ("/new", "Start a new conversation"),
        ("/list", "List conversations"),
        ("/switch <id>", "Open another conversation"),
        ("/delete <id>", "Delete a conversation"),
        ("/rename <title>", "Rename this conversation"),
        ("/clear", "Clear this conversation's messages"),
        ("/quit", "End the chat session"),
    ];
    writeln!(out)?;
    writeln!(out, "  {}", style("Available commands:").bold())?;
    writeln!(out)?;
    for (cmd, help) in rows {
        writeln!(out, "  {:<16} {}", style(cmd).cyan(), help)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "  {}",
        style("Ctrl+C cancels a reply, Ctrl+D exits").dim()
    )?;
    writeln!(out)
}
