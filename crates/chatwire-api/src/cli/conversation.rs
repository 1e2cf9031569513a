//! Conversation management commands: list, show, delete, rename.

use std::io::{self, Write};

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;

use chatwire_types::conversation::{Conversation, Message, Sender};

use crate::state::AppState;

/// Longest preview shown for a message in `show`.
const PREVIEW_CHARS: usize = 200;

/// List conversations, most recent first, marking the active one.
pub fn list_conversations(state: &AppState, json: bool) -> Result<()> {
    let store = state.controller.store();
    let conversations = store.conversations();

    if json {
        println!("{}", serde_json::to_string_pretty(conversations)?);
        return Ok(());
    }

    if conversations.is_empty() {
        println!();
        println!(
            "  {} No conversations yet. Start one with: {}",
            style("i").blue().bold(),
            style("chatwire chat").yellow()
        );
        println!();
        return Ok(());
    }

    let mut stdout = io::stdout();
    write_conversation_table(&mut stdout, state)?;
    Ok(())
}

/// Write the conversation list as a table, marking the active entry.
pub(crate) fn write_conversation_table(out: &mut impl Write, state: &AppState) -> io::Result<()> {
    let store = state.controller.store();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("").fg(Color::White),
        Cell::new("ID").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for conversation in store.conversations() {
        let active = store.current_id() == Some(conversation.id.as_str());
        table.add_row(vec![
            Cell::new(if active { "*" } else { "" }).fg(Color::Green),
            id_cell(conversation),
            Cell::new(&conversation.title),
            Cell::new(conversation.updated_at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }

    writeln!(out)?;
    writeln!(out, "{table}")?;
    writeln!(out)
}

fn id_cell(conversation: &Conversation) -> Cell {
    if conversation.pending {
        Cell::new(format!("{} (unsent)", conversation.id)).fg(Color::DarkGrey)
    } else {
        Cell::new(&conversation.id)
    }
}

/// Print the messages of a conversation. Makes it the active one.
pub fn show_conversation(state: &mut AppState, id: &str, json: bool) -> Result<()> {
    let store = state.controller.store_mut();
    if !store.switch_to(id) {
        bail!("conversation '{id}' not found");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(store.messages())?);
        return Ok(());
    }

    let title = store
        .current_conversation()
        .map(|c| c.title.clone())
        .unwrap_or_default();
    let mut stdout = io::stdout();
    writeln!(stdout)?;
    writeln!(stdout, "  {} {}", style("#").dim(), style(title).bold())?;
    writeln!(stdout)?;
    for message in store.messages() {
        write_message(&mut stdout, message)?;
    }
    Ok(())
}

pub(crate) fn write_message(out: &mut impl Write, message: &Message) -> io::Result<()> {
    let label = match message.sender {
        Sender::User => style("You").green().bold(),
        Sender::Assistant => style("Assistant").cyan().bold(),
    };
    writeln!(
        out,
        "  {} {}",
        label,
        style(message.timestamp.format("%H:%M").to_string()).dim()
    )?;
    writeln!(out, "  {}", preview(&message.content))?;
    writeln!(out)
}

fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Delete a conversation, asking first unless `force`.
pub fn delete_conversation(state: &mut AppState, id: &str, force: bool, json: bool) -> Result<()> {
    let store = state.controller.store_mut();
    let Some(conversation) = store.conversation(id) else {
        bail!("conversation '{id}' not found");
    };

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete '{}'?", conversation.title))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  {}", style("Cancelled.").dim());
            return Ok(());
        }
    }

    store.delete_conversation(id);

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!();
        println!("  {} Deleted {}", style("✓").green().bold(), style(id).cyan());
        println!();
    }
    Ok(())
}

/// Rename a conversation.
pub fn rename_conversation(state: &mut AppState, id: &str, title: &str, json: bool) -> Result<()> {
    let store = state.controller.store_mut();
    if !store.rename_conversation(id, title) {
        bail!("conversation '{id}' not found");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&store.conversation(id))?);
    } else if let Some(conversation) = store.conversation(id) {
        println!();
        println!(
            "  {} Renamed to {}",
            style("✓").green().bold(),
            style(&conversation.title).cyan()
        );
        println!();
    }
    Ok(())
}
