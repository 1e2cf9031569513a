//! Interactive chat loop.

use std::io::{self, Write};

use anyhow::{Result, anyhow, bail};
use console::style;
use rustyline_async::SharedWriter;
use tokio_util::sync::CancellationToken;

use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::{render_turn, write_error};
use crate::cli::conversation::{write_conversation_table, write_message};
use crate::state::AppState;

/// Run the read-send loop until `/quit` or Ctrl+D.
pub async fn run_chat_loop(state: &mut AppState, conversation: Option<&str>) -> Result<()> {
    if let Some(id) = conversation {
        if !state.controller.store_mut().switch_to(id) {
            bail!("conversation '{id}' not found");
        }
    }

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut input, mut out) =
        ChatInput::new(prompt).map_err(|e| anyhow!("failed to initialize input: {e}"))?;

    print_banner(&mut out, state)?;

    loop {
        let text = match input.read_line().await {
            InputEvent::Eof => break,
            InputEvent::Interrupted => {
                writeln!(out, "  {}", style("Press Ctrl+D or type /quit to exit.").dim())?;
                continue;
            }
            InputEvent::Line(text) => text,
        };
        if text.is_empty() {
            continue;
        }

        if let Some(command) = commands::parse(&text) {
            if !run_command(&mut out, state, command)? {
                break;
            }
            continue;
        }

        if !run_turn(state, &mut input, &mut out, &text).await? {
            break;
        }
    }

    writeln!(out, "  {}", style("Session ended.").dim())?;
    input.flush();
    Ok(())
}

/// Stream one reply while keeping the prompt live: Ctrl+C cancels the reply,
/// Ctrl+D cancels it and ends the session. Returns `false` when the session
/// should end.
async fn run_turn(
    state: &mut AppState,
    input: &mut ChatInput,
    out: &mut SharedWriter,
    text: &str,
) -> io::Result<bool> {
    let cancel = CancellationToken::new();
    let mut reply_out = out.clone();
    let mut keep_going = true;

    let turn = render_turn(state, text, &cancel, Some(&mut reply_out));
    tokio::pin!(turn);

    let report = loop {
        tokio::select! {
            biased;

            report = &mut turn => break report,

            event = input.read_line(), if !cancel.is_cancelled() => match event {
                InputEvent::Interrupted => cancel.cancel(),
                InputEvent::Eof => {
                    keep_going = false;
                    cancel.cancel();
                }
                InputEvent::Line(_) => {
                    let _ = writeln!(
                        out,
                        "  {}",
                        style("Still replying. Ctrl+C cancels the reply.").dim()
                    );
                }
            },
        }
    };

    if let Err(err) = &report.outcome {
        write_error(out, err)?;
        writeln!(out)?;
    }
    Ok(keep_going)
}

/// Apply a slash command. Returns `false` when the loop should end.
fn run_command(out: &mut impl Write, state: &mut AppState, command: ChatCommand) -> Result<bool> {
    match command {
        ChatCommand::Help => commands::write_help(out)?,
        ChatCommand::New => {
            state.controller.store_mut().start_new_conversation();
            writeln!(out, "  {}", style("New conversation.").dim())?;
        }
        ChatCommand::List => {
            if state.controller.store().conversations().is_empty() {
                writeln!(out, "  {}", style("No conversations yet.").dim())?;
            } else {
                write_conversation_table(out, state)?;
            }
        }
        ChatCommand::Switch(id) => {
            let store = state.controller.store_mut();
            if store.switch_to(&id) {
                writeln!(out)?;
                for message in store.messages() {
                    write_message(out, message)?;
                }
            } else {
                writeln!(out, "  {} No conversation '{id}'", style("?").yellow().bold())?;
            }
        }
        ChatCommand::Delete(id) => {
            if state.controller.store_mut().delete_conversation(&id) {
                writeln!(out, "  {} Deleted {id}", style("✓").green().bold())?;
            } else {
                writeln!(out, "  {} No conversation '{id}'", style("?").yellow().bold())?;
            }
        }
        ChatCommand::Rename(title) => {
            let store = state.controller.store_mut();
            match store.current_id().map(str::to_string) {
                Some(id) => {
                    store.rename_conversation(&id, &title);
                    writeln!(out, "  {} Renamed", style("✓").green().bold())?;
                }
                None => writeln!(
                    out,
                    "  {} Nothing to rename until the first message is sent",
                    style("?").yellow().bold()
                )?,
            }
        }
        ChatCommand::Clear => {
            state.controller.store_mut().clear_messages();
            writeln!(out, "  {}", style("Messages cleared.").dim())?;
        }
        ChatCommand::Exit => return Ok(false),
        ChatCommand::Unknown(cmd) => {
            writeln!(
                out,
                "  {} Unknown command: {}. Type /help for available commands.",
                style("?").yellow().bold(),
                style(cmd).dim()
            )?;
        }
    }
    Ok(true)
}

fn print_banner(out: &mut impl Write, state: &AppState) -> io::Result<()> {
    let store = state.controller.store();
    writeln!(out)?;
    writeln!(
        out,
        "  {} {}",
        style("chatwire").cyan().bold(),
        style(&state.config.endpoint).dim()
    )?;
    match store.current_conversation() {
        Some(conversation) => {
            writeln!(
                out,
                "  {} {}",
                style("Continuing:").dim(),
                style(&conversation.title).bold()
            )?;
            writeln!(out)?;
            for message in store.messages() {
                write_message(out, message)?;
            }
        }
        None => {
            writeln!(out, "  {}", style("New conversation. Type /help for commands.").dim())?;
            writeln!(out)?;
        }
    }
    Ok(())
}
