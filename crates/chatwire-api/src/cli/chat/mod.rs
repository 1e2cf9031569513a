//! Chat commands: one-shot `send` and the interactive loop.
//!
//! Both run turns through [`render_turn`], which renders fragments as they
//! are applied. A cancelled reply is not an error.

pub mod commands;
pub mod input;
pub mod loop_runner;

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use chatwire_core::chat::TurnOutcome;
use chatwire_types::error::StreamError;

use crate::state::AppState;

/// How a rendered turn went.
pub struct TurnReport {
    pub outcome: Result<TurnOutcome, StreamError>,
    pub reply: String,
}

/// Run one turn, printing the reply to stdout as it streams unless `silent`.
///
/// Ctrl+C cancels the reply.
pub async fn stream_turn(state: &mut AppState, text: &str, silent: bool) -> TurnReport {
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let mut stdout = io::stdout();
    let report = render_turn(state, text, &cancel, (!silent).then_some(&mut stdout)).await;
    watcher.abort();
    report
}

/// Drive one turn until it ends or `cancel` fires, writing the reply to
/// `out` as fragments are applied. Nothing is written when `out` is `None`.
pub(crate) async fn render_turn<W: Write>(
    state: &mut AppState,
    text: &str,
    cancel: &CancellationToken,
    mut out: Option<&mut W>,
) -> TurnReport {
    let spinner = out.is_some().then(thinking_spinner);
    let mut reply = String::new();
    let mut started = false;

    let turn = state.controller.begin_turn(text);
    let outcome = state
        .controller
        .drive_with(turn, cancel, |fragment| {
            reply.push_str(fragment);
            let Some(out) = out.as_mut() else {
                return;
            };
            if !started {
                started = true;
                if let Some(spinner) = &spinner {
                    spinner.finish_and_clear();
                }
                let _ = write!(out, "\n  {} ", style("Assistant").cyan().bold());
            }
            let _ = write!(out, "{fragment}");
            let _ = out.flush();
        })
        .await;

    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    if let Some(out) = out.as_mut() {
        if started {
            let _ = writeln!(out);
        }
        if matches!(outcome, Ok(TurnOutcome::Cancelled)) {
            let _ = writeln!(out, "  {}", style("(reply cancelled)").dim());
        }
        let _ = writeln!(out);
    }

    TurnReport { outcome, reply }
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Print a failed turn to stderr, with a login hint for auth failures.
pub fn report_error(err: &StreamError) {
    let _ = write_error(&mut io::stderr(), err);
}

pub(crate) fn write_error(out: &mut impl Write, err: &StreamError) -> io::Result<()> {
    writeln!(out, "  {} {err}", style("!").red().bold())?;
    if err.is_unauthenticated() {
        writeln!(
            out,
            "  {}",
            style("Run `chatwire login <token>` and try again.").dim()
        )?;
    }
    Ok(())
}

/// `chatwire send`: one turn against the chosen conversation.
pub async fn send(
    state: &mut AppState,
    message: &str,
    conversation: Option<&str>,
    new: bool,
    json: bool,
) -> Result<()> {
    if message.trim().is_empty() {
        bail!("message must not be empty");
    }

    let store = state.controller.store_mut();
    if let Some(id) = conversation {
        if !store.switch_to(id) {
            bail!("conversation '{id}' not found");
        }
    } else if new {
        store.start_new_conversation();
    }

    let report = stream_turn(state, message, json).await;
    let conversation_id = state.controller.store().current_id().map(str::to_string);

    match report.outcome {
        Ok(outcome) => {
            if json {
                let out = serde_json::json!({
                    "conversationId": conversation_id,
                    "reply": report.reply,
                    "cancelled": outcome == TurnOutcome::Cancelled,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            Ok(())
        }
        Err(err) => {
            if !json {
                report_error(&err);
            }
            Err(err.into())
        }
    }
}
