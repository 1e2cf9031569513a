//! chatwire command-line entry point.
//!
//! Binary name: `chatwire`
//!
//! Parses CLI arguments, sets up tracing, wires the application state and
//! dispatches to the command handlers.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli);

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "chatwire", &mut std::io::stdout());
        return Ok(());
    }

    let mut state = AppState::init(cli.endpoint.clone()).await?;

    match cli.command {
        Commands::Send {
            message,
            conversation,
            new,
        } => {
            cli::chat::send(&mut state, &message, conversation.as_deref(), new, cli.json).await?;
        }

        Commands::Chat { conversation } => {
            cli::chat::loop_runner::run_chat_loop(&mut state, conversation.as_deref()).await?;
        }

        Commands::List => {
            cli::conversation::list_conversations(&state, cli.json)?;
        }

        Commands::Show { id } => {
            cli::conversation::show_conversation(&mut state, &id, cli.json)?;
        }

        Commands::Delete { id, force } => {
            cli::conversation::delete_conversation(&mut state, &id, force, cli.json)?;
        }

        Commands::Rename { id, title } => {
            cli::conversation::rename_conversation(&mut state, &id, &title, cli.json)?;
        }

        Commands::Login { token } => {
            cli::auth::login(&state, token, cli.json)?;
        }

        Commands::Logout => {
            cli::auth::logout(&state, cli.json)?;
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Configure the tracing subscriber from the CLI flags.
///
/// `RUST_LOG` overrides the verbosity flags. Logs go to stderr so streamed
/// replies on stdout stay clean.
fn init_tracing(cli: &Cli) {
    let level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,chatwire=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
