use std::path::{Path, PathBuf};

use alice_config::Config;
use alice_core::{Agent, UiWriter, UserInput};
use alice_providers::{Dialect, LLMProvider};
use anyhow::Result;
use chrono::Local;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, error, info, warn};

mod tui;
mod ui_writer_impl;
use tui::SimpleOutput;
use ui_writer_impl::ConsoleUiWriter;

const HISTORY_FILE: &str = ".alice_history";

#[derive(Parser)]
#[command(name = "alice")]
#[command(about = "A terminal assistant for locally hosted language models")]
#[command(
    long_about = "A terminal assistant for locally hosted language models.\n\n\
    Configuration comes from the environment (LLM_COMPLETIONS_URL, MODEL_NAME, ...), \
    a .env file in the working directory, or the TOML file named by ALICE_CONFIG."
)]
#[command(version)]
pub struct Cli {}

pub async fn run() -> Result<()> {
    let _cli = Cli::parse();

    let config = Config::load()?;
    init_logging(&config.logging.level);
    info!("Starting Alice");

    let agent = Agent::new(config, ConsoleUiWriter::new())?;
    run_interactive(agent).await
}

fn init_logging(level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run_interactive<W: UiWriter>(mut agent: Agent<W>) -> Result<()> {
    let output = SimpleOutput::new();
    print_banner(&agent, &output);

    let mut rl = DefaultEditor::new()?;

    let history_file = history_path();
    if let Some(ref history_path) = history_file {
        let _ = rl.load_history(history_path);
    }

    loop {
        let prompt = prompt_for(agent.executor().cwd());

        match rl.readline(&prompt) {
            Ok(line) => {
                let input = match UserInput::parse(&line) {
                    UserInput::Empty => continue,
                    UserInput::Exit => {
                        output.print("👋 Goodbye!");
                        break;
                    }
                    UserInput::Clear => {
                        agent.clear_history();
                        output.print("✨ Conversation history cleared.");
                        continue;
                    }
                    UserInput::Message(input) => input,
                };

                if let Err(e) = rl.add_history_entry(&input) {
                    debug!("Could not add history entry: {}", e);
                }

                run_turn(&mut agent, &input, &output).await;
            }
            Err(ReadlineError::Interrupted) => {
                output.print("\n👋 Interrupted. Goodbye!");
                break;
            }
            Err(ReadlineError::Eof) => {
                output.print("\n👋 Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(ref history_path) = history_file {
        if let Err(e) = rl.save_history(history_path) {
            warn!("Failed to save history to {}: {}", history_path.display(), e);
        }
    }

    Ok(())
}

/// One turn, abandoned (history untouched) if the user presses Ctrl-C.
async fn run_turn<W: UiWriter>(agent: &mut Agent<W>, input: &str, output: &SimpleOutput) {
    tokio::select! {
        outcome = agent.run_turn(input) => {
            debug!(
                "Turn finished after {} iteration(s), limit hit: {}",
                outcome.iterations, outcome.hit_limit
            );
        }
        _ = tokio::signal::ctrl_c() => {
            output.print("\n⚠️  Response interrupted");
        }
    }
}

fn print_banner<W: UiWriter>(agent: &Agent<W>, output: &SimpleOutput) {
    let config = agent.config();
    let provider = agent.provider();
    let executor = agent.executor();

    let function_calling = if config.agent.use_function_calling {
        "enabled"
    } else {
        "disabled (inline commands)"
    };
    let context = config
        .agent
        .max_context
        .map_or_else(|| "unknown".to_string(), |max| format!("{} tokens", max));

    let rows = [
        ("Platform", executor.platform().name().to_string()),
        ("Model", provider.model().to_string()),
        ("Server", Dialect::host(provider.endpoint())),
        ("Endpoint", provider.endpoint().to_string()),
        ("Dialect", provider.name().to_string()),
        ("Session", agent.session_id().to_string()),
        ("Started", Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        ("Directory", executor.cwd().display().to_string()),
        ("Tool calling", function_calling.to_string()),
        ("Context", context),
    ];

    output.print_banner("🤖 Alice, your local terminal assistant", &rows);
    output.print("Type 'exit', 'quit' or 'bye' to leave, 'clear' to forget the conversation.");
    output.print("Commands are only run after you confirm them.");
    output.print("");
}

fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(HISTORY_FILE))
}

/// `You [<cwd basename>]: `
fn prompt_for(cwd: &Path) -> String {
    let name = cwd
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| cwd.display().to_string());
    format!("You [{}]: ", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_prompt_uses_directory_name() {
        assert_eq!(prompt_for(Path::new("/home/alice/projects")), "You [projects]: ");
        assert_eq!(prompt_for(Path::new("/")), "You [/]: ");
    }

    #[test]
    fn test_cli_takes_no_arguments() {
        Cli::command().debug_assert();
        assert!(Cli::try_parse_from(["alice"]).is_ok());
        assert!(Cli::try_parse_from(["alice", "--model", "x"]).is_err());
    }
}
