//! Sleuth Control - chat with a local model that can research the web
//!
//! With no subcommand, starts the REPL.

use anyhow::Result;
use clap::{Parser, Subcommand};
use sleuth_common::Config;
use std::path::PathBuf;
use tracing::info;

use sleuthctl::errors::{exit_code_for, EXIT_SUCCESS};
use sleuthctl::input::{parse_user_input, UserInput};
use sleuthctl::output::display_error;
use sleuthctl::repl::{run_repl, run_turn};
use sleuthctl::{logging, Session};

#[derive(Parser)]
#[command(name = "sleuthctl")]
#[command(about = "Sleuth - local assistant with iterative web research", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: $SLEUTH_CONFIG, then the user and system paths)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question and exit
    Ask {
        /// Research the question on the web first
        #[arg(long, short)]
        search: bool,

        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Print the effective configuration
    Config,
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        None => {
            let session = Session::from_config(&config)?;
            run_repl(&session).await
        }
        Some(Commands::Ask { search, words }) => {
            let text = words.join(" ");
            let input = if search {
                UserInput::Search(text)
            } else {
                parse_user_input(&text)
            };
            let session = Session::from_config(&config)?;
            run_turn(&session, input).await?;
            Ok(())
        }
        Some(Commands::Config) => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(path) = logging::init(cli.debug) {
        info!(
            "sleuthctl v{} starting, logging to {}",
            env!("CARGO_PKG_VERSION"),
            path.display()
        );
    }

    let code = match run(cli).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            display_error(&format!("{:#}", e));
            exit_code_for(&e)
        }
    };
    std::process::exit(code);
}
