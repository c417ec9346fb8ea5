//! Command-line interface for wellspring.
//!
//! Provides an interactive chat loop, single-turn invocation for
//! scripting, and session inspection commands.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{CannedCompletion, CompletionService, HttpCompletion, KeywordUnderstanding};
use crate::config::{self, CoachConfig};
use crate::core::{ResponseStream, SessionCoordinator};
use crate::domain::TurnResponse;
use crate::store::SqliteStore;

/// wellspring - health and wellness coaching agent
#[derive(Parser, Debug)]
#[command(name = "wellspring")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat with the coach
    Chat {
        /// Session to continue (a new one is created if absent)
        #[arg(short, long, default_value = "default")]
        session: String,
    },

    /// Run a single turn and print the response as JSON
    Turn {
        /// Session id
        #[arg(short, long, default_value = "default")]
        session: String,

        /// The user's message
        text: String,
    },

    /// Show a session record
    Show {
        /// Session id
        session: String,
    },

    /// List known sessions
    Sessions,

    /// Show resolved configuration (debug)
    Config,
}

fn build_coordinator(config: CoachConfig) -> Result<SessionCoordinator> {
    let db_path = config::sessions_db_path()?;
    let store = Arc::new(SqliteStore::open(&db_path).context("opening session store")?);
    let understanding = Arc::new(KeywordUnderstanding::new(config.routing.clone()));
    let completion: Arc<dyn CompletionService> = match &config.completion_endpoint {
        Some(endpoint) => Arc::new(HttpCompletion::new(endpoint.clone())),
        None => Arc::new(CannedCompletion),
    };
    Ok(SessionCoordinator::new(
        config,
        store,
        understanding,
        completion,
    ))
}

/// Pace between chunks when streaming chat responses
const CHAT_STREAM_PACE: std::time::Duration = std::time::Duration::from_millis(40);

async fn print_response(response: &TurnResponse) -> Result<()> {
    let mut stream = ResponseStream::new(&response.text, CHAT_STREAM_PACE);
    while let Some(chunk) = stream.next_chunk().await {
        print!("{}", chunk);
        io::stdout().flush()?;
    }
    println!();
    for question in &response.follow_up_questions {
        println!("  ? {}", question);
    }
    Ok(())
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = CoachConfig::load_default()?;
        match self.command {
            Commands::Chat { session } => chat(config, &session).await,
            Commands::Turn { session, text } => {
                let coordinator = build_coordinator(config)?;
                let response = coordinator.handle_turn(&session, &text).await?;
                println!("{}", serde_json::to_string_pretty(&response)?);
                Ok(())
            }
            Commands::Show { session } => {
                let coordinator = build_coordinator(config)?;
                let record = coordinator.session(&session).await?;
                println!("{}", serde_json::to_string_pretty(&record)?);
                Ok(())
            }
            Commands::Sessions => {
                let db_path = config::sessions_db_path()?;
                let store = SqliteStore::open(&db_path).context("opening session store")?;
                use crate::store::SessionStore;
                for id in store.list()? {
                    println!("{}", id);
                }
                Ok(())
            }
            Commands::Config => {
                println!("{}", serde_yaml::to_string(&config)?);
                Ok(())
            }
        }
    }
}

async fn chat(config: CoachConfig, session: &str) -> Result<()> {
    let coordinator = build_coordinator(config)?;
    println!("wellspring coach. Type your message, or 'quit' to leave.");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = stdin.lock().lines().next() else {
            break;
        };
        let line = line?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "quit" || text == "exit" {
            break;
        }
        let response = coordinator.handle_turn(session, text).await?;
        print_response(&response).await?;
    }
    Ok(())
}
