//! a3s-agent - chat with a remote reasoning agent from the terminal
//!
//! Streams the agent's reasoning trace to stderr as collapsible units and
//! its answer to stdout as it arrives.

use a3s_agent_stream::transport::memory::{ScriptedTransport, ScriptedTurn};
use a3s_agent_stream::{
    AgentConfig, AgentTransport, ConsoleObserver, HttpTransport, Session, SessionManager,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "a3s-agent")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Streaming chat client for a remote reasoning agent")]
struct Cli {
    /// Configuration file path (.json)
    #[arg(short, long, env = "A3S_AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Agent id (overrides config and environment)
    #[arg(long)]
    agent_id: Option<String>,

    /// Agent alias id (overrides config and environment)
    #[arg(long)]
    agent_alias_id: Option<String>,

    /// Agent gateway endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Run a single prompt and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Replay a recorded NDJSON event stream instead of calling the agent
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Print every trace unit expanded
    #[arg(long)]
    expand: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// Recorded stream re-queued before every turn
struct Replay {
    transport: Arc<ScriptedTransport>,
    recording: String,
}

impl Replay {
    fn rearm(&self) {
        self.transport
            .push_turn(ScriptedTurn::from_ndjson(&self.recording));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("a3s_agent_stream={}", cli.log_level).into()),
        )
        .with_writer(io::stderr)
        .without_time()
        .init();

    let mut config = match &cli.config {
        Some(path) => AgentConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AgentConfig::default(),
    }
    .merge_env();

    if let Some(id) = cli.agent_id.clone() {
        config.agent_id = id;
    }
    if let Some(alias) = cli.agent_alias_id.clone() {
        config.agent_alias_id = alias;
    }
    if let Some(endpoint) = cli.endpoint.clone() {
        config.transport.endpoint = Some(endpoint);
    }

    let mut replay = None;
    let transport: Arc<dyn AgentTransport> = match &cli.replay {
        Some(path) => {
            let recording = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            if config.agent_id.is_empty() {
                config.agent_id = "replay".to_string();
            }
            if config.agent_alias_id.is_empty() {
                config.agent_alias_id = "replay".to_string();
            }
            let scripted = Arc::new(ScriptedTransport::new());
            replay = Some(Replay {
                transport: scripted.clone(),
                recording,
            });
            scripted
        }
        None => Arc::new(HttpTransport::new(config.transport.clone())?),
    };

    let manager = SessionManager::new(config, transport)?;
    let session = manager.initialize();
    let observer = if cli.expand {
        ConsoleObserver::expand_all()
    } else {
        ConsoleObserver::new()
    };

    if let Some(prompt) = &cli.prompt {
        return run_prompt(&manager, &session, &observer, replay.as_ref(), prompt).await;
    }

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if prompt == "/exit" || prompt == "/quit" {
            break;
        }

        run_prompt(&manager, &session, &observer, replay.as_ref(), prompt).await?;
    }

    Ok(())
}

async fn run_prompt(
    manager: &SessionManager,
    session: &Session,
    observer: &ConsoleObserver,
    replay: Option<&Replay>,
    prompt: &str,
) -> Result<()> {
    if let Some(replay) = replay {
        replay.rearm();
    }

    // Completed answers and classified failures are printed by the observer
    manager
        .run_turn(session, prompt, observer)
        .await
        .context("turn failed")?;
    Ok(())
}
