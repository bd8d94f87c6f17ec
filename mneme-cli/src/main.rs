//! Mneme CLI - Command-line tools for bounded conversation buffers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mneme_core::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "mneme")]
#[command(about = "Bounded conversation memory for language-model prompts", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat using the configured provider
    Chat {
        /// Maximum number of rows kept in the buffer
        #[arg(short, long)]
        capacity: Option<i64>,

        /// Enable rolling summaries over this many raw turns
        #[arg(short, long)]
        summary_window: Option<usize>,

        /// Snapshot file to restore from and autosave to
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Scripted offline conversation with the echo provider
    Demo {
        #[arg(short, long, default_value_t = 6)]
        capacity: i64,

        #[arg(short, long, default_value_t = 4)]
        summary_window: usize,

        /// Number of user messages to send
        #[arg(short, long, default_value_t = 8)]
        turns: usize,
    },
    /// Print the rendered window stored in a snapshot
    Render {
        #[arg(long)]
        snapshot: PathBuf,

        /// plain or annotated
        #[arg(short, long, default_value = "plain")]
        mode: RenderMode,
    },
    /// List the rows stored in a snapshot
    Inspect {
        #[arg(long)]
        snapshot: PathBuf,

        /// Print the raw snapshot JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            capacity,
            summary_window,
            snapshot,
        } => chat(capacity, summary_window, snapshot).await?,
        Commands::Demo {
            capacity,
            summary_window,
            turns,
        } => demo(capacity, summary_window, turns).await?,
        Commands::Render { snapshot, mode } => {
            let buffer = load_buffer(&snapshot)?;
            println!("{}", buffer.render(mode));
        }
        Commands::Inspect { snapshot, json } => inspect(&snapshot, json)?,
        Commands::Version => {
            println!("mneme {}", env!("CARGO_PKG_VERSION"));
            println!("mneme-core {}", mneme_core::VERSION);
        }
    }

    Ok(())
}

async fn chat(
    capacity: Option<i64>,
    summary_window: Option<usize>,
    snapshot: Option<PathBuf>,
) -> Result<()> {
    let mut config = MnemeConfig::load()?;
    if let Some(capacity) = capacity {
        config.buffer.capacity = capacity;
    }
    if let Some(window) = summary_window {
        config.summary.enabled = true;
        config.summary.window_size = window;
    }
    if let Some(path) = snapshot {
        config.persistence = PersistenceConfig {
            autosave: true,
            path: Some(path),
        };
    }

    let provider = LLMProviderFactory::from_config(config.llm.as_ref())?;
    let info = provider.model_info();
    tracing::info!(provider = %info.provider, model = %info.model_name, "starting chat");

    let session = if config.persistence.path.is_some() {
        ChatSession::restore(&config, provider)?
    } else {
        ChatSession::new(&config, provider)?
    };
    let mut session = session.with_observer(Arc::new(LoggingObserver));

    println!("Commands: /render /annotated /clear /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/render" => println!("{}", session.render(RenderMode::Plain)?),
            "/annotated" => println!("{}", session.render(RenderMode::Annotated)?),
            "/clear" => {
                session.clear().await?;
                println!("(cleared)");
            }
            text => match session.chat(text).await {
                Ok(reply) => println!("{}", reply),
                Err(e) => eprintln!("error: {}", e),
            },
        }
    }

    if let Some(error) = session.last_persist_error() {
        eprintln!("warning: last snapshot was not saved: {}", error);
    }
    session.end();
    Ok(())
}

async fn demo(capacity: i64, summary_window: usize, turns: usize) -> Result<()> {
    let config = ConfigBuilder::new()
        .capacity(capacity)
        .system_prompt("You are a terse assistant.")
        .summary(SummaryConfig::with_window(summary_window))
        .build()?;

    let mut session = ChatSession::new(&config, Arc::new(EchoProvider::new()))?
        .with_id("demo")
        .with_observer(Arc::new(LoggingObserver));

    for i in 1..=turns {
        let reply = session.chat(&format!("message {}", i)).await?;
        println!("user: message {}\n{}", i, reply);
    }

    let buffer = session.buffer()?;
    println!(
        "\n{} of {} rows used, next position {}\n",
        buffer.len(),
        buffer.capacity(),
        buffer.next_position()
    );
    println!("{}", session.render(RenderMode::Annotated)?);
    Ok(())
}

fn load_buffer(path: &Path) -> Result<TurnBuffer> {
    let snapshot = SnapshotStore::new(path)
        .load()
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    Ok(snapshot.restore()?)
}

fn inspect(path: &Path, json: bool) -> Result<()> {
    if json {
        let snapshot = SnapshotStore::new(path).load()?;
        let value = serde_json::to_value(&snapshot)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let buffer = load_buffer(path)?;
    println!(
        "capacity {}  rows {}  next position {}",
        buffer.capacity(),
        buffer.len(),
        buffer.next_position()
    );
    if let Some(prompt) = buffer.system_prompt() {
        println!("system prompt: {}", prompt);
    }

    for turn in buffer.turns() {
        let coverage = turn
            .coverage()
            .map(|c| {
                format!(
                    " [covers {}..={} of {}]",
                    c.covered_from, c.covered_through, c.window_size
                )
            })
            .unwrap_or_default();
        println!(
            "{:>5}  {:<9} {}{}",
            turn.position,
            turn.role.as_str(),
            turn.text,
            coverage
        );
    }
    Ok(())
}
