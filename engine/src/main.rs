// Entry point for the burrow binary.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use burrow_engine::agent::Agent;
use burrow_engine::config::Config;
use burrow_engine::llm::OpenAIProvider;
use burrow_engine::memory::WindowBufferMemory;
use burrow_engine::telemetry::init_telemetry;
use burrow_engine::tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "burrow", version, about = "Tool-using Telegram assistant")]
struct Cli {
    /// Path to the config file (default: ~/.burrow/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Telegram webhook server
    Serve {
        /// Override the bind address from config
        #[arg(long)]
        bind: Option<String>,
    },

    /// Chat with the agent on the terminal
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load()?
    };

    // The subscriber installs once, so it waits for the configured level.
    // Config errors before this point surface on stderr via anyhow.
    init_telemetry(&config.core.log_level);

    tracing::info!("Burrow v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve { bind } => burrow_engine::server::run(config, bind).await,
        Command::Chat => run_repl(config).await,
    }
}

/// Terminal REPL over in-process memory; history is lost on exit.
async fn run_repl(config: Config) -> anyhow::Result<()> {
    let provider = Arc::new(OpenAIProvider::new(config.llm.clone()));
    let memory = Box::new(WindowBufferMemory::with_window_size(
        config.memory.window_size,
    ));
    let mut agent = Agent::new(
        provider,
        memory,
        ToolRegistry::with_builtins(),
        config.llm.temperature,
    )
    .await?;

    println!("Type 'quit' to exit.");
    let stdin = std::io::stdin();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") {
            break;
        }

        match agent.process(line).await {
            Ok(reply) => println!("Agent: {}", reply),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}
