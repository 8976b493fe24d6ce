use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tot_reasoning::{
    config::{Config, GeneratorKind, LogFormat},
    langbase::LangbaseClient,
    server::{AppState, McpServer},
    tot::{SearchStrategy, TreeOfThoughts},
};

/// Tree-of-Thoughts reasoning engine
#[derive(Debug, Parser)]
#[command(name = "tot-reasoning", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the MCP server on stdio (default)
    Serve,
    /// Solve one problem and print the response as JSON
    Solve {
        /// Problem statement
        problem: String,
        /// breadth-first, depth-first or best-first
        #[arg(long)]
        strategy: Option<SearchStrategy>,
        #[arg(long)]
        max_depth: Option<usize>,
        #[arg(long)]
        branching_factor: Option<usize>,
        #[arg(long)]
        pruning_threshold: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        generator = ?config.reasoning.generator,
        "Tree-of-Thoughts reasoning starting..."
    );

    let engine = match TreeOfThoughts::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "Failed to initialize reasoning engine");
            return Err(e.into());
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, engine).await,
        Command::Solve {
            problem,
            strategy,
            max_depth,
            branching_factor,
            pruning_threshold,
        } => {
            let mut session_config = *engine.defaults();
            if let Some(strategy) = strategy {
                session_config = session_config.with_strategy(strategy);
            }
            if let Some(depth) = max_depth {
                session_config = session_config.with_max_depth(depth);
            }
            if let Some(branching) = branching_factor {
                session_config = session_config.with_branching_factor(branching);
            }
            if let Some(threshold) = pruning_threshold {
                session_config = session_config.with_pruning_threshold(threshold);
            }

            let session_id = uuid::Uuid::new_v4().to_string();
            let response = engine
                .generate_response(&session_id, &problem, Some(session_config))
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

async fn serve(config: Config, engine: TreeOfThoughts) -> anyhow::Result<()> {
    // Provision the thought pipe up front so the first tool call does not pay for it.
    if config.reasoning.generator == GeneratorKind::Langbase {
        if let Some(langbase_config) = &config.langbase {
            let client = LangbaseClient::new(langbase_config, config.request.clone())?;
            info!(base_url = %client.base_url(), "Ensuring thought pipe exists...");
            if let Err(e) = client.ensure_thought_pipe(&config.pipes.thoughts).await {
                error!(error = %e, "Failed to ensure thought pipe exists");
                return Err(e.into());
            }
        }
    }

    let state = Arc::new(AppState::new(config, engine));
    let server = McpServer::new(state);

    info!("Server ready, waiting for requests on stdin...");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Logs go to stderr; stdout carries protocol or result output only.
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
