//! Delve CLI — entry point.
//!
//! # Commands
//!
//! - `delve research <QUESTION>` — run one research question to an answer
//! - `delve interactive` — ask questions (or run searches) in a REPL
//! - `delve chat` — converse with an assistant that can delegate research
//! - `delve search <QUERY>` — one web or scholar search
//! - `delve tools` — list the registered capabilities
//! - `delve status` — show configuration and key status
//! - `delve onboard` — write a default config file

mod helpers;
mod onboard;
mod repl;
mod search_cmd;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use delve_agent::tools::research::ResearchTool;
use delve_agent::{builtin_registry, ChatAgent, ReasoningLoop};
use delve_core::config::{load_config, Config};
use delve_core::utils::expand_home;
use delve_providers::{Generator, HttpGenerator};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 🔎 Delve — tool-augmented research agent
#[derive(Parser)]
#[command(name = "delve", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a single question and print the answer
    Research {
        /// The research question
        question: String,

        /// Generation call budget (overrides the config)
        #[arg(short, long)]
        budget: Option<u32>,

        /// Write a Markdown report to this file
        #[arg(short, long)]
        save: Option<String>,

        /// Print only the answer
        #[arg(short, long, default_value_t = false)]
        quiet: bool,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Ask research questions (or run searches) interactively
    Interactive {
        /// Generation call budget per question (overrides the config)
        #[arg(short, long)]
        budget: Option<u32>,

        /// What each line does
        #[arg(short, long, value_enum, default_value_t = repl::ReplMode::Research)]
        mode: repl::ReplMode,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Chat with an assistant that delegates deep questions to research
    Chat {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Run one search without the reasoning loop
    Search {
        /// The search query
        query: String,

        /// Search backend
        #[arg(short = 't', long = "type", value_enum, default_value_t = search_cmd::SearchKind::Web)]
        kind: search_cmd::SearchKind,

        /// Print the result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List registered capabilities
    Tools,

    /// Show configuration and key status
    Status,

    /// Write a default config file
    Onboard,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Research {
            question,
            budget,
            save,
            quiet,
            logs,
        } => {
            init_logging(logs);
            run_research(&question, budget, save.as_deref(), quiet).await
        }
        Commands::Interactive { budget, mode, logs } => {
            init_logging(logs);
            let config = load_config(None);
            match mode {
                repl::ReplMode::Research => repl::run(build_agent(&config)?, budget).await,
                repl::ReplMode::Search => repl::run_search(tool_registry(&config)).await,
            }
        }
        Commands::Chat { logs } => {
            init_logging(logs);
            let config = load_config(None);
            repl::run_chat(build_chat_agent(&config)?).await
        }
        Commands::Search { query, kind, json } => {
            init_logging(false);
            let config = load_config(None);
            search_cmd::run(&tool_registry(&config), kind, &query, json).await
        }
        Commands::Tools => {
            init_logging(false);
            list_tools()
        }
        Commands::Status => status::run(),
        Commands::Onboard => onboard::run(),
    }
}

// ─────────────────────────────────────────────
// Research command
// ─────────────────────────────────────────────

async fn run_research(question: &str, budget: Option<u32>, save: Option<&str>, quiet: bool) -> Result<()> {
    let config = load_config(None);
    let agent = build_agent(&config)?;
    let budget = budget.unwrap_or(agent.call_budget());

    info!(question = %question, budget, "starting research");
    if !quiet {
        helpers::print_thinking();
    }

    let outcome = agent
        .run_with_budget(question, budget)
        .await
        .context("research run failed")?;

    if quiet {
        println!("{}", outcome.answer);
    } else {
        helpers::clear_thinking();
        helpers::print_answer(&outcome.answer);
        helpers::print_stats(&outcome);
    }

    if let Some(path) = save {
        let path = expand_home(path);
        let report = helpers::format_report(question, &outcome, &chrono::Local::now().to_rfc3339());
        std::fs::write(&path, report)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        if !quiet {
            println!("  {} report saved to {}", "✓".green(), path.display());
        }
    }

    Ok(())
}

fn build_generator(config: &Config) -> Result<Arc<dyn Generator>> {
    let generator = HttpGenerator::new(&config.provider).context("failed to create the generator")?;
    Ok(Arc::new(generator))
}

/// Build a `ReasoningLoop` from the loaded configuration.
pub fn build_agent(config: &Config) -> Result<ReasoningLoop> {
    let generator = build_generator(config)?;
    let registry = builtin_registry(config, Some(generator.clone()));
    Ok(ReasoningLoop::new(generator, Arc::new(registry), &config.agent))
}

/// Build a `ChatAgent` whose research tool runs a loop over the plain
/// built-in capabilities.
pub fn build_chat_agent(config: &Config) -> Result<ChatAgent> {
    let mut plain = config.clone();
    plain.tools.research.enabled = false;

    let generator = build_generator(config)?;
    let registry = builtin_registry(&plain, Some(generator.clone()));
    let research = ResearchTool::new(Arc::new(ReasoningLoop::new(
        generator.clone(),
        Arc::new(registry),
        &config.agent,
    )));
    Ok(ChatAgent::new(generator, Arc::new(research), &config.agent))
}

/// Built-in capabilities; pages are summarized only when a generator can be
/// built.
fn tool_registry(config: &Config) -> delve_agent::ToolRegistry {
    let generator = HttpGenerator::new(&config.provider)
        .ok()
        .map(|g| Arc::new(g) as Arc<dyn Generator>);
    builtin_registry(config, generator)
}

// ─────────────────────────────────────────────
// Tools command
// ─────────────────────────────────────────────

fn list_tools() -> Result<()> {
    let config = load_config(None);
    let registry = tool_registry(&config);

    println!();
    println!("{}", "🔎 Delve Tools".cyan().bold());
    println!();
    for (name, description) in registry.descriptions() {
        println!("  {:<18} {}", name.bold(), description.dimmed());
    }
    println!();
    Ok(())
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("delve=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
