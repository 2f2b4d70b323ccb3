//! Interactive REPLs — research questions, direct searches, or a chat.
//!
//! Uses `rustyline` for readline-style editing with persistent history.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use delve_agent::{ChatAgent, ReasoningLoop, ToolRegistry};
use delve_core::types::Arguments;
use delve_core::utils::get_history_path;

use crate::helpers;
use crate::search_cmd::{self, SearchKind};

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "q", "/exit", "/quit", ":q"];

/// What each line of `delve interactive` does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReplMode {
    /// Every line is a research question
    Research,
    /// Lines are searches; `scholar <q>` and `visit <url>` also work
    Search,
}

/// A parsed line of search mode.
#[derive(Debug, PartialEq, Eq)]
enum SearchLine<'a> {
    Help,
    Web(&'a str),
    Scholar(&'a str),
    Visit(&'a str),
}

fn parse_search_line(line: &str) -> Option<SearchLine<'_>> {
    if line.eq_ignore_ascii_case("help") {
        return Some(SearchLine::Help);
    }
    if let Some(rest) = line.strip_prefix("scholar ") {
        let rest = rest.trim();
        return (!rest.is_empty()).then_some(SearchLine::Scholar(rest));
    }
    if let Some(rest) = line.strip_prefix("visit ") {
        let rest = rest.trim();
        return (!rest.is_empty()).then_some(SearchLine::Visit(rest));
    }
    Some(SearchLine::Web(line))
}

// ─────────────────────────────────────────────
// Research mode
// ─────────────────────────────────────────────

/// One research run per line.
pub async fn run(agent: ReasoningLoop, budget: Option<u32>) -> Result<()> {
    helpers::print_banner("Type a research question, or \"exit\" to quit.");

    let budget = budget.unwrap_or(agent.call_budget());
    let mut editor = create_editor()?;

    while let Some(line) = read_line(&mut editor, "Question: ") {
        debug!(question = %line, budget, "running research");
        helpers::print_thinking();

        match agent.run_with_budget(&line, budget).await {
            Ok(outcome) => {
                helpers::clear_thinking();
                helpers::print_answer(&outcome.answer);
                helpers::print_stats(&outcome);
            }
            Err(e) => {
                helpers::clear_thinking();
                eprintln!("\n❌ Error: {e}\n");
            }
        }
    }

    save_history(&mut editor);
    Ok(())
}

// ─────────────────────────────────────────────
// Search mode
// ─────────────────────────────────────────────

/// Direct capability calls, no reasoning loop.
pub async fn run_search(registry: ToolRegistry) -> Result<()> {
    helpers::print_banner("Type a search query, \"help\" for commands, or \"exit\" to quit.");

    let mut editor = create_editor()?;

    while let Some(line) = read_line(&mut editor, "Search: ") {
        let result = match parse_search_line(&line) {
            Some(SearchLine::Help) => {
                print_search_help();
                continue;
            }
            Some(SearchLine::Web(query)) => search_cmd::search(&registry, SearchKind::Web, query).await,
            Some(SearchLine::Scholar(query)) => {
                search_cmd::search(&registry, SearchKind::Scholar, query).await
            }
            Some(SearchLine::Visit(url)) => {
                let Some(goal) = read_line(&mut editor, "Goal: ") else {
                    break;
                };
                visit(&registry, url, &goal).await
            }
            None => continue,
        };

        match result {
            Ok(text) => println!("\n{text}\n"),
            Err(e) => eprintln!("\n❌ Error: {e:#}\n"),
        }
    }

    save_history(&mut editor);
    Ok(())
}

async fn visit(registry: &ToolRegistry, url: &str, goal: &str) -> Result<String> {
    let tool = registry
        .get("visit")
        .ok_or_else(|| anyhow::anyhow!("capability 'visit' is not registered"))?;
    let mut arguments = Arguments::new();
    arguments.insert("url".into(), url.into());
    arguments.insert("goal".into(), goal.into());
    tool.invoke(arguments).await
}

fn print_search_help() {
    println!();
    println!("  {:<18} web search", "<query>".bold());
    println!("  {:<18} Google Scholar search", "scholar <query>".bold());
    println!("  {:<18} read a page toward a goal", "visit <url>".bold());
    println!("  {:<18} show this help", "help".bold());
    println!("  {:<18} leave", "exit".bold());
    println!();
}

// ─────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────

/// Conversation with research delegation. `reset` clears the history.
pub async fn run_chat(mut agent: ChatAgent) -> Result<()> {
    helpers::print_banner("Chat away; ask for research anytime. \"reset\" clears, \"exit\" quits.");

    let mut editor = create_editor()?;

    while let Some(line) = read_line(&mut editor, "You: ") {
        if line.eq_ignore_ascii_case("reset") {
            agent.reset();
            println!("{}", "🔄 Conversation reset.".dimmed());
            continue;
        }

        helpers::print_thinking();
        let reply = agent.chat(&line).await;
        helpers::clear_thinking();
        helpers::print_answer(&reply);

        let stats = agent.stats();
        println!(
            "{}",
            format!("{} turns · {} research runs", stats.turns, stats.research_runs).dimmed()
        );
    }

    save_history(&mut editor);
    Ok(())
}

// ─────────────────────────────────────────────
// Editor
// ─────────────────────────────────────────────

/// Next non-empty line, recorded in history. `None` on exit, EOF or Ctrl-C.
fn read_line(editor: &mut Editor<(), DefaultHistory>, prompt: &str) -> Option<String> {
    loop {
        let input = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => return None,
            Err(e) => {
                eprintln!("Input error: {e}");
                return None;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_exit_command(trimmed) {
            println!("\nGoodbye! 👋");
            return None;
        }

        let _ = editor.add_history_entry(trimmed);
        return Some(trimmed.to_string());
    }
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = get_history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

/// Save history to disk.
fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = get_history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_commands() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("QUIT"));
        assert!(is_exit_command("/quit"));
        assert!(!is_exit_command("exit strategies for startups"));
        assert!(!is_exit_command(""));
    }

    #[test]
    fn search_lines() {
        assert_eq!(parse_search_line("rust async"), Some(SearchLine::Web("rust async")));
        assert_eq!(
            parse_search_line("scholar  transformer models "),
            Some(SearchLine::Scholar("transformer models"))
        );
        assert_eq!(
            parse_search_line("visit https://example.com"),
            Some(SearchLine::Visit("https://example.com"))
        );
        assert_eq!(parse_search_line("HELP"), Some(SearchLine::Help));
        assert_eq!(parse_search_line("scholar   "), None);
    }

    #[test]
    fn history_file_under_data_dir() {
        let path = get_history_path();
        assert!(path.to_string_lossy().contains(".delve"));
        assert!(path.ends_with("history.txt"));
    }
}
