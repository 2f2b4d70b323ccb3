//! Shared CLI helpers — answer printing, reports, progress placeholder.

use colored::Colorize;

use delve_agent::{RunOutcome, Termination};

/// Print a research answer to stdout.
pub fn print_answer(answer: &str) {
    println!();
    println!("{}", "🔎 Delve".cyan().bold());
    if answer.is_empty() {
        println!("{}", "(no answer)".dimmed());
    } else {
        println!("{answer}");
    }
    println!();
}

/// One dimmed line of run statistics.
pub fn print_stats(outcome: &RunOutcome) {
    let line = format!(
        "{} generation calls · {} tool executions · {}",
        outcome.generation_calls,
        outcome.tool_executions,
        termination_label(outcome.termination),
    );
    println!("{}", line.dimmed());
}

fn termination_label(termination: Termination) -> &'static str {
    match termination {
        Termination::Answered => "answered",
        Termination::BudgetExhausted => "budget exhausted",
    }
}

/// Markdown report written by `research --save`.
pub fn format_report(question: &str, outcome: &RunOutcome, timestamp: &str) -> String {
    format!(
        "# Research Report\n\n\
         **Question:** {question}\n\n\
         **Generated:** {timestamp}\n\n\
         ## Answer\n\n{}\n\n\
         ## Statistics\n\n\
         - Generation calls: {}\n\
         - Tool executions: {}\n\
         - Transcript turns: {}\n\
         - Termination: {}\n",
        outcome.answer,
        outcome.generation_calls,
        outcome.tool_executions,
        outcome.transcript.len(),
        termination_label(outcome.termination),
    )
}

/// Print the banner shown at REPL start, with a one-line usage hint.
pub fn print_banner(hint: &str) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "🔎 Delve".cyan().bold(), version.dimmed());
    println!("{}", hint.dimmed());
    println!();
}

/// Print a "researching" placeholder while a run is in progress.
pub fn print_thinking() {
    eprint!("{}", "⠿ researching...".dimmed());
}

/// Clear the placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
