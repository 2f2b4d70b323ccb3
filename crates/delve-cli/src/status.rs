//! `delve status` — show configuration, budgets and which keys are set.

use anyhow::Result;
use colored::Colorize;

use delve_core::config::{get_config_path, load_config};

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "🔎 Delve Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, using defaults)".red().to_string()
        }
    );

    // Provider
    let provider = &config.provider;
    println!("  {:<18} {}", "Model:".bold(), provider.model);
    println!("  {:<18} {}", "API base:".bold(), provider.api_base.dimmed());
    println!(
        "  {:<18} {}",
        "Provider key:".bold(),
        key_status(&provider.api_key, "GLM_API_KEY")
    );
    println!(
        "  {:<18} {} | max_tokens: {}",
        "Parameters:".bold(),
        format!("temp: {}", provider.temperature).dimmed(),
        format!("{}", provider.max_tokens).dimmed(),
    );

    // Budgets
    let agent = &config.agent;
    println!(
        "  {:<18} calls: {} | context: {} tokens | window: {} turns",
        "Budgets:".bold(),
        agent.call_budget,
        agent.context_budget,
        agent.recent_window,
    );

    // Tools
    let tools = &config.tools;
    println!();
    println!("  {}", "Tools:".bold());
    println!(
        "    {:<20} {}",
        "Serper (search)",
        key_status(&tools.serper.api_key, "SERPER_KEY_ID")
    );
    println!(
        "    {:<20} {}",
        "Jina (visit)",
        key_status(&tools.jina.api_key, "JINA_API_KEY")
    );
    println!(
        "    {:<20} {}",
        "Sandbox endpoint",
        if tools.sandbox.endpoint.is_empty() {
            key_status("", "SANDBOX_FUSION_ENDPOINT")
        } else {
            tools.sandbox.endpoint.clone()
        }
    );
    println!(
        "    {:<20} {}",
        "Research tool",
        if tools.research.enabled {
            "enabled".green().to_string()
        } else {
            "disabled".dimmed().to_string()
        }
    );

    println!();

    Ok(())
}

/// Whether a key is set in the config or in its fallback env var.
fn key_status(configured: &str, env_var: &str) -> String {
    if !configured.is_empty() {
        format!("{} (key set)", "✓".green())
    } else if std::env::var(env_var).map(|v| !v.is_empty()).unwrap_or(false) {
        format!("{} (from {env_var})", "✓".green())
    } else {
        format!("{}", "· not configured".dimmed())
    }
}
