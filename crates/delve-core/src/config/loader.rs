//! Config loader — reads `~/.delve/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.delve/config.json`
//! 3. Environment variables `DELVE_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `DELVE_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `DELVE_AGENT__CALL_BUDGET`, `DELVE_AGENT__CONTEXT_BUDGET`, `DELVE_AGENT__RECENT_WINDOW`
/// - `DELVE_PROVIDER__API_KEY`, `DELVE_PROVIDER__API_BASE`, `DELVE_PROVIDER__MODEL`
/// - `DELVE_PROVIDER__TEMPERATURE`, `DELVE_PROVIDER__MAX_TOKENS`
/// - `DELVE_TOOLS__SERPER__API_KEY`, `DELVE_TOOLS__JINA__API_KEY`
/// - `DELVE_TOOLS__SANDBOX__ENDPOINT`, `DELVE_TOOLS__RESEARCH__ENABLED`
fn apply_env_overrides(mut config: Config) -> Config {
    // Agent budgets
    override_parsed("DELVE_AGENT__CALL_BUDGET", &mut config.agent.call_budget);
    override_parsed("DELVE_AGENT__CONTEXT_BUDGET", &mut config.agent.context_budget);
    override_parsed("DELVE_AGENT__RECENT_WINDOW", &mut config.agent.recent_window);

    // Provider
    override_string("DELVE_PROVIDER__API_KEY", &mut config.provider.api_key);
    override_string("DELVE_PROVIDER__API_BASE", &mut config.provider.api_base);
    override_string("DELVE_PROVIDER__MODEL", &mut config.provider.model);
    override_parsed("DELVE_PROVIDER__TEMPERATURE", &mut config.provider.temperature);
    override_parsed("DELVE_PROVIDER__MAX_TOKENS", &mut config.provider.max_tokens);

    // Tools
    override_string("DELVE_TOOLS__SERPER__API_KEY", &mut config.tools.serper.api_key);
    override_string("DELVE_TOOLS__JINA__API_KEY", &mut config.tools.jina.api_key);
    override_string("DELVE_TOOLS__SANDBOX__ENDPOINT", &mut config.tools.sandbox.endpoint);
    if let Ok(val) = std::env::var("DELVE_TOOLS__RESEARCH__ENABLED") {
        config.tools.research.enabled = val == "true" || val == "1";
    }

    config
}

fn override_string(var: &str, target: &mut String) {
    if let Ok(val) = std::env::var(var) {
        *target = val;
    }
}

fn override_parsed<T: FromStr>(var: &str, target: &mut T) {
    if let Ok(val) = std::env::var(var) {
        match val.parse::<T>() {
            Ok(v) => *target = v,
            Err(_) => warn!(var = var, value = %val, "ignoring unparsable env override"),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
