//! Config loader — reads `~/.relaybot/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.relaybot/config.json`
//! 3. Environment variables (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default data directory (`~/.relaybot`), falling back to a relative dir
/// when no home directory can be determined.
pub fn get_data_path() -> PathBuf {
    if let Ok(home) = std::env::var("RELAYBOT_HOME") {
        return PathBuf::from(home);
    }
    home_dir()
        .map(|h| h.join(".relaybot"))
        .unwrap_or_else(|| PathBuf::from(".relaybot"))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be
/// parsed. Never panics.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

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

/// Apply environment variable overrides on top of a loaded config.
///
/// Supported overrides:
/// - `ANTHROPIC_API_KEY` → `provider.api_key`
/// - `ANTHROPIC_API_BASE` → `provider.api_base`
/// - `RELAYBOT_MODEL` → `agent.model`
/// - `RELAYBOT_MAX_TOKENS` → `agent.max_tokens`
/// - `RELAYBOT_SYSTEM_PROMPT` → `agent.system_prompt`
/// - `RELAYBOT_SANDBOX_DIR` → `tools.sandbox_dir`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("ANTHROPIC_API_KEY") {
        config.provider.api_key = val;
    }
    if let Ok(val) = std::env::var("ANTHROPIC_API_BASE") {
        config.provider.api_base = Some(val);
    }
    if let Ok(val) = std::env::var("RELAYBOT_MODEL") {
        config.agent.model = val;
    }
    if let Ok(val) = std::env::var("RELAYBOT_MAX_TOKENS") {
        if let Ok(n) = val.parse::<u32>() {
            config.agent.max_tokens = n;
        }
    }
    if let Ok(val) = std::env::var("RELAYBOT_SYSTEM_PROMPT") {
        config.agent.system_prompt = val;
    }
    if let Ok(val) = std::env::var("RELAYBOT_SANDBOX_DIR") {
        config.tools.sandbox_dir = val;
    }
    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config(Some(Path::new("/nonexistent/config.json")));
        assert_eq!(config.agent.max_tokens, 4096);
    }

    #[test]
    fn test_invalid_json_yields_defaults() {
        let file = write_temp_json("{not json");
        let config = load_config(Some(file.path()));
        assert_eq!(config.agent.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_file_values_override_defaults() {
        let file = write_temp_json(
            r#"{"agent": {"model": "claude-opus-4-20250514", "maxTokens": 1024}}"#,
        );
        let config = load_config(Some(file.path()));
        assert_eq!(config.agent.model, "claude-opus-4-20250514");
        assert_eq!(config.agent.max_tokens, 1024);
        // Untouched sections keep defaults
        assert_eq!(config.agent.tool_timeout_secs, 30);
    }
}
