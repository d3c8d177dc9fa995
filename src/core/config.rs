//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.promptcast/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PromptcastConfig {
    #[serde(default)]
    pub transport: TransportSection,
    #[serde(default)]
    pub attribution: AttributionSection,
    #[serde(default)]
    pub improver: ImproverSection,
    #[serde(default)]
    pub targets: Vec<TargetEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TransportSection {
    pub timeout_secs: Option<u64>,
    pub verify_tls: Option<bool>,
    pub use_proxy: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AttributionSection {
    pub referrer: Option<String>,
    pub app_title: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ImproverSection {
    pub enabled: Option<bool>,
    pub target: Option<String>,
}

/// One `[[targets]]` table: a configured provider endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetEntry {
    pub name: String,
    pub url: String,
    /// Name of the env var holding the API key for this endpoint.
    pub credential: String,
    /// Model identifier sent to the API. Defaults to `name` when omitted.
    pub model: Option<String>,
    pub active: Option<bool>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REFERRER: &str = "https://github.com/promptcast/promptcast";
pub const DEFAULT_APP_TITLE: &str = "Promptcast";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub timeout_secs: u64,
    pub verify_tls: bool,
    pub use_proxy: bool,
    pub referrer: String,
    pub app_title: String,
    pub improver_enabled: bool,
    pub improver_target: Option<String>,
    pub targets: Vec<TargetEntry>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.promptcast/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".promptcast").join("config.toml"))
}

/// Load config from `path` if given, else from `~/.promptcast/config.toml`.
///
/// If the default file doesn't exist, generates a commented-out default and
/// returns `PromptcastConfig::default()`. If a file exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config(path: Option<&Path>) -> Result<PromptcastConfig, ConfigError> {
    let path = match path.map(Path::to_path_buf).or_else(config_path) {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(PromptcastConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(PromptcastConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: PromptcastConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &PathBuf) {
    let default_content = r#"# Promptcast Configuration
# All settings are optional — defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [transport]
# timeout_secs = 30
# verify_tls = true      # Turning this off is logged as a security warning
# use_proxy = false      # System/env proxy settings are ignored unless true

# [attribution]
# referrer = "https://github.com/promptcast/promptcast"
# app_title = "Promptcast"

# [improver]
# enabled = true
# target = "openrouter-haiku"   # Name of the target used for prompt improvement

# [[targets]]
# name = "openrouter-haiku"
# url = "https://openrouter.ai/api/v1/chat/completions"
# credential = "OPENROUTER_API_KEY"   # Env var holding the key (.env supported)
# model = "anthropic/claude-3-haiku"
# active = true

# [[targets]]
# name = "deepseek-chat"
# url = "https://api.deepseek.com/chat/completions"
# credential = "DEEPSEEK_API_KEY"
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_timeout` is from the `--timeout` flag (None = not specified).
pub fn resolve(config: &PromptcastConfig, cli_timeout: Option<u64>) -> ResolvedConfig {
    // Timeout: CLI → env → config → default
    let timeout_secs = cli_timeout
        .or_else(|| {
            std::env::var("PROMPTCAST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .or(config.transport.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    // TLS verification: env → config → on
    let verify_tls = env_flag("PROMPTCAST_VERIFY_TLS")
        .or(config.transport.verify_tls)
        .unwrap_or(true);

    // Proxy opt-in: env → config → off
    let use_proxy = env_flag("PROMPTCAST_USE_PROXY")
        .or(config.transport.use_proxy)
        .unwrap_or(false);

    ResolvedConfig {
        timeout_secs,
        verify_tls,
        use_proxy,
        referrer: config
            .attribution
            .referrer
            .clone()
            .unwrap_or_else(|| DEFAULT_REFERRER.to_string()),
        app_title: config
            .attribution
            .app_title
            .clone()
            .unwrap_or_else(|| DEFAULT_APP_TITLE.to_string()),
        improver_enabled: config.improver.enabled.unwrap_or(true),
        improver_target: config.improver.target.clone(),
        targets: config.targets.clone(),
    }
}

/// Parses a boolean env var ("true"/"1"/"yes" vs "false"/"0"/"no").
fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        other => {
            warn!("Ignoring unrecognized value for {}: {:?}", name, other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = PromptcastConfig::default();
        assert!(config.targets.is_empty());
        assert!(config.transport.timeout_secs.is_none());
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let config = PromptcastConfig::default();
        let resolved = resolve(&config, None);
        assert_eq!(resolved.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(resolved.verify_tls);
        assert!(!resolved.use_proxy);
        assert_eq!(resolved.referrer, DEFAULT_REFERRER);
        assert_eq!(resolved.app_title, DEFAULT_APP_TITLE);
        assert!(resolved.improver_enabled);
        assert!(resolved.improver_target.is_none());
    }

    #[test]
    fn test_resolve_config_values_override_defaults() {
        let config = PromptcastConfig {
            transport: TransportSection {
                timeout_secs: Some(5),
                verify_tls: Some(false),
                use_proxy: Some(true),
            },
            improver: ImproverSection {
                enabled: Some(false),
                target: Some("fast-model".to_string()),
            },
            ..Default::default()
        };
        let resolved = resolve(&config, None);
        assert_eq!(resolved.timeout_secs, 5);
        assert!(!resolved.verify_tls);
        assert!(resolved.use_proxy);
        assert!(!resolved.improver_enabled);
        assert_eq!(resolved.improver_target.as_deref(), Some("fast-model"));
    }

    #[test]
    fn test_resolve_cli_timeout_wins() {
        let config = PromptcastConfig {
            transport: TransportSection {
                timeout_secs: Some(5),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = resolve(&config, Some(90));
        assert_eq!(resolved.timeout_secs, 90);
    }

    #[test]
    fn test_full_toml_parses() {
        let toml_str = r#"
[transport]
timeout_secs = 15
verify_tls = false

[attribution]
referrer = "https://example.com"
app_title = "My App"

[improver]
enabled = true
target = "router"

[[targets]]
name = "router"
url = "https://openrouter.ai/api/v1/chat/completions"
credential = "OPENROUTER_API_KEY"
model = "anthropic/claude-3-haiku"

[[targets]]
name = "local"
url = "http://localhost:1234/v1/chat/completions"
credential = "LOCAL_KEY"
active = false
"#;
        let config: PromptcastConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.transport.timeout_secs, Some(15));
        assert_eq!(config.transport.verify_tls, Some(false));
        assert_eq!(config.attribution.app_title.as_deref(), Some("My App"));
        assert_eq!(config.targets.len(), 2);
        assert_eq!(
            config.targets[0].model.as_deref(),
            Some("anthropic/claude-3-haiku")
        );
        assert_eq!(config.targets[1].active, Some(false));
        assert!(config.targets[1].model.is_none());
    }

    #[test]
    fn test_sparse_toml_parses() {
        // Only override one thing — everything else stays default
        let toml_str = r#"
[transport]
timeout_secs = 10
"#;
        let config: PromptcastConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.transport.timeout_secs, Some(10));
        assert!(config.transport.verify_tls.is_none());
        assert!(config.targets.is_empty());
    }
}
