//! Configuration types and loading.
//!
//! Secrets and the boot mode come from the environment and are required at startup.
//! Everything else (bind address, completion endpoint, system instructions) comes from an
//! optional JSON file (e.g. `~/.chatbridge/config.json`); a missing file means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Operating mode from `MODE`. Selects the request verifier and the default log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootMode {
    /// Bearer-token verification, verbose logging.
    #[default]
    Dev,
    /// Same as dev; used when running the gateway on a workstation.
    Local,
    /// Slack signed-secret verification, info logging.
    Prod,
}

impl BootMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootMode::Dev => "dev",
            BootMode::Local => "local",
            BootMode::Prod => "prod",
        }
    }

    /// True for modes that verify requests with a bearer token instead of a Slack signature.
    pub fn uses_bearer(&self) -> bool {
        matches!(self, BootMode::Dev | BootMode::Local)
    }

    /// Default `env_logger` filter when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            BootMode::Dev | BootMode::Local => "debug",
            BootMode::Prod => "info",
        }
    }
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BootMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "dev" => Ok(BootMode::Dev),
            "local" => Ok(BootMode::Local),
            "prod" => Ok(BootMode::Prod),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

/// Fatal startup configuration problems. Never a per-request condition.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid boot mode: {0} (expected dev, local or prod)")]
    InvalidMode(String),
    #[error("{0} is missing")]
    Missing(&'static str),
}

pub const ENV_MODE: &str = "MODE";
pub const ENV_AUTH_SECRET: &str = "AUTH_SECRET";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_SLACK_API_TOKEN: &str = "SLACK_API_TOKEN";
pub const ENV_DEBUG_CHANNEL: &str = "DEBUG_SLACK_CH_ID";
pub const ENV_CONFIG_PATH: &str = "CHATBRIDGE_CONFIG_PATH";

/// Required secrets plus the boot mode, resolved once at process start.
#[derive(Clone)]
pub struct Credentials {
    pub mode: BootMode,
    /// Bearer token in dev/local, Slack signing secret in prod.
    pub auth_secret: String,
    pub openai_api_key: String,
    pub slack_api_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("mode", &self.mode)
            .field("auth_secret", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .field("slack_api_token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`; blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode: BootMode = lookup(ENV_MODE).unwrap_or_default().parse()?;
        let required = |key: &'static str| {
            non_empty(lookup(key)).ok_or(ConfigError::Missing(key))
        };
        Ok(Self {
            mode,
            auth_secret: required(ENV_AUTH_SECRET)?,
            openai_api_key: required(ENV_OPENAI_API_KEY)?,
            slack_api_token: required(ENV_SLACK_API_TOKEN)?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Top-level file config. Every field has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub slack: SlackConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the webhook listener (default 8080).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Completion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionConfig {
    /// OpenAI-compatible base URL, without the `/chat/completions` suffix.
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    /// System-role entries sent before the user message, in order (persona, answer format).
    #[serde(default)]
    pub instructions: Vec<String>,
}

fn default_completion_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-3.5-turbo".to_string()
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            instructions: Vec::new(),
        }
    }
}

/// Slack Web API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,

    /// Channel the `probe` command posts to. Overridden by DEBUG_SLACK_CH_ID env.
    #[serde(default)]
    pub debug_channel: Option<String>,
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: default_slack_api_base(),
            debug_channel: None,
        }
    }
}

/// Resolve the debug channel: env DEBUG_SLACK_CH_ID overrides config.
pub fn resolve_debug_channel(config: &Config) -> Option<String> {
    non_empty(std::env::var(ENV_DEBUG_CHANNEL).ok())
        .or_else(|| non_empty(config.slack.debug_channel.clone()))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH).map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".chatbridge").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from `path` (or the default path). Missing file => default config.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const FULL: &[(&str, &str)] = &[
        ("AUTH_SECRET", "s3cret"),
        ("OPENAI_API_KEY", "sk-test"),
        ("SLACK_API_TOKEN", "xoxb-test"),
    ];

    #[test]
    fn mode_defaults_to_dev() {
        let creds = Credentials::from_lookup(env(FULL)).unwrap();
        assert_eq!(creds.mode, BootMode::Dev);
        assert!(creds.mode.uses_bearer());
        assert_eq!(creds.auth_secret, "s3cret");
    }

    #[test]
    fn prod_mode_uses_signature() {
        let mut pairs = FULL.to_vec();
        pairs.push(("MODE", "prod"));
        let creds = Credentials::from_lookup(env(&pairs)).unwrap();
        assert_eq!(creds.mode, BootMode::Prod);
        assert!(!creds.mode.uses_bearer());
        assert_eq!(creds.mode.default_log_filter(), "info");
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let mut pairs = FULL.to_vec();
        pairs.push(("MODE", "staging"));
        let err = Credentials::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMode(m) if m == "staging"));
    }

    #[test]
    fn missing_or_blank_secret_is_reported_by_name() {
        let err = Credentials::from_lookup(env(&FULL[1..])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("AUTH_SECRET")));

        let pairs = [
            ("AUTH_SECRET", "s3cret"),
            ("OPENAI_API_KEY", "   "),
            ("SLACK_API_TOKEN", "xoxb-test"),
        ];
        let err = Credentials::from_lookup(env(&pairs)).unwrap_err();
        assert_eq!(err.to_string(), "OPENAI_API_KEY is missing");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = Credentials::from_lookup(env(FULL)).unwrap();
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("s3cret"));
        assert!(!printed.contains("xoxb-test"));
    }

    #[test]
    fn empty_file_config_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.bind, "127.0.0.1");
        assert_eq!(config.completion.model, "gpt-3.5-turbo");
        assert!(config.completion.instructions.is_empty());
        assert_eq!(config.slack.api_base, "https://slack.com/api");
    }

    #[test]
    fn file_config_is_camel_case() {
        let config: Config = serde_json::from_str(
            r#"{
                "completion": { "baseUrl": "http://127.0.0.1:1234/v1", "instructions": ["Be brief."] },
                "slack": { "debugChannel": "C0DEBUG" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.completion.base_url, "http://127.0.0.1:1234/v1");
        assert_eq!(config.completion.instructions, vec!["Be brief.".to_string()]);
        assert_eq!(config.slack.debug_channel.as_deref(), Some("C0DEBUG"));
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!(
            "chatbridge-missing-{}.json",
            uuid::Uuid::new_v4()
        ));
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.gateway.port, 8080);
    }
}
