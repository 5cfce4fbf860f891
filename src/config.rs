//! Runtime configuration for prompt-relay.
//!
//! Configuration is layered: built-in defaults, then an optional JSON file,
//! then command-line flags (each of which can also come from the environment).
//! The result is built once at startup and shared read-only.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Command-line arguments.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "prompt-relay", about = "Streaming relay for chat completions")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, env = "RELAY_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// API key for the upstream provider.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Upstream model identifier.
    #[arg(long, env = "OPENAI_MODEL")]
    pub model: Option<String>,

    /// System instruction injected ahead of every conversation.
    #[arg(long, env = "SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// Upstream base URL.
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// HTTP listen host.
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// HTTP listen port.
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Upstream provider configuration.
    pub upstream: UpstreamConfig,

    /// Prompt shaping.
    pub prompt: PromptConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen host.
    pub host: String,

    /// Listen port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 6002,
        }
    }
}

/// Upstream completion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL; `/v1/chat/completions` is appended.
    pub base_url: String,

    /// Bearer credential. Required at startup.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Model identifier sent with every request.
    pub model: String,

    /// Connection establishment timeout in seconds (0 = none).
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl UpstreamConfig {
    /// Full chat completions endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// System prompt settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Instruction inserted as the first turn of every upstream request.
    pub system_prompt: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful assistant.".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Load the file named by `cli`, apply overrides and validate.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Self::load(&cli.config)?;
        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line / environment overrides. Blank values are ignored.
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(key) = non_blank(&cli.api_key) {
            self.upstream.api_key = Some(key);
        }
        if let Some(model) = non_blank(&cli.model) {
            self.upstream.model = model;
        }
        if let Some(prompt) = non_blank(&cli.system_prompt) {
            self.prompt.system_prompt = prompt;
        }
        if let Some(url) = non_blank(&cli.base_url) {
            self.upstream.base_url = url;
        }
        if let Some(host) = non_blank(&cli.host) {
            self.server.host = host;
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
    }

    /// Reject configurations the relay cannot serve with.
    pub fn validate(&self) -> Result<(), RelayError> {
        match self.upstream.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(RelayError::Config(
                    "an upstream API key is required (set OPENAI_API_KEY or --api-key)".into(),
                ))
            }
        }
        if self.upstream.model.trim().is_empty() {
            return Err(RelayError::Config("model must not be empty".into()));
        }
        Ok(())
    }

    /// `host:port` string for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}
