//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.tickets/config.json`) and
//! environment. Kept minimal: gateway bind, LLM backend, and the dispatch
//! endpoint.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Text-generation backend settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Outbound ticket dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// HTTP port (default 8085).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8085
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

/// LLM backend settings (Ollama-compatible chat API).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// Base URL of the backend (default http://127.0.0.1:11434).
    pub base_url: Option<String>,
    /// Model name as known to the backend (e.g. "llama3.2:latest").
    pub model: Option<String>,
}

/// Outbound dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Endpoint URL for the ticket POST. Overridden by TICKET_DISPATCH_URL env.
    pub url: Option<String>,

    /// Transport timeout in seconds (default 20).
    #[serde(default = "default_dispatch_timeout_secs")]
    pub timeout_secs: u64,

    /// When true (default), record payloads instead of posting them.
    #[serde(default = "default_simulate")]
    pub simulate: bool,
}

fn default_dispatch_timeout_secs() -> u64 {
    20
}

fn default_simulate() -> bool {
    true
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_dispatch_timeout_secs(),
            simulate: default_simulate(),
        }
    }
}

/// Resolve the dispatch endpoint: env TICKET_DISPATCH_URL overrides config.
pub fn resolve_dispatch_url(config: &Config) -> Option<String> {
    std::env::var("TICKET_DISPATCH_URL")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config
                .dispatch
                .url
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("TICKETS_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".tickets").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or TICKETS_CONFIG_PATH). Missing file => default config.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(default_config_path);
    if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        return Ok(Config::default());
    }
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parsing config from {}", path.display()))
}
