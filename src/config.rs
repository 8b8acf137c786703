//! Process configuration
//!
//! Values come from a JSON file (the legacy `openai_*` / `calls_*` key names are
//! accepted as aliases) and are then overridden by environment variables.
//! Loaded once at startup and shared read-only.

use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.cloudflare.com:3478";
pub const DEFAULT_CALL_HISTORY_LIMIT: usize = 1024;

/// Validated bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub ai_api_key: String,
    pub ai_endpoint: Url,
    pub broker_base_url: String,
    pub broker_app_id: String,
    pub broker_app_token: String,
    pub port: u16,
    pub stun_server: String,
    pub broker_stream_debug: bool,
    pub call_history_limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

/// Configuration as read from file, before env overrides and validation
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default, alias = "openai_api_key")]
    ai_api_key: Option<String>,
    #[serde(default, alias = "openai_model_endpoint")]
    ai_endpoint: Option<String>,
    #[serde(default, alias = "calls_base_url")]
    broker_base_url: Option<String>,
    #[serde(default, alias = "calls_app_id")]
    broker_app_id: Option<String>,
    #[serde(default, alias = "calls_app_token")]
    broker_app_token: Option<String>,
    #[serde(default)]
    port: Option<PortValue>,
    #[serde(default)]
    stun_server: Option<String>,
    #[serde(default)]
    broker_stream_debug: Option<bool>,
    #[serde(default)]
    call_history_limit: Option<usize>,
}

impl RawConfig {
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("AI_API_KEY") {
            self.ai_api_key = Some(v);
        }
        if let Some(v) = lookup("AI_ENDPOINT") {
            self.ai_endpoint = Some(v);
        }
        if let Some(v) = lookup("BROKER_BASE_URL") {
            self.broker_base_url = Some(v);
        }
        if let Some(v) = lookup("BROKER_APP_ID") {
            self.broker_app_id = Some(v);
        }
        if let Some(v) = lookup("BROKER_APP_TOKEN") {
            self.broker_app_token = Some(v);
        }
        if let Some(v) = lookup("PORT") {
            self.port = Some(PortValue::Text(v));
        }
        if let Some(v) = lookup("STUN_SERVER") {
            self.stun_server = Some(v);
        }
        if let Some(v) = lookup("BROKER_STREAM_DEBUG") {
            self.broker_stream_debug = Some(v.to_lowercase() == "true");
        }
        if let Some(v) = lookup("CALL_HISTORY_LIMIT") {
            let limit = v
                .parse::<usize>()
                .with_context(|| format!("CALL_HISTORY_LIMIT is not a number: {}", v))?;
            self.call_history_limit = Some(limit);
        }
        Ok(())
    }

    fn validate(self) -> Result<BridgeConfig> {
        fn required(value: Option<String>, name: &str) -> Result<String> {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("missing required configuration value: {}", name))
        }

        let ai_endpoint = required(self.ai_endpoint, "ai_endpoint")?;
        let ai_endpoint = Url::parse(&ai_endpoint)
            .with_context(|| format!("invalid ai_endpoint URL: {}", ai_endpoint))?;

        let port = match self.port {
            None => DEFAULT_PORT,
            Some(PortValue::Number(port)) => port,
            Some(PortValue::Text(text)) if text.trim().is_empty() => DEFAULT_PORT,
            Some(PortValue::Text(text)) => text
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid port: {}", text))?,
        };

        Ok(BridgeConfig {
            ai_api_key: required(self.ai_api_key, "ai_api_key")?,
            ai_endpoint,
            broker_base_url: required(self.broker_base_url, "broker_base_url")?
                .trim_end_matches('/')
                .to_string(),
            broker_app_id: required(self.broker_app_id, "broker_app_id")?,
            broker_app_token: required(self.broker_app_token, "broker_app_token")?,
            port,
            stun_server: self
                .stun_server
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_STUN_SERVER.to_string()),
            broker_stream_debug: self.broker_stream_debug.unwrap_or(false),
            call_history_limit: self.call_history_limit.unwrap_or(DEFAULT_CALL_HISTORY_LIMIT),
        })
    }
}

impl BridgeConfig {
    /// Parse a JSON document without consulting the environment
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json).context("failed to parse config JSON")?;
        raw.validate()
    }

    /// Load from `path` if it exists, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut raw = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            serde_json::from_str::<RawConfig>(&text)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            tracing::warn!(
                "config file {} not found, using environment only",
                path.display()
            );
            RawConfig::default()
        };

        raw.apply_overrides(|key| std::env::var(key).ok())?;
        raw.validate()
    }

    /// `{broker_base_url}/{app_id}`, the prefix of every session URL
    pub fn broker_app_endpoint(&self) -> String {
        format!("{}/{}", self.broker_base_url, self.broker_app_id)
    }
}
