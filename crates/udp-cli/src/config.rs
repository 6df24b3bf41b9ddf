//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! streams = [
//!   "udp://@239.1.1.1:5000",
//!   { name = "news-hd", locator = "udp://@239.1.1.2:5000" },
//! ]
//!
//! [general]
//! log_format = "json"
//! interval_secs = 300
//!
//! [check]
//! timeout_ms = 10000
//! attempts = 2
//! retry_delay_ms = 2000
//!
//! [telegram]
//! bot_token = "123456:ABC"
//! chat_id = "-1001234567890"
//!
//! [[webhook]]
//! url = "https://hooks.example.com/udp-alerts"
//! secret = "shared-key"
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use udp_core::{CheckConfig, StreamSpec, TelegramConfig, WebhookConfig};

const MAX_WEBHOOK_RETRIES: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub streams: Vec<StreamDef>,

    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub check: CheckDefaults,

    #[serde(default)]
    pub telegram: Option<TelegramConfig>,

    #[serde(default)]
    pub webhook: Vec<WebhookConfig>,
}

/// A stream entry: either a bare locator or `{ name, locator }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StreamDef {
    Locator(String),
    Named {
        name: Option<String>,
        locator: String,
    },
}

impl StreamDef {
    pub fn to_stream_spec(&self) -> StreamSpec {
        match self {
            StreamDef::Locator(locator) => StreamSpec::new(locator.clone(), locator.clone()),
            StreamDef::Named { name, locator } => StreamSpec::new(
                name.clone().unwrap_or_else(|| locator.clone()),
                locator.clone(),
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckDefaults {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_require_data")]
    pub require_data: bool,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CheckDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            attempts: default_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            require_data: default_require_data(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

fn default_require_data() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    1
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn to_check_config(&self) -> CheckConfig {
        CheckConfig::default()
            .with_timeout(self.check.timeout_ms)
            .with_attempts(self.check.attempts)
            .with_retry_delay(self.check.retry_delay_ms)
            .with_require_data(self.check.require_data)
            .with_max_concurrent(self.check.max_concurrent)
            .with_interval(self.general.interval_secs)
    }

    pub fn to_stream_specs(&self) -> Vec<StreamSpec> {
        self.streams.iter().map(StreamDef::to_stream_spec).collect()
    }

    // Locators are checked every cycle and reported as INVALID there, so a
    // typo in one stream does not stop the others from being monitored.
    fn validate(&self) -> Result<(), String> {
        if self.streams.is_empty() {
            return Err("No streams configured".into());
        }

        let mut names = HashSet::new();
        for spec in self.to_stream_specs() {
            if spec.name.trim().is_empty() {
                return Err(format!("Stream name must not be empty ({})", spec.locator));
            }
            if !names.insert(spec.name.clone()) {
                return Err(format!("Duplicate stream name: {}", spec.name));
            }
        }

        if self.general.interval_secs == 0 {
            return Err("general.interval_secs must be greater than 0".into());
        }
        if self.check.timeout_ms == 0 {
            return Err("check.timeout_ms must be greater than 0".into());
        }
        if self.check.attempts == 0 {
            return Err("check.attempts must be greater than 0".into());
        }

        if let Some(ref tg) = self.telegram {
            if tg.bot_token.trim().is_empty() {
                return Err("telegram.bot_token must not be empty".into());
            }
            if tg.chat_id.trim().is_empty() {
                return Err("telegram.chat_id must not be empty".into());
            }
            url::Url::parse(&tg.api_base)
                .map_err(|e| format!("Invalid telegram.api_base {}: {}", tg.api_base, e))?;
        }

        for (i, wh) in self.webhook.iter().enumerate() {
            url::Url::parse(&wh.url)
                .map_err(|e| format!("Invalid webhook URL at index {}: {} ({})", i, wh.url, e))?;
            if wh.max_retries > MAX_WEBHOOK_RETRIES {
                return Err(format!(
                    "webhook max_retries at index {} must be at most {}",
                    i, MAX_WEBHOOK_RETRIES
                ));
            }
        }

        match self.general.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        Ok(())
    }
}
