//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variables holding API keys, checked in order.
const API_KEY_VARS: [&str; 3] = ["API_KEY1", "API_KEY2", "API_KEY3"];

const DEFAULT_BASE_URL: &str = "https://api.langdock.com/openai/eu/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_DONATE_LINK: &str = "https://example.com/donate";
const DEFAULT_PROJECT_INFO: &str = "🌟 <b>Our project</b>\n\nA smart chat bot backed by AI";

/// Relaybot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram connection settings.
    pub telegram: TelegramConfig,

    /// Completion provider settings.
    pub llm: LlmConfig,

    /// Bot behavior and canned content.
    pub bot: BotConfig,
}

/// Telegram connection settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,

    /// Channel users must belong to. `None` disables the membership gate.
    pub channel_id: Option<String>,

    /// Admin user, always let through the membership gate.
    pub admin_id: Option<i64>,
}

/// Completion provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// One client is created per key, in this order.
    pub api_keys: Vec<String>,

    /// OpenAI-compatible base URL, without the `/chat/completions` suffix.
    pub base_url: String,

    pub model: String,

    pub max_output_tokens: u32,

    /// Flat delay between failed attempts.
    pub retry_delay: Duration,
}

/// Bot behavior configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub donate_link: String,

    /// HTML shown for the "about" menu button.
    pub project_info: String,

    /// Turns kept per user.
    pub history_capacity: usize,

    pub snippet_ttl: Duration,

    pub snippet_capacity: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            donate_link: DEFAULT_DONATE_LINK.into(),
            project_info: DEFAULT_PROJECT_INFO.into(),
            history_capacity: 10,
            snippet_ttl: Duration::from_secs(24 * 60 * 60),
            snippet_capacity: 10_000,
        }
    }
}

/// On-disk TOML layout. Every field is optional; secrets usually come from the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TomlConfig {
    telegram: TomlTelegram,
    llm: TomlLlm,
    bot: TomlBot,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TomlTelegram {
    token: Option<String>,
    channel_id: Option<String>,
    admin_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TomlLlm {
    api_keys: Vec<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_output_tokens: Option<u32>,
    retry_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TomlBot {
    donate_link: Option<String>,
    project_info: Option<String>,
    history_capacity: Option<usize>,
    snippet_ttl_secs: Option<u64>,
    snippet_capacity: Option<u64>,
}

impl Config {
    /// Load configuration from the environment, reading `.env` first if present.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_sources(TomlConfig::default(), |key| std::env::var(key).ok())
    }

    /// Load from a TOML file. Environment variables override file values.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: path.display().to_string(),
            source,
        })?;
        let file: TomlConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        dotenvy::dotenv().ok();
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Build a config from file values and an environment lookup.
    fn from_sources(file: TomlConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = env("TELEGRAM_BOT_TOKEN")
            .or(file.telegram.token)
            .ok_or_else(|| ConfigError::MissingKey("TELEGRAM_BOT_TOKEN".into()))?;

        let admin_id = match env("TELEGRAM_ADMIN_ID") {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                ConfigError::Invalid(format!("TELEGRAM_ADMIN_ID must be an integer, got {raw:?}"))
            })?),
            None => file.telegram.admin_id,
        };

        let telegram = TelegramConfig {
            token,
            channel_id: env("TELEGRAM_CHANNEL_ID").or(file.telegram.channel_id),
            admin_id,
        };

        let mut api_keys: Vec<String> = API_KEY_VARS.iter().filter_map(|var| env(*var)).collect();
        if api_keys.is_empty() {
            api_keys = file
                .llm
                .api_keys
                .into_iter()
                .filter(|key| !key.trim().is_empty())
                .collect();
        }

        // Validate that at least one provider key is available
        if api_keys.is_empty() {
            return Err(ConfigError::Invalid(
                "No API key found. Set API_KEY1, API_KEY2 or API_KEY3.".into(),
            )
            .into());
        }

        let llm = LlmConfig {
            api_keys,
            base_url: env("BASE_URL")
                .or(file.llm.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            model: env("MODEL")
                .or(file.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.into()),
            max_output_tokens: parse_number(&env, "MAX_OUTPUT_TOKENS")?
                .or(file.llm.max_output_tokens)
                .unwrap_or(1500),
            retry_delay: Duration::from_millis(
                parse_number(&env, "RETRY_DELAY_MS")?
                    .or(file.llm.retry_delay_ms)
                    .unwrap_or(1000),
            ),
        };

        let defaults = BotConfig::default();
        let history_capacity = parse_number(&env, "HISTORY_CAPACITY")?
            .or(file.bot.history_capacity)
            .unwrap_or(defaults.history_capacity);
        if history_capacity == 0 {
            return Err(ConfigError::Invalid("HISTORY_CAPACITY must be at least 1".into()).into());
        }

        let bot = BotConfig {
            donate_link: env("DONATE_LINK")
                .or(file.bot.donate_link)
                .unwrap_or(defaults.donate_link),
            project_info: env("PROJECT_INFO")
                .or(file.bot.project_info)
                .unwrap_or(defaults.project_info),
            history_capacity,
            snippet_ttl: parse_number(&env, "SNIPPET_TTL_SECS")?
                .or(file.bot.snippet_ttl_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.snippet_ttl),
            snippet_capacity: parse_number(&env, "SNIPPET_CAPACITY")?
                .or(file.bot.snippet_capacity)
                .unwrap_or(defaults.snippet_capacity),
        };

        Ok(Self { telegram, llm, bot })
    }
}

fn parse_number<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{key} must be a number, got {raw:?}")).into()),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn collects_keys_in_order_and_skips_blank_ones() {
        let config = Config::from_sources(
            TomlConfig::default(),
            lookup(&[
                ("TELEGRAM_BOT_TOKEN", "123:abc"),
                ("API_KEY1", "first"),
                ("API_KEY2", "  "),
                ("API_KEY3", "third"),
            ]),
        )
        .expect("config should load");

        assert_eq!(config.llm.api_keys, vec!["first", "third"]);
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.llm.max_output_tokens, 1500);
        assert_eq!(config.llm.retry_delay, Duration::from_secs(1));
        assert_eq!(config.bot.history_capacity, 10);
        assert!(config.telegram.channel_id.is_none());
    }

    #[test]
    fn refuses_to_start_without_api_keys() {
        let error = Config::from_sources(
            TomlConfig::default(),
            lookup(&[("TELEGRAM_BOT_TOKEN", "123:abc")]),
        )
        .expect_err("missing keys must fail");

        assert!(error.to_string().contains("No API key found"));
    }

    #[test]
    fn requires_bot_token() {
        let error = Config::from_sources(TomlConfig::default(), lookup(&[("API_KEY1", "k")]))
            .expect_err("missing token must fail");

        assert!(error.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn rejects_non_numeric_admin_id() {
        let error = Config::from_sources(
            TomlConfig::default(),
            lookup(&[
                ("TELEGRAM_BOT_TOKEN", "123:abc"),
                ("API_KEY1", "k"),
                ("TELEGRAM_ADMIN_ID", "root"),
            ]),
        )
        .expect_err("admin id must be numeric");

        assert!(error.to_string().contains("TELEGRAM_ADMIN_ID"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let file: TomlConfig = toml::from_str(indoc::indoc! {r#"
            [telegram]
            token = "file-token"
            channel_id = "@from_file"

            [llm]
            api_keys = ["file-key"]
            model = "file-model"
            retry_delay_ms = 0

            [bot]
            history_capacity = 4
        "#})
        .expect("toml should parse");

        let config = Config::from_sources(file, lookup(&[("MODEL", "env-model")]))
            .expect("config should load");

        assert_eq!(config.telegram.token, "file-token");
        assert_eq!(config.telegram.channel_id.as_deref(), Some("@from_file"));
        assert_eq!(config.llm.api_keys, vec!["file-key"]);
        assert_eq!(config.llm.model, "env-model");
        assert_eq!(config.llm.retry_delay, Duration::ZERO);
        assert_eq!(config.bot.history_capacity, 4);
    }
}
