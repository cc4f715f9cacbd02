use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::BotModel;
use crate::upstream::Endpoint;

const ENV_PREFIX: &str = "STARSHOT";
const REDACTED: &str = "***";

/// Full service configuration.
///
/// Layered as: built-in defaults, then the optional TOML file, then
/// `STARSHOT__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub polling: PollingSettings,
    pub models: ModelsSettings,
    pub llm: LlmSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if let Err(errors) = settings.validate() {
            anyhow::bail!("Invalid configuration: {}", errors.join(", "));
        }

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for model in BotModel::all() {
            if self.models.get(model).base_url.trim().is_empty() {
                errors.push(format!("models.{}.base_url must not be empty", model));
            }
        }
        if self.polling.interval_secs == 0 {
            errors.push("polling.interval_secs must be > 0".to_string());
        }
        if self.polling.request_timeout_secs == 0 {
            errors.push("polling.request_timeout_secs must be > 0".to_string());
        }
        if self.llm.is_configured() && self.llm.model.trim().is_empty() {
            errors.push("llm.model must be set when llm.api_key is set".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Copy safe to print: passwords and API keys are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for api in [&mut copy.models.chatgpt, &mut copy.models.gemini] {
            if !api.password.is_empty() {
                api.password = REDACTED.to_string();
            }
        }
        if !copy.llm.api_key.is_empty() {
            copy.llm.api_key = REDACTED.to_string();
        }
        copy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsSettings {
    pub chatgpt: ModelApiSettings,
    pub gemini: ModelApiSettings,
}

impl ModelsSettings {
    pub fn get(&self, model: BotModel) -> &ModelApiSettings {
        match model {
            BotModel::ChatGpt => &self.chatgpt,
            BotModel::Gemini => &self.gemini,
        }
    }
}

impl Default for ModelsSettings {
    fn default() -> Self {
        Self {
            chatgpt: ModelApiSettings::with_base_url("http://127.0.0.1:8071/api/v1"),
            gemini: ModelApiSettings::with_base_url("http://127.0.0.1:8073/api/v1"),
        }
    }
}

/// Where one bot's REST API lives and how its payloads are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelApiSettings {
    pub base_url: String,
    pub username: String,
    /// Empty disables the Basic-Auth header.
    pub password: String,
    pub summary_endpoint: SummaryEndpoint,
    pub open_trade_source: OpenTradeSource,
}

impl ModelApiSettings {
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            username: "ai_trading_agent".to_string(),
            password: String::new(),
            summary_endpoint: SummaryEndpoint::Status,
            open_trade_source: OpenTradeSource::Trades,
        }
    }
}

/// Endpoint queried next to `/trades` for the bot summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryEndpoint {
    Status,
    Stats,
}

impl SummaryEndpoint {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            SummaryEndpoint::Status => Endpoint::Status,
            SummaryEndpoint::Stats => Endpoint::Stats,
        }
    }
}

/// Which payload is authoritative for currently open positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenTradeSource {
    /// `/trades` records without a close timestamp.
    Trades,
    /// The summary payload's trade array.
    StatusTrades,
    /// The summary payload's order records.
    StatusOrders,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl LlmSettings {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.polling.interval_secs, 15);
        assert_eq!(settings.models.get(BotModel::Gemini).base_url, "http://127.0.0.1:8073/api/v1");
        assert!(!settings.llm.is_configured());
    }

    #[test]
    fn test_validation_collects_errors() {
        let mut settings = Settings::default();
        settings.models.chatgpt.base_url = " ".to_string();
        settings.polling.interval_secs = 0;

        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("models.chatgpt.base_url"));
    }

    #[test]
    fn test_redacted_masks_secrets_only() {
        let mut settings = Settings::default();
        settings.models.gemini.password = "hunter2".to_string();
        settings.llm.api_key = "sk-test".to_string();

        let redacted = settings.redacted();
        assert_eq!(redacted.models.gemini.password, "***");
        assert_eq!(redacted.models.chatgpt.password, "");
        assert_eq!(redacted.llm.api_key, "***");
        assert_eq!(redacted.models.gemini.username, settings.models.gemini.username);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let settings = Settings::load("does-not-exist.toml").unwrap();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.models.chatgpt.summary_endpoint, SummaryEndpoint::Status);
        assert_eq!(settings.models.chatgpt.open_trade_source, OpenTradeSource::Trades);
    }

    #[test]
    fn test_enum_settings_parse_from_snake_case() {
        let source: OpenTradeSource = serde_json::from_str("\"status_orders\"").unwrap();
        assert_eq!(source, OpenTradeSource::StatusOrders);
        let endpoint: SummaryEndpoint = serde_json::from_str("\"stats\"").unwrap();
        assert_eq!(endpoint.endpoint(), Endpoint::Stats);
    }
}
