use std::time::Duration;

use serde::Deserialize;

use crate::engine::extract::ExtractorDefaults;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub openai_api_key: String,
    pub database_url: String,

    /// Base URL of an OpenAI-compatible API, without the trailing `/chat/completions`
    pub openai_base_url: String,
    pub openai_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,

    /// Upper bound for one completion call and for one store call
    pub request_timeout_secs: u64,

    /// Address the webhook server listens on
    pub bind_addr: String,
    /// Public webhook URL registered with Telegram at startup, if set
    pub webhook_url: Option<String>,

    /// How many past messages are sent to the model as context
    pub history_limit: i64,

    /// City used when a message carries a date but no recognisable place
    pub default_city: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN")?,
            openai_api_key: std::env::var("OPENAI_API_KEY")?,
            database_url: std::env::var("DATABASE_URL")?,
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            llm_temperature: std::env::var("LLM_TEMPERATURE")
                .unwrap_or_else(|_| "0.7".to_string())
                .parse()?,
            llm_max_tokens: std::env::var("LLM_MAX_TOKENS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()?,
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            webhook_url: std::env::var("WEBHOOK_URL").ok().filter(|s| !s.trim().is_empty()),
            history_limit: std::env::var("HISTORY_LIMIT")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            default_city: std::env::var("DEFAULT_CITY").unwrap_or_else(|_| "Москва".to_string()),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn extractor_defaults(&self) -> ExtractorDefaults {
        ExtractorDefaults {
            city: self.default_city.clone(),
            ..ExtractorDefaults::default()
        }
    }
}
