//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use pictolink_core::{CatalogConfig, ComposerConfig, Language};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub allowed_origin: String,
    /// Base URL of the NLP service hosting `/text-to-pictos`, `/pictos-to-text`
    /// and `/autocomplete`.
    pub nlp_api_url: String,
    pub catalog_path: PathBuf,
    pub curated_categories_path: Option<PathBuf>,
    pub search_limit: usize,
    pub category_limit: usize,
    pub translate_timeout: Duration,
    pub suggest_debounce: Duration,
    pub inbox_poll: Duration,
    pub openai_api_key: Option<String>,
    /// When set together with an OpenAI key, glosses come from this chat model
    /// instead of the NLP service.
    pub gloss_model: Option<String>,
    pub sst_model: String,
    pub tts_voice: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address = parse_var::<SocketAddr>("BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin = std::env::var("ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        // --- Load Pictogram and NLP Settings ---
        let nlp_api_url = std::env::var("NLP_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000/api/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        let catalog_path = std::env::var("CATALOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/arasaac_catalog.jsonl"));
        let curated_categories_path = std::env::var("CURATED_CATEGORIES_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let search_limit = parse_var::<usize>("SEARCH_LIMIT", "10")?;
        let category_limit = parse_var::<usize>("CATEGORY_LIMIT", "20")?;
        let translate_timeout =
            Duration::from_millis(parse_var::<u64>("TRANSLATE_TIMEOUT_MS", "5000")?);
        let suggest_debounce =
            Duration::from_millis(parse_var::<u64>("SUGGEST_DEBOUNCE_MS", "300")?);
        let inbox_poll = Duration::from_millis(parse_var::<u64>("INBOX_POLL_MS", "2000")?);

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Adapter-specific Settings ---
        let gloss_model = std::env::var("GLOSS_MODEL").ok();
        let sst_model =
            std::env::var("SST_MODEL").unwrap_or_else(|_| "whisper-1".to_string());
        let tts_voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "alloy".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            allowed_origin,
            nlp_api_url,
            catalog_path,
            curated_categories_path,
            search_limit,
            category_limit,
            translate_timeout,
            suggest_debounce,
            inbox_poll,
            openai_api_key,
            gloss_model,
            sst_model,
            tts_voice,
        })
    }

    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig {
            search_limit: self.search_limit,
            category_limit: self.category_limit,
        }
    }

    pub fn composer_config(&self) -> ComposerConfig {
        ComposerConfig {
            translation_timeout: self.translate_timeout,
            label_language: Language::Es,
        }
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    parse_value(name, &raw)
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
