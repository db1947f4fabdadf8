//! services/studio/src/config.rs
//!
//! Defines the service's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use reqwest::Url;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// The OpenAI speech models the studio can be pointed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsModel {
    Standard,
    HighDefinition,
}

impl TtsModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsModel::Standard => "tts-1",
            TtsModel::HighDefinition => "tts-1-hd",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub supabase_url: Url,
    pub supabase_anon_key: String,
    pub log_level: Level,
    /// Only the server binary needs it; the OpenAPI exporter does not.
    pub openai_api_key: Option<String>,
    pub tts_model: TtsModel,
    pub audio_bucket: String,
    pub cors_origin: String,
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &str| var(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        // --- Server ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        // --- Hosted backend ---
        let supabase_url_str = required("SUPABASE_URL")?;
        let supabase_url = Url::parse(&supabase_url_str).map_err(|e| {
            ConfigError::InvalidValue("SUPABASE_URL".to_string(), e.to_string())
        })?;
        let supabase_anon_key = required("SUPABASE_ANON_KEY")?;
        let audio_bucket = var("AUDIO_BUCKET").unwrap_or_else(|| "project-audio".to_string());

        // --- Speech synthesis ---
        let openai_api_key = var("OPENAI_API_KEY");
        let tts_model = match var("TTS_MODEL").as_deref() {
            None | Some("tts-1") => TtsModel::Standard,
            Some("tts-1-hd") => TtsModel::HighDefinition,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "TTS_MODEL".to_string(),
                    format!("'{}' is not one of tts-1, tts-1-hd", other),
                ))
            }
        };

        Ok(Self {
            bind_address,
            supabase_url,
            supabase_anon_key,
            log_level,
            openai_api_key,
            tts_model,
            audio_bucket,
            cors_origin,
        })
    }
}
