//! Runtime Configuration
//!
//! Environment first (after `.env`), then command-line overrides.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::ValueEnum;

/// Which language model backend to talk to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    #[default]
    Anthropic,
    Ollama,
}

impl ProviderKind {
    /// Parse a provider name the way `--provider` does, ignoring case
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        <Self as ValueEnum>::from_str(raw.trim(), true)
            .map_err(|_| anyhow!("unknown provider {raw:?} (expected anthropic or ollama)"))
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => f.write_str("anthropic"),
            Self::Ollama => f.write_str("ollama"),
        }
    }
}

/// Settings for one run of the binary
#[derive(Clone, Debug)]
pub struct Settings {
    pub provider: ProviderKind,

    /// Model override; each provider has its own default
    pub model: Option<String>,

    /// SQLite file holding users and memories
    pub database_path: PathBuf,

    /// Directory for the log file
    pub log_dir: PathBuf,

    /// Show error details instead of the generic apology
    pub debug: bool,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let provider = match std::env::var("WEATHER_CHAT_PROVIDER") {
            Ok(raw) => ProviderKind::parse(&raw).context("invalid WEATHER_CHAT_PROVIDER")?,
            Err(_) => ProviderKind::default(),
        };

        let data_dir = data_dir();
        let database_path = std::env::var("WEATHER_CHAT_DATABASE")
            .map_or_else(|_| data_dir.join("weather-chat.sqlite"), PathBuf::from);

        Ok(Self {
            provider,
            model: std::env::var("WEATHER_CHAT_MODEL").ok(),
            database_path,
            log_dir: data_dir,
            debug: std::env::var("WEATHER_CHAT_DEBUG").is_ok_and(|v| is_truthy(&v)),
        })
    }

    /// Apply command-line overrides
    #[must_use]
    pub fn with_overrides(
        mut self,
        provider: Option<ProviderKind>,
        model: Option<String>,
        debug: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.provider = provider;
        }
        if model.is_some() {
            self.model = model;
        }
        self.debug |= debug;
        self
    }
}

/// Per-user data directory for the application
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weather-chat")
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
