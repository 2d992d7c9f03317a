//! Error Types for Weather Advisor

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Weather data unavailable: {0}")]
    WeatherUnavailable(String),

    #[error("Forecast out of range: {0} days ahead")]
    ForecastOutOfRange(i64),

    #[error("Invalid user name: {0}")]
    InvalidUserName(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
