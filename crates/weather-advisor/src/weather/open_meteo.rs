//! Open-Meteo Weather Client
//!
//! Geocodes a place name, then queries the forecast API for either current
//! conditions or daily forecasts. No API key is needed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::{MAX_FORECAST_DAYS, WeatherProvider};
use crate::error::{AdvisorError, Result};
use crate::model::{Coordinates, CurrentConditions, DailyForecast, Forecast};

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,apparent_temperature,precipitation,weather_code,wind_speed_10m";
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,precipitation_sum";

/// Open-Meteo endpoints
#[derive(Clone, Debug)]
pub struct OpenMeteoConfig {
    pub geocoding_url: String,
    pub forecast_url: String,
    pub timeout_secs: u64,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".into(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".into(),
            timeout_secs: 30,
        }
    }
}

impl OpenMeteoConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            geocoding_url: std::env::var("OPEN_METEO_GEOCODING_URL")
                .unwrap_or(defaults.geocoding_url),
            forecast_url: std::env::var("OPEN_METEO_FORECAST_URL")
                .unwrap_or(defaults.forecast_url),
            ..defaults
        }
    }
}

/// Weather provider backed by the Open-Meteo HTTP APIs
pub struct OpenMeteoProvider {
    client: reqwest::Client,
    config: OpenMeteoConfig,
}

impl OpenMeteoProvider {
    pub fn new(config: OpenMeteoConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenMeteoConfig::from_env())
    }

    /// Resolve a place name; `None` when the geocoder has no match or refuses
    async fn coordinates(&self, location: &str) -> Result<Option<Coordinates>> {
        let response = self
            .client
            .get(&self.config.geocoding_url)
            .query(&[
                ("name", location),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(location, status = %response.status(), "Geocoding request failed");
            return Ok(None);
        }

        let body: GeocodingResponse = response.json().await?;
        Ok(body.results.into_iter().next())
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        coordinates: &Coordinates,
        params: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(&self.config.forecast_url)
            .query(&[
                ("latitude", coordinates.latitude.to_string()),
                ("longitude", coordinates.longitude.to_string()),
                ("timezone", "auto".to_string()),
            ])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdvisorError::WeatherUnavailable(format!("HTTP {status}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn current_conditions(&self, location: &str) -> Result<Option<CurrentConditions>> {
        let Some(coordinates) = self.coordinates(location).await? else {
            return Ok(None);
        };

        let body: CurrentResponse = self
            .fetch(&coordinates, &[("current", CURRENT_FIELDS.to_string())])
            .await?;
        Ok(Some(body.current.into()))
    }

    async fn forecast(&self, location: &str, days_ahead: i64) -> Result<Option<Forecast>> {
        if !(1..=MAX_FORECAST_DAYS).contains(&days_ahead) {
            return Err(AdvisorError::ForecastOutOfRange(days_ahead));
        }
        let Some(coordinates) = self.coordinates(location).await? else {
            return Ok(None);
        };

        let body: DailyResponse = self
            .fetch(
                &coordinates,
                &[
                    ("daily", DAILY_FIELDS.to_string()),
                    ("forecast_days", (days_ahead + 1).to_string()),
                ],
            )
            .await?;
        Ok(Some(body.daily.into_forecast()))
    }

    fn name(&self) -> &str {
        "Open-Meteo"
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Coordinates>,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: CurrentBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    precipitation: f64,
    weather_code: u16,
    wind_speed_10m: f64,
}

impl From<CurrentBlock> for CurrentConditions {
    fn from(block: CurrentBlock) -> Self {
        Self {
            temperature: block.temperature_2m,
            apparent_temperature: block.apparent_temperature,
            humidity: block.relative_humidity_2m,
            wind_speed: block.wind_speed_10m,
            precipitation: block.precipitation,
            weather_code: block.weather_code,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: DailyBlock,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<NaiveDate>,
    weather_code: Vec<u16>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
    precipitation_sum: Vec<f64>,
}

impl DailyBlock {
    /// Zip the column arrays into days, stopping at the shortest column
    fn into_forecast(self) -> Forecast {
        let days = self
            .time
            .into_iter()
            .zip(self.weather_code)
            .zip(self.temperature_2m_max)
            .zip(self.temperature_2m_min)
            .zip(self.precipitation_sum)
            .map(
                |((((date, weather_code), temperature_max), temperature_min), precipitation_sum)| {
                    DailyForecast {
                        date,
                        weather_code,
                        temperature_max,
                        temperature_min,
                        precipitation_sum,
                    }
                },
            )
            .collect();
        Forecast { days }
    }
}
