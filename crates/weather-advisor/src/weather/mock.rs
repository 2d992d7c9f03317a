//! Mock Weather Provider
//!
//! For testing and demo purposes. Returns static readings for a few cities.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Days, Local};

use super::{MAX_FORECAST_DAYS, WeatherProvider};
use crate::error::{AdvisorError, Result};
use crate::model::{CurrentConditions, DailyForecast, Forecast};

/// Mock weather provider with static readings
#[derive(Default)]
pub struct MockWeatherProvider {
    /// Fail every request as if the backend were down
    unavailable: bool,

    /// Number of lookups served
    calls: AtomicUsize,
}

impl MockWeatherProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose backend is down
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Lookups served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// (temperature, feels like, humidity, wind, precipitation, weather code)
    fn reading(location: &str) -> Option<(f64, f64, f64, f64, f64, u16)> {
        match location.trim().to_lowercase().as_str() {
            "lisbon" => Some((23.0, 23.0, 60.0, 14.0, 0.0, 0)),
            "london" => Some((14.0, 12.0, 82.0, 22.0, 1.2, 61)),
            "paris" => Some((19.0, 19.0, 70.0, 9.0, 0.0, 2)),
            "new york" => Some((27.0, 29.0, 65.0, 12.0, 0.0, 1)),
            "tokyo" => Some((25.0, 27.0, 78.0, 8.0, 0.4, 80)),
            _ => None,
        }
    }

    fn check_available(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(AdvisorError::WeatherUnavailable("mock backend is down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl WeatherProvider for MockWeatherProvider {
    async fn current_conditions(&self, location: &str) -> Result<Option<CurrentConditions>> {
        self.check_available()?;
        Ok(Self::reading(location).map(
            |(temperature, apparent_temperature, humidity, wind_speed, precipitation, weather_code)| {
                CurrentConditions {
                    temperature,
                    apparent_temperature,
                    humidity,
                    wind_speed,
                    precipitation,
                    weather_code,
                }
            },
        ))
    }

    async fn forecast(&self, location: &str, days_ahead: i64) -> Result<Option<Forecast>> {
        if !(1..=MAX_FORECAST_DAYS).contains(&days_ahead) {
            return Err(AdvisorError::ForecastOutOfRange(days_ahead));
        }
        self.check_available()?;

        let Some((temperature, _, _, _, precipitation, weather_code)) = Self::reading(location)
        else {
            return Ok(None);
        };

        let today = Local::now().date_naive();
        let days = (0..=days_ahead.unsigned_abs())
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .map(|date| DailyForecast {
                date,
                weather_code,
                temperature_max: temperature + 4.0,
                temperature_min: temperature - 6.0,
                precipitation_sum: precipitation,
            })
            .collect();
        Ok(Some(Forecast { days }))
    }

    fn name(&self) -> &str {
        "MockWeather"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_weather() {
        let weather = MockWeatherProvider::new();

        let lisbon = weather.current_conditions("Lisbon").await.unwrap().unwrap();
        assert_eq!(lisbon.weather_code, 0);
        assert!(weather.current_conditions("Atlantis").await.unwrap().is_none());
        assert_eq!(weather.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_forecast_covers_requested_day() {
        let weather = MockWeatherProvider::new();
        let forecast = weather.forecast("Paris", 3).await.unwrap().unwrap();

        assert_eq!(forecast.days.len(), 4);
        let target = Local::now().date_naive() + Days::new(3);
        assert!(forecast.day(target).is_some());
    }

    #[tokio::test]
    async fn test_out_of_range_forecast() {
        let weather = MockWeatherProvider::new();
        assert!(matches!(
            weather.forecast("Paris", 17).await,
            Err(AdvisorError::ForecastOutOfRange(17))
        ));
    }
}
