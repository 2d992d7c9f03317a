//! Weather Integration
//!
//! Abstractions and implementations for weather data sources, plus the text
//! rendering the tools hand back to the model.

mod dates;
mod mock;
mod open_meteo;

pub use dates::{days_ahead, ordinal_date};
pub use mock::MockWeatherProvider;
pub use open_meteo::{OpenMeteoConfig, OpenMeteoProvider};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{CurrentConditions, DailyForecast, Forecast, weather_description};

/// Furthest day ahead a forecast can be asked for
pub const MAX_FORECAST_DAYS: i64 = 16;

/// Weather data source (Strategy pattern)
///
/// `Ok(None)` means the location name could not be resolved.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions at a named location
    async fn current_conditions(&self, location: &str) -> Result<Option<CurrentConditions>>;

    /// Daily forecasts from today through `days_ahead` (1..=16)
    async fn forecast(&self, location: &str, days_ahead: i64) -> Result<Option<Forecast>>;

    /// Source name
    fn name(&self) -> &str;
}

#[allow(clippy::cast_possible_truncation)]
fn whole(value: f64) -> i64 {
    value.round() as i64
}

/// Render current conditions the way the assistant reports them
pub fn format_current(location: &str, current: &CurrentConditions) -> String {
    let mut out = format!("Current weather in {location}:\n");
    out.push_str(&format!(
        "🌡️ Temperature: {}°C (feels like {}°C)\n",
        whole(current.temperature),
        whole(current.apparent_temperature)
    ));
    out.push_str(&format!(
        "🌤️ Conditions: {}\n",
        weather_description(current.weather_code)
    ));
    out.push_str(&format!("💧 Humidity: {}%\n", current.humidity));
    out.push_str(&format!("💨 Wind: {} km/h\n", whole(current.wind_speed)));
    if current.precipitation > 0.0 {
        out.push_str(&format!("🌧️ Precipitation: {} mm\n", current.precipitation));
    }
    out.trim().to_string()
}

/// Render one forecast day
pub fn format_forecast(location: &str, day: &DailyForecast) -> String {
    let mut out = format!(
        "Weather forecast for {location} on {}:\n",
        ordinal_date(day.date)
    );
    out.push_str(&format!(
        "🌡️ Temperature: {}°C to {}°C\n",
        whole(day.temperature_min),
        whole(day.temperature_max)
    ));
    out.push_str(&format!(
        "🌤️ Conditions: {}\n",
        weather_description(day.weather_code)
    ));
    if day.precipitation_sum > 0.0 {
        out.push_str(&format!(
            "🌧️ Precipitation: {} mm expected\n",
            day.precipitation_sum
        ));
    } else {
        out.push_str("💧 Precipitation: No precipitation expected\n");
    }
    out.trim().to_string()
}
