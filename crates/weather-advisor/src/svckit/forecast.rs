//! Forecast Tool
//!
//! Turns a date phrase into a number of days ahead and reports that day's
//! forecast.

use std::sync::Arc;

use agent_core::tool::{
    ParameterSchema, Tool, ToolArguments, ToolFailure, ToolOutcome, ToolSchema, string_arg,
};
use async_trait::async_trait;
use chrono::{Days, Local};

use crate::error::AdvisorError;
use crate::weather::{MAX_FORECAST_DAYS, WeatherProvider, days_ahead, format_forecast};

/// Tool for future weather forecasts
pub struct ForecastTool {
    weather: Arc<dyn WeatherProvider>,
}

impl ForecastTool {
    pub fn new(weather: Arc<dyn WeatherProvider>) -> Self {
        Self { weather }
    }
}

#[async_trait]
impl Tool for ForecastTool {
    fn name(&self) -> &str {
        "get_weather_forecast"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().into(),
            description: "Get the weather forecast for a specific location on a future date.".into(),
            parameters: vec![
                ParameterSchema::string(
                    "location",
                    "City name or location (e.g., \"London\", \"Paris\").",
                ),
                ParameterSchema::string(
                    "date",
                    "A future date, like \"tomorrow\", \"in 2 days\", or \"next Monday\".",
                ),
            ],
        }
    }

    async fn run(&self, arguments: &ToolArguments) -> ToolOutcome {
        let location = string_arg(arguments, "location")?;
        let date = string_arg(arguments, "date")?;

        let today = Local::now().date_naive();
        let days = days_ahead(date, today).ok_or_else(|| {
            ToolFailure::Rejected(format!(
                "I can't get a forecast for '{date}'. I can only get forecasts for future dates. For current weather, please ask without specifying a date."
            ))
        })?;
        if days > MAX_FORECAST_DAYS {
            return Err(ToolFailure::Rejected(
                "I can only provide forecasts for the next 16 days.".into(),
            ));
        }

        let forecast = match self.weather.forecast(location, days).await {
            Ok(Some(forecast)) => forecast,
            Ok(None) => {
                return Err(ToolFailure::Rejected(format!(
                    "I couldn't find the location '{location}'. Please check the spelling or try a different format."
                )));
            }
            Err(AdvisorError::WeatherUnavailable(reason)) => {
                tracing::warn!(location, %reason, source = self.weather.name(), "Forecast data unavailable");
                return Err(ToolFailure::Backend(format!(
                    "I couldn't retrieve the forecast for {location} right now. Please try again later."
                )));
            }
            Err(e) => {
                tracing::error!(location, error = %e, source = self.weather.name(), "Weather forecast service error");
                return Err(ToolFailure::Backend(format!(
                    "I encountered an error while fetching the weather forecast for {location}. Please try again."
                )));
            }
        };

        let target = today
            .checked_add_days(Days::new(days.unsigned_abs()))
            .unwrap_or(today);
        forecast
            .day(target)
            .map(|day| format_forecast(location, day))
            .ok_or_else(|| {
                ToolFailure::Backend(format!(
                    "I couldn't find forecast data for {target} for {location}."
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::MockWeatherProvider;
    use serde_json::json;

    fn args(location: &str, date: &str) -> ToolArguments {
        json!({ "location": location, "date": date })
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_tomorrow() {
        let tool = ForecastTool::new(Arc::new(MockWeatherProvider::new()));
        let output = tool.invoke(&args("Paris", "tomorrow")).await;

        assert!(output.starts_with("Weather forecast for Paris on "));
        assert!(output.contains("🌡️ Temperature: 13°C to 23°C"));
    }

    #[tokio::test]
    async fn test_past_or_vague_date_is_rejected_without_lookup() {
        let weather = Arc::new(MockWeatherProvider::new());
        let tool = ForecastTool::new(weather.clone());

        assert_eq!(
            tool.invoke(&args("Paris", "yesterday")).await,
            "I can't get a forecast for 'yesterday'. I can only get forecasts for future dates. For current weather, please ask without specifying a date."
        );
        assert_eq!(weather.calls(), 0);
    }

    #[tokio::test]
    async fn test_beyond_sixteen_days() {
        let tool = ForecastTool::new(Arc::new(MockWeatherProvider::new()));
        assert_eq!(
            tool.invoke(&args("Paris", "in 20 days")).await,
            "I can only provide forecasts for the next 16 days."
        );
    }

    #[tokio::test]
    async fn test_backend_down() {
        let tool = ForecastTool::new(Arc::new(MockWeatherProvider::unavailable()));
        assert_eq!(
            tool.invoke(&args("Paris", "in 2 days")).await,
            "I couldn't retrieve the forecast for Paris right now. Please try again later."
        );
    }
}
