//! Current Weather Tool
//!
//! Looks up current conditions for a named location.

use std::sync::Arc;

use agent_core::tool::{
    ParameterSchema, Tool, ToolArguments, ToolFailure, ToolOutcome, ToolSchema, string_arg,
};
use async_trait::async_trait;

use crate::error::AdvisorError;
use crate::weather::{WeatherProvider, format_current};

/// Tool for current weather conditions
pub struct CurrentWeatherTool {
    weather: Arc<dyn WeatherProvider>,
}

impl CurrentWeatherTool {
    pub fn new(weather: Arc<dyn WeatherProvider>) -> Self {
        Self { weather }
    }
}

#[async_trait]
impl Tool for CurrentWeatherTool {
    fn name(&self) -> &str {
        "get_current_weather"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().into(),
            description: "Get current weather conditions for a specific location".into(),
            parameters: vec![ParameterSchema::string(
                "location",
                "City name or location (e.g., \"London\", \"Paris\", \"New York\")",
            )],
        }
    }

    async fn run(&self, arguments: &ToolArguments) -> ToolOutcome {
        let location = string_arg(arguments, "location")?;

        match self.weather.current_conditions(location).await {
            Ok(Some(current)) => Ok(format_current(location, &current)),
            Ok(None) => Err(ToolFailure::Rejected(format!(
                "I couldn't find the location '{location}'. Please check the spelling or try a different format."
            ))),
            Err(AdvisorError::WeatherUnavailable(reason)) => {
                tracing::warn!(location, %reason, source = self.weather.name(), "Weather data unavailable");
                Err(ToolFailure::Backend(format!(
                    "I couldn't retrieve weather data for {location} right now. Please try again later."
                )))
            }
            Err(e) => {
                tracing::error!(location, error = %e, source = self.weather.name(), "Weather service error");
                Err(ToolFailure::Backend(format!(
                    "I encountered an error while fetching weather data for {location}. Please try again."
                )))
            }
        }
    }
}
