//! Domain Models
//!
//! Users, their remembered facts, and the weather readings the tools format.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A chat user, identified by name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A durable fact about a user, unique per key
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Semantic key such as `home_location`
    pub key: String,

    /// What was remembered
    pub value: String,

    /// How the fact was learned
    pub context: Option<MemoryContext>,

    /// First time the key was recorded
    pub recorded_at: DateTime<Utc>,

    /// Last time the value changed
    pub updated_at: DateTime<Utc>,
}

/// Provenance stored alongside a memory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryContext {
    pub recorded_at: DateTime<Utc>,
    pub session_type: String,
}

impl MemoryContext {
    /// Context for a fact learned in a CLI chat right now
    pub fn cli() -> Self {
        Self {
            recorded_at: Utc::now(),
            session_type: "cli".into(),
        }
    }
}

/// Kind of memory, derived from naming conventions in its key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryCategory {
    Location,
    Preference,
    Context,
    Other,
}

impl MemoryCategory {
    pub const ALL: [Self; 4] = [Self::Location, Self::Preference, Self::Context, Self::Other];

    /// The first category whose convention the key follows
    pub fn of(key: &str) -> Self {
        [Self::Location, Self::Preference, Self::Context]
            .into_iter()
            .find(|c| c.includes(key))
            .unwrap_or(Self::Other)
    }

    /// Whether `key` follows this category's convention.
    ///
    /// A key can belong to several categories; `Other` holds keys that
    /// belong to none.
    pub fn includes(self, key: &str) -> bool {
        match self {
            Self::Location => key.contains("location"),
            Self::Preference => key.contains("preference") || key.contains("setting"),
            Self::Context => key.contains("context") || key.contains("note"),
            Self::Other => [Self::Location, Self::Preference, Self::Context]
                .into_iter()
                .all(|c| !c.includes(key)),
        }
    }

    pub const fn icon(self) -> &'static str {
        match self {
            Self::Location => "📍",
            Self::Preference => "⚙️",
            Self::Context => "💭",
            Self::Other => "📝",
        }
    }

    pub const fn heading(self) -> &'static str {
        match self {
            Self::Location => "Locations",
            Self::Preference => "Preferences",
            Self::Context => "Context",
            Self::Other => "Other",
        }
    }
}

/// A geocoded place
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    #[serde(default)]
    pub country: String,
}

/// Current conditions at a location
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// Air temperature, °C
    pub temperature: f64,

    /// Feels-like temperature, °C
    pub apparent_temperature: f64,

    /// Relative humidity, %
    pub humidity: f64,

    /// Wind speed, km/h
    pub wind_speed: f64,

    /// Precipitation, mm
    pub precipitation: f64,

    /// WMO weather interpretation code
    pub weather_code: u16,
}

/// One day of a forecast
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub weather_code: u16,
    pub temperature_max: f64,
    pub temperature_min: f64,
    pub precipitation_sum: f64,
}

/// Daily forecasts starting today
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub days: Vec<DailyForecast>,
}

impl Forecast {
    /// Forecast for a specific date, if covered
    pub fn day(&self, date: NaiveDate) -> Option<&DailyForecast> {
        self.days.iter().find(|d| d.date == date)
    }
}

/// Human description of a WMO weather code
pub const fn weather_description(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown conditions",
    }
}
