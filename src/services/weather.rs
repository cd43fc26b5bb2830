//! Current conditions and 5-day forecast from OpenWeatherMap, plus the pure
//! helpers that shape a forecast for display.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{config::WeatherConfig, error::WeatherError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Default for Coordinates {
    /// The household's home location.
    fn default() -> Self {
        Self {
            lat: 49.74,
            lon: 8.11,
        }
    }
}

// ============================================================================
// Payloads (the fields we use)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Readings {
    pub temp: f64,
    #[serde(default)]
    pub feels_like: f64,
    #[serde(default)]
    pub temp_min: f64,
    #[serde(default)]
    pub temp_max: f64,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub pressure: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    #[serde(default)]
    pub name: String,
    pub main: Readings,
    #[serde(default)]
    pub weather: Vec<Conditions>,
    #[serde(default)]
    pub wind: Wind,
}

/// One 3-hour forecast slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSlot {
    /// Unix seconds.
    pub dt: i64,
    pub main: Readings,
    #[serde(default)]
    pub weather: Vec<Conditions>,
}

impl ForecastSlot {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.dt, 0).single()
    }

    pub fn icon(&self) -> Option<&str> {
        self.weather.first().map(|c| c.icon.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub list: Vec<ForecastSlot>,
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(&self, at: Coordinates) -> Result<CurrentWeather, WeatherError>;
    async fn forecast(&self, at: Coordinates) -> Result<Forecast, WeatherError>;
}

// ============================================================================
// OpenWeatherMap client
// ============================================================================

pub struct OpenWeatherMap {
    client: reqwest::Client,
    config: WeatherConfig,
}

impl OpenWeatherMap {
    pub fn new(config: WeatherConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: WeatherConfig) -> Self {
        Self { client, config }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        at: Coordinates,
    ) -> Result<T, WeatherError> {
        let url = format!(
            "{}/data/2.5/{endpoint}",
            self.config.base_url.trim_end_matches('/')
        );
        let lat = at.lat.to_string();
        let lon = at.lon.to_string();
        self.client
            .get(url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", self.config.api_key.as_str()),
                ("units", "metric"),
                ("lang", self.config.lang.as_str()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| unavailable(endpoint, e))?
            .json::<T>()
            .await
            .map_err(|e| unavailable(endpoint, e))
    }
}

fn unavailable(endpoint: &str, err: reqwest::Error) -> WeatherError {
    tracing::warn!(endpoint, error = %err, "weather request failed");
    WeatherError::Unavailable(err.to_string())
}

#[async_trait]
impl WeatherSource for OpenWeatherMap {
    async fn current(&self, at: Coordinates) -> Result<CurrentWeather, WeatherError> {
        self.fetch("weather", at).await
    }

    async fn forecast(&self, at: Coordinates) -> Result<Forecast, WeatherError> {
        self.fetch("forecast", at).await
    }
}

// ============================================================================
// Display helpers
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyOutlook {
    pub time: DateTime<Utc>,
    pub temp: f64,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyOutlook {
    pub day: NaiveDate,
    pub min: f64,
    pub max: f64,
    pub icon: Option<String>,
}

/// The next 24 hours: the first eight slots.
pub fn hourly_outlook(forecast: &Forecast) -> Vec<HourlyOutlook> {
    forecast
        .list
        .iter()
        .take(8)
        .filter_map(|slot| {
            Some(HourlyOutlook {
                time: slot.time()?,
                temp: slot.main.temp,
                icon: slot.icon().map(str::to_string),
            })
        })
        .collect()
}

/// One entry per UTC day, in forecast order, with the day's temperature range
/// and the icon of its middle slot.
pub fn daily_outlook(forecast: &Forecast) -> Vec<DailyOutlook> {
    struct Day<'a> {
        day: NaiveDate,
        temps: Vec<f64>,
        icons: Vec<&'a str>,
    }

    let mut days: Vec<Day<'_>> = Vec::new();
    for slot in &forecast.list {
        let Some(time) = slot.time() else { continue };
        let day = time.date_naive();
        let idx = match days.iter().position(|d| d.day == day) {
            Some(i) => i,
            None => {
                days.push(Day {
                    day,
                    temps: Vec::new(),
                    icons: Vec::new(),
                });
                days.len() - 1
            }
        };
        days[idx].temps.push(slot.main.temp);
        if let Some(icon) = slot.icon() {
            days[idx].icons.push(icon);
        }
    }

    days.into_iter()
        .map(|d| DailyOutlook {
            day: d.day,
            min: d.temps.iter().copied().fold(f64::INFINITY, f64::min),
            max: d.temps.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            icon: d.icons.get(d.icons.len() / 2).map(|s| s.to_string()),
        })
        .collect()
}

pub fn icon_url(icon: &str) -> String {
    format!("http://openweathermap.org/img/wn/{icon}@2x.png")
}
