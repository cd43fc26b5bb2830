//! Application configuration, loaded from JSON. Every field has a default, so
//! an empty object is a valid config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, services::weather::Coordinates};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseholdConfig {
    pub weather: WeatherConfig,
    pub storage: StorageConfig,
    /// Where the session file lives. `None` keeps the session in memory.
    pub session_path: Option<PathBuf>,
}

impl HouseholdConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: String,
    /// Defaults to `https://api.openweathermap.org`.
    pub base_url: String,
    /// Language of condition descriptions. Defaults to `de`.
    pub lang: String,
    /// Used when the device location is unknown.
    pub location: Coordinates,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openweathermap.org".to_string(),
            lang: "de".to_string(),
            location: Coordinates::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub public_base_url: String,
    pub photos_bucket: String,
    pub news_bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            public_base_url: String::new(),
            photos_bucket: "photos".to_string(),
            news_bucket: "news-images".to_string(),
        }
    }
}
