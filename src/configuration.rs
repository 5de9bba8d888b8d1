use crate::error::ConfigError;
use crate::payload;
use serde::Deserialize;
use serde_inline_default::serde_inline_default;
use std::collections::HashMap;

/// Contains the location that readings are fetched for
#[derive(Deserialize)]
pub struct Location {
    /// Latitude in decimal degrees
    pub latitude: f64,

    /// Longitude in decimal degrees
    pub longitude: f64,
}

/// Contains the configuration for communicating with the MQTT broker
#[serde_inline_default]
#[derive(Deserialize)]
pub struct Mqtt {
    /// Hostname or IP address of the broker
    pub broker: String,

    /// Port of the connection to the broker
    pub port: u16,

    /// Client identifier presented to the broker
    pub client_id: String,

    /// Username for the connection to the broker. Default: none
    #[serde(default)]
    pub username: Option<String>,

    /// Password for the connection to the broker. Default: none
    #[serde(default)]
    pub password: Option<String>,

    /// Keepalive interval in seconds. Default: 60
    #[serde_inline_default(60)]
    pub keepalive: u64,

    /// Whether the broker should retain the last message on each topic. Default: true
    #[serde_inline_default(true)]
    pub retain: bool,

    /// Topic root for the weather readings. The weather job only runs when
    /// this is set.
    #[serde(default)]
    pub base_topic_weather: Option<String>,

    /// Topic root for the air quality + pollen readings. The air job only
    /// runs when this is set.
    #[serde(default)]
    pub base_topic_air: Option<String>,

    /// Pause before the event loop polls again after a connection error,
    /// in seconds. Default: 5
    #[serde_inline_default(5)]
    pub reconnect_delay_seconds: u64,
}

/// Contains the publish schedule
#[derive(Deserialize)]
pub struct Publish {
    /// Delay between two poll cycles in seconds
    pub interval_seconds: u64,
}

/// Contains the units passed through to the API query
#[derive(Deserialize)]
pub struct Units {
    /// Wind speed unit, e.g. `ms`, `kmh`, `mph` or `kn`
    pub windspeed: String,
}

/// Contains the Open-Meteo endpoints
#[serde_inline_default]
#[derive(Deserialize)]
pub struct OpenMeteo {
    /// Forecast endpoint used for the weather readings
    #[serde_inline_default(String::from("https://api.open-meteo.com/v1/forecast"))]
    pub endpoint: String,

    /// Air quality endpoint used for both the pollutant and the pollen readings
    #[serde_inline_default(String::from(
        "https://air-quality-api.open-meteo.com/v1/air-quality"
    ))]
    pub air_endpoint: String,
}

impl Default for OpenMeteo {
    fn default() -> OpenMeteo {
        OpenMeteo {
            endpoint: String::from("https://api.open-meteo.com/v1/forecast"),
            air_endpoint: String::from("https://air-quality-api.open-meteo.com/v1/air-quality"),
        }
    }
}

/// Contains the languages used for the enrichment lookups
#[serde_inline_default]
#[derive(Deserialize)]
pub struct Language {
    /// Language of the compass rose. Default: sv
    #[serde_inline_default(String::from("sv"))]
    pub compass: String,

    /// Language of the weather code descriptions. Default: sv
    #[serde_inline_default(String::from("sv"))]
    pub weather: String,
}

impl Default for Language {
    fn default() -> Language {
        Language {
            compass: String::from("sv"),
            weather: String::from("sv"),
        }
    }
}

/// Contains all the configuration for `open-meteo-mqtt`
#[serde_inline_default]
#[derive(Deserialize)]
pub struct Configuration {
    /// Contains the location that readings are fetched for
    pub location: Location,

    /// Contains the configuration for communicating with the MQTT broker
    pub mqtt: Mqtt,

    /// Contains the publish schedule
    pub publish: Publish,

    /// Contains the units passed through to the API query
    pub units: Units,

    /// Contains the Open-Meteo endpoints
    #[serde(default)]
    pub open_meteo: OpenMeteo,

    /// Contains the languages used for the enrichment lookups
    #[serde(default)]
    pub language: Language,

    /// Compass rose per language, each exactly 16 entries from N clockwise
    #[serde(default)]
    pub compass: HashMap<String, Vec<String>>,

    /// WMO weather code descriptions per language
    #[serde(default)]
    pub weather_code: HashMap<String, HashMap<i64, String>>,

    /// Sets the verbosity of the logs.
    ///   * 1 => Error
    ///   * 2 => Warning
    ///   * 3 => Info
    ///   * 4 => Debug
    ///   * 5 => Trace
    #[serde_inline_default(2)]
    #[serde(rename = "log-verbosity")]
    pub log_verbosity: usize,
}

impl Configuration {
    /// Load and validate the configuration from a file
    ///
    /// ## Example
    ///
    /// ```
    /// use open_meteo_mqtt::Configuration;
    ///
    /// let config = Configuration::load("conf/open-meteo-mqtt.yaml").expect("Cannot load configuration");
    ///
    /// assert_eq!(config.mqtt.broker, "localhost");
    /// ```
    pub fn load(path: &str) -> Result<Configuration, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: Configuration = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants that must hold before any network connection is
    /// attempted
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.base_topic_weather.is_none() && self.mqtt.base_topic_air.is_none() {
            return Err(ConfigError::NoBaseTopic);
        }

        // The weather job indexes the compass rose on every cycle.
        if self.mqtt.base_topic_weather.is_some() {
            payload::compass_rose(&self.compass, &self.language.compass)?;
        }

        Ok(())
    }
}
