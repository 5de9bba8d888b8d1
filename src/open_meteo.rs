use crate::configuration::Configuration;
use crate::error::FetchError;
use log::debug;
use serde_json::{Map, Value};
use std::time::Duration;
use strum_macros::EnumIter;

/// One cycle's raw reading: the `current` object of an Open-Meteo response
pub type Reading = Map<String, Value>;

/// Key of the sub-object holding the current values in every response
pub const CURRENT_KEY: &str = "current";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Contains the different reading variants that can be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Variant {
    /// Current weather from the forecast endpoint
    Weather,

    /// Pollutant concentrations from the air quality endpoint
    AirQuality,

    /// Pollen concentrations from the air quality endpoint
    Pollen,
}

impl Variant {
    /// Fields requested through the `current` query parameter, in the order
    /// the upstream API contract fixes them
    pub const fn fields(self) -> &'static [&'static str] {
        match self {
            Variant::Weather => &[
                "temperature_2m",
                "relative_humidity_2m",
                "apparent_temperature",
                "is_day",
                "precipitation",
                "rain",
                "showers",
                "snowfall",
                "weather_code",
                "cloud_cover",
                "pressure_msl",
                "surface_pressure",
                "wind_speed_10m",
                "wind_direction_10m",
                "wind_gusts_10m",
            ],
            Variant::AirQuality => &[
                "pm10",
                "pm2_5",
                "carbon_monoxide",
                "nitrogen_dioxide",
                "sulphur_dioxide",
                "ozone",
                "european_aqi",
                "us_aqi",
            ],
            Variant::Pollen => &[
                "alder_pollen",
                "birch_pollen",
                "grass_pollen",
                "mugwort_pollen",
                "olive_pollen",
                "ragweed_pollen",
            ],
        }
    }

    /// Builds the query URL for this variant.
    ///
    /// The parameter order and the field list are part of the upstream
    /// contract and must be reproduced exactly.
    pub fn url(self, config: &Configuration) -> String {
        let endpoint = match self {
            Variant::Weather => &config.open_meteo.endpoint,
            Variant::AirQuality | Variant::Pollen => &config.open_meteo.air_endpoint,
        };
        let mut url = format!(
            "{endpoint}?latitude={}&longitude={}&current={}",
            config.location.latitude,
            config.location.longitude,
            self.fields().join(",")
        );
        if self == Variant::Weather {
            url.push_str("&windspeed_unit=");
            url.push_str(&config.units.windspeed);
        }
        url
    }
}

/// HTTP client for the Open-Meteo APIs
///
/// Every call re-fetches; there is no caching and no retry. Retrying is the
/// poll loop's business, one interval later.
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Fetcher {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("Cannot build HTTP client");
        Fetcher { client }
    }

    /// Performs one GET and extracts the `current` object from the response
    pub async fn fetch(&self, url: &str) -> Result<Reading, FetchError> {
        debug!("GET {url}");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let mut body: Value = response.json().await?;

        match body.get_mut(CURRENT_KEY) {
            Some(Value::Object(current)) => Ok(std::mem::take(current)),
            _ => Err(FetchError::Schema { key: CURRENT_KEY }),
        }
    }
}

impl Default for Fetcher {
    fn default() -> Fetcher {
        Fetcher::new()
    }
}
