use crate::configuration::Configuration;
use crate::error::ConfigError;
use crate::mqtt::MessageSink;
use crate::open_meteo::Reading;
use log::error;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Flat mapping of output key to scalar value, in publication order
pub type Payload = Map<String, Value>;

const COMPASS_POINTS: usize = 16;
const SECTOR_DEGREES: f64 = 22.5;

/// Returns the compass rose for a language, checking that it has one entry
/// per 22.5° sector
pub fn compass_rose<'a>(
    table: &'a HashMap<String, Vec<String>>,
    lang: &str,
) -> Result<&'a [String], ConfigError> {
    match table.get(lang) {
        Some(points) if points.len() == COMPASS_POINTS => Ok(points),
        _ => Err(ConfigError::CompassTable(lang.to_string())),
    }
}

/// Maps wind direction degrees to a localized compass point.
///
/// The table is validated even when `deg` is `None`: a broken rose is a
/// configuration error, not a per-reading condition.
pub fn degrees_to_compass(
    deg: Option<f64>,
    table: &HashMap<String, Vec<String>>,
    lang: &str,
) -> Result<Option<String>, ConfigError> {
    let points = compass_rose(table, lang)?;

    Ok(deg.map(|deg| {
        let index = (((deg + SECTOR_DEGREES / 2.0) / SECTOR_DEGREES).floor() as i64)
            .rem_euclid(COMPASS_POINTS as i64) as usize;
        points[index].clone()
    }))
}

/// Maps a WMO weather code to a localized description.
///
/// Unknown codes and unknown languages yield an `Unknown (<code>)` fallback;
/// they must never abort a publication.
pub fn weather_code_to_text(
    code: Option<i64>,
    table: &HashMap<String, HashMap<i64, String>>,
    lang: &str,
) -> Option<String> {
    let code = code?;

    Some(match table.get(lang).and_then(|texts| texts.get(&code)) {
        Some(text) => text.clone(),
        None => format!("Unknown ({code})"),
    })
}

fn field(source: &Reading, key: &str) -> Value {
    source.get(key).cloned().unwrap_or(Value::Null)
}

fn text_value(text: Option<String>) -> Value {
    text.map_or(Value::Null, Value::String)
}

/// Flattens a current-weather reading, inserting the two enrichment fields
/// next to the values they are derived from
pub fn weather_payload(current: &Reading, config: &Configuration) -> Result<Payload, ConfigError> {
    let wind_deg = current.get("wind_direction_10m").and_then(Value::as_f64);
    let weather_code = current.get("weather_code").and_then(Value::as_i64);

    let compass = degrees_to_compass(wind_deg, &config.compass, &config.language.compass)?;
    let description =
        weather_code_to_text(weather_code, &config.weather_code, &config.language.weather);

    let mut payload = Payload::new();
    for key in [
        "temperature_2m",
        "relative_humidity_2m",
        "apparent_temperature",
        "is_day",
        "precipitation",
        "rain",
        "showers",
        "snowfall",
        "weather_code",
    ] {
        payload.insert(key.to_string(), field(current, key));
    }
    payload.insert(String::from("weather_description"), text_value(description));
    for key in [
        "cloud_cover",
        "pressure_msl",
        "surface_pressure",
        "wind_speed_10m",
        "wind_direction_10m",
    ] {
        payload.insert(key.to_string(), field(current, key));
    }
    payload.insert(String::from("wind_direction_compass"), text_value(compass));
    payload.insert(String::from("wind_gusts_10m"), field(current, "wind_gusts_10m"));
    payload.insert(String::from("time"), field(current, "time"));

    Ok(payload)
}

/// Output key and upstream field name for the pollen readings
const POLLEN_FIELDS: [(&str, &str); 6] = [
    ("pollen_alder", "alder_pollen"),
    ("pollen_birch", "birch_pollen"),
    ("pollen_grass", "grass_pollen"),
    ("pollen_mugwort", "mugwort_pollen"),
    ("pollen_olive", "olive_pollen"),
    ("pollen_ragweed", "ragweed_pollen"),
];

/// Flattens the two air quality readings into one payload, renaming the
/// pollen fields and taking the timestamp from whichever response has one
pub fn air_pollen_payload(air: &Reading, pollen: &Reading) -> Payload {
    let mut payload = Payload::new();

    for key in [
        "pm10",
        "pm2_5",
        "carbon_monoxide",
        "nitrogen_dioxide",
        "sulphur_dioxide",
        "ozone",
        "european_aqi",
        "us_aqi",
    ] {
        payload.insert(key.to_string(), field(air, key));
    }

    for (key, source_key) in POLLEN_FIELDS {
        payload.insert(key.to_string(), field(pollen, source_key));
    }

    let time = match field(air, "time") {
        Value::Null => field(pollen, "time"),
        time => time,
    };
    payload.insert(String::from("time"), time);

    payload
}

/// Ordered messages derived from one payload: one per flat key, plus the
/// whole payload as a JSON document under the `json` suffix
#[derive(Debug, PartialEq)]
pub struct PublishBatch {
    entries: Vec<(String, String)>,
}

impl PublishBatch {
    pub fn new(payload: &Payload) -> Result<PublishBatch, serde_json::Error> {
        let mut entries: Vec<(String, String)> = payload
            .iter()
            .map(|(key, value)| (key.clone(), render(value)))
            .collect();
        entries.push((String::from("json"), serde_json::to_string(payload)?));

        Ok(PublishBatch { entries })
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// The aggregate JSON document, always the last entry of the batch
    pub fn json_document(&self) -> &str {
        self.entries
            .last()
            .map(|(_, document)| document.as_str())
            .unwrap_or_default()
    }

    /// Sends every entry to `<base_topic>/<suffix>`.
    ///
    /// A failed publish is logged and the rest of the batch still goes out;
    /// there is no atomicity across the batch.
    pub async fn publish_to<S: MessageSink>(&self, sink: &S, base_topic: &str, retain: bool) {
        for (suffix, value) in &self.entries {
            let topic = format!("{base_topic}/{suffix}");
            if let Err(err) = sink.publish(topic, value, retain).await {
                error!("Publish to {base_topic}/{suffix} failed: {err}");
            }
        }
    }
}

/// Renders one scalar the way it goes on the wire: nulls as empty payloads,
/// strings unquoted, everything else as JSON
fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn english_rose() -> HashMap<String, Vec<String>> {
        let points = [
            "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
            "NW", "NNW",
        ];
        HashMap::from([(
            String::from("en"),
            points.iter().map(|p| p.to_string()).collect(),
        )])
    }

    #[test]
    fn test_compass_none_passes_through() {
        let rose = english_rose();
        assert_eq!(degrees_to_compass(None, &rose, "en").unwrap(), None);
    }

    /// 11.25° is the first sector boundary, 348.75° wraps back to north
    #[test]
    fn test_compass_sector_boundaries() {
        let rose = english_rose();

        assert_eq!(
            degrees_to_compass(Some(0.0), &rose, "en").unwrap(),
            Some(String::from("N"))
        );
        assert_eq!(
            degrees_to_compass(Some(11.25), &rose, "en").unwrap(),
            Some(String::from("NNE"))
        );
        assert_eq!(
            degrees_to_compass(Some(90.0), &rose, "en").unwrap(),
            Some(String::from("E"))
        );
        assert_eq!(
            degrees_to_compass(Some(348.75), &rose, "en").unwrap(),
            Some(String::from("N"))
        );
        assert_eq!(
            degrees_to_compass(Some(360.0), &rose, "en").unwrap(),
            Some(String::from("N"))
        );
    }

    /// The rose is validated even when there is no direction to look up,
    /// and 15 or 17 entries are as fatal as a missing language
    #[test]
    fn test_compass_table_validated_first() {
        let mut short = english_rose();
        short.get_mut("en").unwrap().pop();

        assert!(matches!(
            degrees_to_compass(None, &short, "en"),
            Err(ConfigError::CompassTable(lang)) if lang == "en"
        ));
        assert!(matches!(
            degrees_to_compass(Some(90.0), &short, "missing"),
            Err(ConfigError::CompassTable(lang)) if lang == "missing"
        ));

        let mut oversized = english_rose();
        oversized.get_mut("en").unwrap().push(String::from("N"));

        assert!(matches!(
            degrees_to_compass(Some(90.0), &oversized, "en"),
            Err(ConfigError::CompassTable(lang)) if lang == "en"
        ));
        assert!(matches!(
            degrees_to_compass(None, &oversized, "en"),
            Err(ConfigError::CompassTable(_))
        ));
    }

    #[test]
    fn test_weather_code_lookup() {
        let table = HashMap::from([(
            String::from("sv"),
            HashMap::from([(99i64, String::from("Klart"))]),
        )]);

        assert_eq!(weather_code_to_text(None, &table, "sv"), None);
        assert_eq!(
            weather_code_to_text(Some(99), &table, "sv"),
            Some(String::from("Klart"))
        );
        assert_eq!(
            weather_code_to_text(Some(42), &table, "sv"),
            Some(String::from("Unknown (42)"))
        );
        // A missing language falls back the same way instead of failing
        assert_eq!(
            weather_code_to_text(Some(99), &HashMap::new(), "sv"),
            Some(String::from("Unknown (99)"))
        );
    }

    fn sample_config() -> Configuration {
        Configuration::load("conf/open-meteo-mqtt.yaml").expect("Cannot load example config")
    }

    fn sample_current() -> Reading {
        let Value::Object(current) = json!({
            "temperature_2m": 5.2,
            "relative_humidity_2m": 81,
            "apparent_temperature": 2.9,
            "is_day": 1,
            "precipitation": 0.0,
            "rain": 0.0,
            "showers": 0.0,
            "snowfall": 0.0,
            "weather_code": 2,
            "cloud_cover": 55,
            "pressure_msl": 1013.2,
            "surface_pressure": 1010.8,
            "wind_speed_10m": 4.7,
            "wind_direction_10m": 90,
            "wind_gusts_10m": 9.1,
            "time": "2026-02-09T10:00"
        }) else {
            unreachable!()
        };
        current
    }

    #[test]
    fn test_weather_payload_enrichment_and_order() {
        let payload = weather_payload(&sample_current(), &sample_config()).unwrap();

        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "temperature_2m",
                "relative_humidity_2m",
                "apparent_temperature",
                "is_day",
                "precipitation",
                "rain",
                "showers",
                "snowfall",
                "weather_code",
                "weather_description",
                "cloud_cover",
                "pressure_msl",
                "surface_pressure",
                "wind_speed_10m",
                "wind_direction_10m",
                "wind_direction_compass",
                "wind_gusts_10m",
                "time",
            ]
        );

        assert_eq!(payload["weather_description"], json!("Delvis molnigt"));
        // 90° is due east, "O" in the Swedish rose
        assert_eq!(payload["wind_direction_compass"], json!("O"));
        assert_eq!(payload["time"], json!("2026-02-09T10:00"));
    }

    /// Fields the response left out are published as nulls, not dropped
    #[test]
    fn test_weather_payload_absent_fields() {
        let Value::Object(current) = json!({"temperature_2m": -3.0}) else {
            unreachable!()
        };
        let payload = weather_payload(&current, &sample_config()).unwrap();

        assert_eq!(payload.len(), 18);
        assert_eq!(payload["wind_direction_10m"], Value::Null);
        assert_eq!(payload["wind_direction_compass"], Value::Null);
        assert_eq!(payload["weather_description"], Value::Null);
    }

    #[test]
    fn test_air_pollen_payload() {
        let Value::Object(air) = json!({
            "pm10": 11.6, "pm2_5": 7.3, "carbon_monoxide": 213.0,
            "nitrogen_dioxide": 14.2, "sulphur_dioxide": 1.8, "ozone": 61.0,
            "european_aqi": 28, "us_aqi": 35, "time": "2026-02-09T10:00"
        }) else {
            unreachable!()
        };
        let Value::Object(pollen) = json!({
            "alder_pollen": 0.4, "birch_pollen": 0.0, "grass_pollen": 0.0,
            "mugwort_pollen": 0.0, "olive_pollen": 0.0, "ragweed_pollen": 0.0,
            "time": "2026-02-09T11:00"
        }) else {
            unreachable!()
        };

        let payload = air_pollen_payload(&air, &pollen);

        assert_eq!(payload["pollen_alder"], json!(0.4));
        assert!(!payload.contains_key("alder_pollen"));
        // The air response timestamp wins when both are present
        assert_eq!(payload["time"], json!("2026-02-09T10:00"));

        let air_without_time: Reading = air
            .iter()
            .filter(|(key, _)| *key != "time")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let fallback = air_pollen_payload(&air_without_time, &pollen);
        assert_eq!(fallback["time"], json!("2026-02-09T11:00"));
    }

    #[test]
    fn test_batch_rendering_and_round_trip() {
        let payload = weather_payload(&sample_current(), &sample_config()).unwrap();
        let batch = PublishBatch::new(&payload).unwrap();

        // One message per field plus the aggregate document
        assert_eq!(batch.entries().len(), payload.len() + 1);

        let (last_suffix, document) = batch.entries().last().unwrap();
        assert_eq!(last_suffix, "json");

        let round_trip: Payload = serde_json::from_str(document).unwrap();
        assert_eq!(round_trip, payload);

        for (suffix, value) in batch.entries() {
            match suffix.as_str() {
                "temperature_2m" => assert_eq!(value, "5.2"),
                "weather_description" => assert_eq!(value, "Delvis molnigt"),
                "time" => assert_eq!(value, "2026-02-09T10:00"),
                _ => {}
            }
        }
    }

    #[test]
    fn test_null_renders_as_empty_payload() {
        let Value::Object(current) = json!({}) else {
            unreachable!()
        };
        let payload = weather_payload(&current, &sample_config()).unwrap();
        let batch = PublishBatch::new(&payload).unwrap();

        assert_eq!(batch.entries()[0].0, "temperature_2m");
        assert_eq!(batch.entries()[0].1, "");
    }

    /// The mapping carries no state from cycle to cycle
    #[test]
    fn test_batch_idempotence() {
        let config = sample_config();
        let current = sample_current();

        let first = PublishBatch::new(&weather_payload(&current, &config).unwrap()).unwrap();
        let second = PublishBatch::new(&weather_payload(&current, &config).unwrap()).unwrap();

        assert_eq!(first, second);
    }
}
