use thiserror::Error;

/// Errors in the configuration file. These are fatal: the process refuses to
/// start before any network connection is attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The compass rose for a configured language is missing or does not have
    /// one entry per 22.5° sector.
    #[error("compass table for language '{0}' must contain exactly 16 entries")]
    CompassTable(String),

    #[error("at least one of mqtt.base_topic_weather or mqtt.base_topic_air must be set")]
    NoBaseTopic,
}

/// Errors while fetching a reading from the Open-Meteo API.
///
/// These are per-cycle errors: the daemon logs them and retries on the next
/// scheduled cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport failure or non-2xx HTTP status.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response parsed as JSON but the expected sub-object is absent.
    #[error("response has no '{key}' object")]
    Schema { key: &'static str },
}

/// A single MQTT publish failed. The remaining messages of the batch are
/// still sent.
#[derive(Debug, Error)]
#[error("publish failed: {0}")]
pub struct PublishError(#[from] rumqttc::ClientError);

/// Anything that can abort one publish cycle. Caught at the cycle boundary,
/// never propagated out of the main loop.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
