//! # open-meteo-mqtt
//!
//! `open-meteo-mqtt` fetches current weather, air quality and pollen readings
//! from the Open-Meteo APIs and republishes them to an MQTT broker, one topic
//! per field plus an aggregate JSON document.
//!
//!

pub use self::configuration::Configuration;
pub use self::configuration::Mqtt;
pub use self::daemon::Daemon;
pub use self::error::ConfigError;
pub use self::error::CycleError;
pub use self::error::FetchError;
pub use self::error::PublishError;
pub use self::mqtt::ConnectionEvents;
pub use self::mqtt::MessageSink;
pub use self::open_meteo::Fetcher;
pub use self::open_meteo::Reading;
pub use self::open_meteo::Variant;
pub use self::payload::Payload;
pub use self::payload::PublishBatch;

/// Contains the configuration stuff
pub mod configuration;
/// Contains the daemon code
pub mod daemon;
/// Contains the error types
pub mod error;
/// Contains the MQTT plumbing
pub mod mqtt;
/// Contains the Open-Meteo client
pub mod open_meteo;
/// Contains the payload that is sent to MQTT
pub mod payload;
