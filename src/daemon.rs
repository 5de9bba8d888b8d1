use crate::configuration::Configuration;
use crate::error::CycleError;
use crate::mqtt::{LogEvents, MessageSink, MqttSink, run_event_loop};
use crate::open_meteo::{Fetcher, Variant};
use crate::payload::{self, PublishBatch};
use log::{debug, error, info};
use rumqttc::{AsyncClient, MqttOptions};
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tokio::signal::unix::SignalKind;
use tokio::task;
use tokio::time::sleep;

/// Daemon that periodically fetches readings and publishes them to MQTT
pub struct Daemon {
    config: Configuration,
    mqtt_config: MqttOptions,
    fetcher: Fetcher,

    weather_url: String,
    air_url: String,
    pollen_url: String,
}

impl Daemon {
    /// Constructs a daemon from the specified configuration
    ///
    /// ```
    /// use open_meteo_mqtt::{Configuration, Daemon};
    ///
    /// let config = Configuration::load("conf/open-meteo-mqtt.yaml").expect("Cannot load configuration");
    /// let daemon = Daemon::new(config);
    ///
    /// // later, run daemon.run() in an async function
    /// ```
    pub fn new(config: Configuration) -> Daemon {
        info!("Daemon for {} starting", config.mqtt.client_id);

        let mut mqtt_config =
            MqttOptions::new(&config.mqtt.client_id, &config.mqtt.broker, config.mqtt.port);
        mqtt_config.set_keep_alive(Duration::from_secs(config.mqtt.keepalive));
        if let (Some(username), Some(password)) = (&config.mqtt.username, &config.mqtt.password) {
            mqtt_config.set_credentials(username, password);
        }

        info!(
            "Connecting to MQTT broker {}:{}",
            config.mqtt.broker, config.mqtt.port
        );

        Daemon {
            mqtt_config,
            fetcher: Fetcher::new(),
            weather_url: Variant::Weather.url(&config),
            air_url: Variant::AirQuality.url(&config),
            pollen_url: Variant::Pollen.url(&config),
            config,
        }
    }

    /// Runs the main loop that periodically sends the MQTT messages
    pub async fn run(&self) {
        let (client, event_loop) = AsyncClient::new(self.mqtt_config.clone(), 10);
        let connected = Arc::new(AtomicBool::new(false));

        task::spawn(run_event_loop(
            event_loop,
            LogEvents,
            Arc::clone(&connected),
            Duration::from_secs(self.config.mqtt.reconnect_delay_seconds),
        ));

        let sink = MqttSink::new(client.clone(), connected);

        self.main_loop(&sink).await.unwrap_or_else(|e| {
            error!("Main loop failed: {e}");
        });

        if let Err(e) = client.disconnect().await {
            error!("MQTT disconnect failed: {e}");
        }
        // Let the event loop flush what is still queued
        sleep(Duration::from_secs(1)).await;
    }

    /// Poll loop: one cycle, then sleep until the next interval or a signal
    async fn main_loop<S: MessageSink>(&self, sink: &S) -> Result<(), Box<dyn Error>> {
        let sleep_period = Duration::from_secs(self.config.publish.interval_seconds);
        // Registered once before the loop: a signal that arrives while a
        // cycle is still running is buffered until the select polls the
        // stream again.
        let mut interrupt_signal = tokio::signal::unix::signal(SignalKind::interrupt())?;
        let mut terminate_signal = tokio::signal::unix::signal(SignalKind::terminate())?;

        loop {
            self.run_cycle(sink).await;

            tokio::select! {
                _ = sleep(sleep_period) => {},
                _ = interrupt_signal.recv() => {
                    debug!("Ctrl-C received");
                    break;
                },
                _ = terminate_signal.recv() => {
                    debug!("Interrupt received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// One publish cycle. Every error is caught here so a bad cycle never
    /// takes the loop down.
    pub async fn run_cycle<S: MessageSink>(&self, sink: &S) {
        if !sink.is_connected() {
            debug!("MQTT link is down, messages will be buffered");
        }

        if let Some(base) = &self.config.mqtt.base_topic_weather {
            if let Err(e) = self.weather_cycle(sink, base).await {
                error!("Weather cycle failed: {e}");
            }
        }

        if let Some(base) = &self.config.mqtt.base_topic_air {
            if let Err(e) = self.air_pollen_cycle(sink, base).await {
                error!("Air quality cycle failed: {e}");
            }
        }
    }

    async fn weather_cycle<S: MessageSink>(&self, sink: &S, base: &str) -> Result<(), CycleError> {
        let current = self.fetcher.fetch(&self.weather_url).await?;
        let payload = payload::weather_payload(&current, &self.config)?;

        let batch = PublishBatch::new(&payload)?;
        batch.publish_to(sink, base, self.config.mqtt.retain).await;

        info!("Published: {}", batch.json_document());
        Ok(())
    }

    /// The upstream API keeps pollutants and pollen behind separate field
    /// lists, so this stays two GET calls per cycle.
    async fn air_pollen_cycle<S: MessageSink>(
        &self,
        sink: &S,
        base: &str,
    ) -> Result<(), CycleError> {
        let air = self.fetcher.fetch(&self.air_url).await?;
        let pollen = self.fetcher.fetch(&self.pollen_url).await?;
        let payload = payload::air_pollen_payload(&air, &pollen);

        let batch = PublishBatch::new(&payload)?;
        batch.publish_to(sink, base, self.config.mqtt.retain).await;

        info!("Published air quality + pollen: {}", batch.json_document());
        Ok(())
    }
}
