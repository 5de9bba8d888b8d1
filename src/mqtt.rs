use crate::error::PublishError;
use log::{debug, error, info, trace, warn};
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;

/// Capability handed to the publishing code.
///
/// The mapping logic only ever submits messages and checks the link state,
/// so tests can swap in a recorder for the real client.
#[allow(async_fn_in_trait)]
pub trait MessageSink {
    async fn publish(&self, topic: String, payload: &str, retain: bool) -> Result<(), PublishError>;

    fn is_connected(&self) -> bool;
}

/// Observer for broker connection transitions, used only for logging
pub trait ConnectionEvents {
    fn on_connect(&self);

    fn on_disconnect(&self);
}

/// Default observer that reports transitions to the log
pub struct LogEvents;

impl ConnectionEvents for LogEvents {
    fn on_connect(&self) {
        info!("MQTT connected");
    }

    fn on_disconnect(&self) {
        warn!("MQTT disconnected");
    }
}

/// Publishing half of the MQTT connection, shared with the daemon loop
pub struct MqttSink {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttSink {
    pub fn new(client: AsyncClient, connected: Arc<AtomicBool>) -> MqttSink {
        MqttSink { client, connected }
    }
}

impl MessageSink for MqttSink {
    async fn publish(&self, topic: String, payload: &str, retain: bool) -> Result<(), PublishError> {
        debug!("Publishing to topic {topic} : {payload}");
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await
            .map_err(PublishError::from)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Drives the rumqttc event loop for the lifetime of the process.
///
/// Poll errors do not end the loop: rumqttc reconnects on the next poll, and
/// `reconnect_delay` spaces the attempts out.
pub async fn run_event_loop<E: ConnectionEvents>(
    mut event_loop: EventLoop,
    events: E,
    connected: Arc<AtomicBool>,
    reconnect_delay: Duration,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::Relaxed);
                events.on_connect();
            }
            Ok(notification) => trace!("MQTT notification received: {notification:?}"),
            Err(err) => {
                error!("MQTT connection error: {err}");
                if connected.swap(false, Ordering::Relaxed) {
                    events.on_disconnect();
                }
                sleep(reconnect_delay).await;
            }
        }
    }
}
