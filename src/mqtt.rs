//! MQTT adapter backed by `rumqttc`.
//!
//! A single background actor task owns the `EventLoop`. It:
//!
//! - subscribes to the device topics on every successful `ConnAck`, so a
//!   reconnect restores the subscriptions without caller involvement,
//! - forwards every incoming publish to the `MessageSink`,
//! - reports connectivity transitions to the sink,
//! - backs off for `RECONNECT_DELAY` after a connection error before
//!   polling again (polling is what drives rumqttc's reconnect).
//!
//! Outbound publication goes through `AsyncClient::try_publish`, which only
//! enqueues the request for the actor and never blocks the caller.

use crate::bus::{MessageBus, MessageSink};
use crate::config::MonitorSettings;
use crate::error::BusError;
use crate::protocol::Topics;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const REQUEST_CHANNEL_CAPACITY: usize = 16;

pub struct MqttBus {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    actor: JoinHandle<()>,
}

impl MqttBus {
    /// Creates the client and spawns the event loop actor.
    ///
    /// Infallible: the broker connection is made lazily by the first poll,
    /// and its outcome is reported through `sink.on_connection_change`.
    /// Must be called from within a tokio runtime.
    pub fn connect<S: MessageSink>(settings: &MonitorSettings, sink: S) -> Self {
        let mut options = MqttOptions::new(
            settings.client_id(),
            settings.broker_host.clone(),
            settings.broker_port,
        );
        options.set_keep_alive(settings.keep_alive);
        options.set_clean_session(true);

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        info!(
            "Connecting to MQTT broker {}:{}...",
            settings.broker_host, settings.broker_port
        );

        let actor = MqttActor {
            client: client.clone(),
            event_loop,
            topics: settings.topics(),
            connected: Arc::clone(&connected),
            sink,
        };

        Self {
            client,
            connected,
            actor: tokio::spawn(actor.run()),
        }
    }

    /// Disconnects from the broker and stops the actor.
    pub async fn shutdown(&self) {
        self.connected.store(false, Ordering::Release);

        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT disconnect request failed: {}", e);
        }

        // Give the actor a moment to flush the DISCONNECT packet
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.actor.abort();
    }
}

impl MessageBus for MqttBus {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::TransportUnavailable);
        }

        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| BusError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

struct MqttActor<S: MessageSink> {
    client: AsyncClient,
    event_loop: EventLoop,
    topics: Topics,
    connected: Arc<AtomicBool>,
    sink: S,
}

impl<S: MessageSink> MqttActor<S> {
    async fn run(mut self) {
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.sink.on_message(&publish.topic, &publish.payload);
                }
                Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                    self.handle_connack(connack.code);
                }
                Ok(Event::Incoming(Packet::SubAck(suback))) => {
                    let rejected = suback
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, rumqttc::SubscribeReasonCode::Failure));
                    if rejected {
                        error!("Broker rejected subscription: {:?}", suback.return_codes);
                    }
                }
                Ok(event) => {
                    debug!("MQTT event ignored: {:?}", event);
                }
                Err(e) => {
                    self.set_connected(false);
                    error!("MQTT connection error: {}", e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    fn handle_connack(&mut self, code: ConnectReturnCode) {
        if code != ConnectReturnCode::Success {
            error!("❌ Broker refused connection: {:?}", code);
            self.set_connected(false);
            return;
        }

        info!("✅ Connected to MQTT broker");

        // try_subscribe: awaiting here would deadlock against our own poll loop
        for topic in self.topics.inbound() {
            match self.client.try_subscribe(topic, QoS::AtMostOnce) {
                Ok(()) => info!("Subscribed to {}", topic),
                Err(e) => warn!("Subscribe to {} failed: {}", topic, e),
            }
        }

        self.set_connected(true);
    }

    fn set_connected(&self, connected: bool) {
        let previous = self.connected.swap(connected, Ordering::AcqRel);
        if previous != connected {
            self.sink.on_connection_change(connected);
        }
    }
}
