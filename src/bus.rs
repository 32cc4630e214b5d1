//! Message bus client (MQTT).
//!
//! `connect` blocks until the broker acknowledges the session, then hands
//! the event loop to a background thread. That thread delivers inbound
//! messages to the handlers registered with [`BusClient::subscribe`]; it is
//! the only code that runs outside the dispatcher loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use rumqttc::{Client, Connection, Event, MqttOptions, Outgoing, Packet, QoS};

use crate::config::BusConfig;
use crate::error::{BridgeError, Result};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Publisher – the outbound seam used by the dispatcher
// ---------------------------------------------------------------------------

/// Something that can put a text payload on a topic.
///
/// Implementations must not block: the dispatcher calls this inline.
pub trait Publisher {
    fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

impl<T: Publisher + ?Sized> Publisher for &T {
    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        (**self).publish(topic, payload)
    }
}

impl<T: Publisher + ?Sized> Publisher for Arc<T> {
    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        (**self).publish(topic, payload)
    }
}

// ---------------------------------------------------------------------------
// Subscriptions – inbound routing table
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&[u8]) + Send + 'static>;

/// Topic → handler table shared with the listener thread.
#[derive(Clone, Default)]
pub struct Subscriptions {
    handlers: Arc<Mutex<HashMap<String, Handler>>>,
}

impl Subscriptions {
    pub fn register(&self, topic: &str, handler: impl Fn(&[u8]) + Send + 'static) {
        self.lock().insert(topic.to_string(), Box::new(handler));
    }

    /// Run the handler for `topic`. Returns false if nobody subscribed.
    pub fn deliver(&self, topic: &str, payload: &[u8]) -> bool {
        match self.lock().get(topic) {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    pub fn topics(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Handler>> {
        self.handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// BusClient
// ---------------------------------------------------------------------------

/// A live broker connection.
///
/// Dropping the client disconnects and stops the listener thread.
pub struct BusClient {
    client: Client,
    subscriptions: Subscriptions,
    shutting_down: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl BusClient {
    /// Connect to the broker and start the listener thread.
    ///
    /// Fails with [`BridgeError::BusConnection`] if the broker cannot be
    /// reached or refuses the session.
    pub fn connect(config: &BusConfig) -> Result<Self> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);

        let (client, mut connection) = Client::new(options, config.request_capacity);
        info!("Connecting to MQTT broker {}:{}", config.host, config.port);
        wait_for_connack(&mut connection)?;
        info!("Connected to MQTT broker {}:{}", config.host, config.port);

        let subscriptions = Subscriptions::default();
        let shutting_down = Arc::new(AtomicBool::new(false));
        let listener = {
            let client = client.clone();
            let subscriptions = subscriptions.clone();
            let shutting_down = shutting_down.clone();
            thread::Builder::new()
                .name("bus-listener".to_string())
                .spawn(move || listen(connection, client, subscriptions, shutting_down))
                .map_err(|e| BridgeError::BusConnection(format!("spawning listener: {e}")))?
        };

        Ok(Self {
            client,
            subscriptions,
            shutting_down,
            listener: Some(listener),
        })
    }

    /// Subscribe to `topic`; `handler` runs on the listener thread once per
    /// inbound message.
    pub fn subscribe(&self, topic: &str, handler: impl Fn(&[u8]) + Send + 'static) -> Result<()> {
        self.subscriptions.register(topic, handler);
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| BridgeError::Bus(format!("subscribe {topic}: {e}")))?;
        info!("Subscribed to {topic}");
        Ok(())
    }

    /// Disconnect and wait for the listener to finish.
    pub fn disconnect(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.client.disconnect() {
            debug!("MQTT disconnect request failed: {e}");
        }
        if let Some(handle) = self.listener.take() {
            if handle.join().is_err() {
                error!("Bus listener thread panicked");
            }
        }
        info!("Disconnected from MQTT broker");
    }
}

impl Publisher for BusClient {
    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        publish_now(&self.client, topic, payload)
    }
}

/// Queue a QoS 0 publish without waiting for room in the request queue.
fn publish_now(client: &Client, topic: &str, payload: &str) -> Result<()> {
    client
        .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
        .map_err(|e| BridgeError::Bus(format!("publish to {topic}: {e}")))?;
    trace!("Published {} bytes to {topic}", payload.len());
    Ok(())
}

impl Drop for BusClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll the event loop until the broker answers the CONNECT.
fn wait_for_connack(connection: &mut Connection) -> Result<()> {
    for event in connection.iter() {
        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                debug!("CONNACK: {:?}", ack.code);
                return Ok(());
            }
            Ok(other) => trace!("Bus event before CONNACK: {other:?}"),
            Err(e) => return Err(BridgeError::BusConnection(e.to_string())),
        }
    }
    Err(BridgeError::BusConnection(
        "event loop ended before the broker answered".to_string(),
    ))
}

/// Listener thread body.
fn listen(
    mut connection: Connection,
    client: Client,
    subscriptions: Subscriptions,
    shutting_down: Arc<AtomicBool>,
) {
    for event in connection.iter() {
        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                trace!("Inbound message on {}", publish.topic);
                if !subscriptions.deliver(&publish.topic, &publish.payload) {
                    debug!("No handler for topic {}", publish.topic);
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                // clean sessions drop subscriptions across reconnects
                info!("Reconnected to MQTT broker");
                for topic in subscriptions.topics() {
                    if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                        warn!("Resubscribe to {topic} failed: {e}");
                    }
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) if shutting_down.load(Ordering::SeqCst) => {
                break;
            }
            Ok(_) => {}
            Err(e) => {
                if shutting_down.load(Ordering::SeqCst) {
                    break;
                }
                warn!("MQTT connection error: {e}; retrying");
                thread::sleep(RECONNECT_BACKOFF);
            }
        }
    }
    debug!("Bus listener stopped");
}
