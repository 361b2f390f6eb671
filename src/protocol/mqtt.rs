// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT queue channel for notification messages.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::{Mutex, mpsc, watch};

use crate::error::DeliveryError;
use crate::notify::QueueChannel;

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Delay before polling the event loop again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Capacity of the client request buffer.
const REQUEST_CAPACITY: usize = 10;

/// Connection state reported by the event loop task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Connecting,
    Connected,
    Closed,
}

/// Publish progress reported by the event loop task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent(u16),
    Acked(u16),
}

/// [`QueueChannel`] publishing each message to a fixed MQTT topic.
///
/// Messages are sent with QoS 1 and without the retain flag. A publish only
/// succeeds once the broker acknowledged the message; while the broker is
/// unreachable it fails immediately with [`DeliveryError::NotConnected`].
/// The connection is driven by a background task that keeps reconnecting
/// after errors.
///
/// # Examples
///
/// ```ignore
/// use alarm_watcher::notify::QueueChannel;
/// use alarm_watcher::protocol::MqttQueueBuilder;
///
/// let queue = MqttQueueBuilder::new()
///     .broker("mqtt://192.168.1.50:1883")
///     .topic("alarms/status")
///     .build()
///     .await?;
/// queue.publish("Home Alarm - Started Firing").await?;
/// ```
#[derive(Debug, Clone)]
pub struct MqttQueue {
    client: AsyncClient,
    topic: String,
    timeout: Duration,
    link: watch::Receiver<Link>,
    // Held for the whole publish, so acks always belong to one message.
    deliveries: Arc<Mutex<mpsc::UnboundedReceiver<Delivery>>>,
}

impl MqttQueue {
    /// Default time allowed for the broker to acknowledge a message.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    fn from_parts(
        client: AsyncClient,
        topic: String,
        timeout: Duration,
        link: watch::Receiver<Link>,
        deliveries: mpsc::UnboundedReceiver<Delivery>,
    ) -> Self {
        Self {
            client,
            topic,
            timeout,
            link,
            deliveries: Arc::new(Mutex::new(deliveries)),
        }
    }

    /// Returns the topic messages are published to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the acknowledgement timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns `true` while the broker connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.link.borrow() == Link::Connected
    }

    /// Disconnects from the broker and waits for the connection task to
    /// flush outstanding requests and stop.
    ///
    /// Returns immediately when no connection is established.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued or the
    /// connection task does not stop within the timeout.
    pub async fn disconnect(&self) -> Result<(), DeliveryError> {
        if !self.is_connected() {
            tracing::debug!("MQTT queue not connected, nothing to flush");
            return Ok(());
        }

        self.client.try_disconnect()?;

        let mut link = self.link.clone();
        let closed = async move {
            // A dropped sender means the task already ended.
            let _ = link.wait_for(|state| *state == Link::Closed).await;
        };
        tokio::time::timeout(self.timeout, closed)
            .await
            .map_err(|_| DeliveryError::Timeout(millis(self.timeout)))
    }

    async fn publish_acknowledged(&self, body: &str) -> Result<(), DeliveryError> {
        let mut deliveries = self.deliveries.lock().await;

        if !self.is_connected() {
            return Err(DeliveryError::NotConnected);
        }

        // Progress of earlier, timed out messages.
        while deliveries.try_recv().is_ok() {}

        self.client
            .try_publish(&self.topic, QoS::AtLeastOnce, false, body.as_bytes().to_vec())?;

        await_ack(&mut deliveries).await
    }
}

impl QueueChannel for MqttQueue {
    async fn publish(&self, body: &str) -> Result<(), DeliveryError> {
        tracing::debug!(topic = %self.topic, payload = %body, "Publishing notification");

        tokio::time::timeout(self.timeout, self.publish_acknowledged(body))
            .await
            .map_err(|_| DeliveryError::Timeout(millis(self.timeout)))?
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Waits until the first packet sent after the call is acknowledged.
async fn await_ack(
    deliveries: &mut mpsc::UnboundedReceiver<Delivery>,
) -> Result<(), DeliveryError> {
    let mut sent = None;

    while let Some(delivery) = deliveries.recv().await {
        match delivery {
            Delivery::Sent(pkid) => {
                sent.get_or_insert(pkid);
            }
            Delivery::Acked(pkid) if sent == Some(pkid) => return Ok(()),
            Delivery::Acked(_) => {}
        }
    }

    Err(DeliveryError::NotConnected)
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16), DeliveryError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| DeliveryError::Rejected(format!("invalid broker port: {p}")))?;
        (h.to_string(), port)
    } else {
        (url.to_string(), 1883)
    };

    Ok((host, port))
}

/// Drives the MQTT connection in the background.
async fn handle_mqtt_events(
    mut event_loop: EventLoop,
    link: watch::Sender<Link>,
    deliveries: mpsc::UnboundedSender<Delivery>,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::info!(?connack, "Connected to MQTT broker");
                link.send_replace(Link::Connected);
            }
            Ok(Event::Incoming(Packet::PubAck(puback))) => {
                tracing::trace!(pkid = puback.pkid, "Notification acknowledged by broker");
                let _ = deliveries.send(Delivery::Acked(puback.pkid));
            }
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                let _ = deliveries.send(Delivery::Sent(pkid));
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT client disconnecting");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                link.send_replace(Link::Connecting);
                tracing::warn!(error = %e, "MQTT connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }

    link.send_replace(Link::Closed);
}

/// Builder for an [`MqttQueue`].
#[derive(Debug, Default)]
pub struct MqttQueueBuilder {
    broker: Option<String>,
    topic: Option<String>,
    username: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
    keep_alive: Option<Duration>,
    timeout: Option<Duration>,
}

impl MqttQueueBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the MQTT broker URL.
    #[must_use]
    pub fn broker(mut self, broker: impl Into<String>) -> Self {
        self.broker = Some(broker.into());
        self
    }

    /// Sets the topic notifications are published to.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Sets authentication credentials for the MQTT broker.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets a custom client ID.
    #[must_use]
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.keep_alive = Some(duration);
        self
    }

    /// Sets how long a publish waits for the broker acknowledgement.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the queue and starts its connection task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the broker or topic is missing or the broker URL is
    /// malformed.
    pub async fn build(self) -> Result<MqttQueue, DeliveryError> {
        let broker = self
            .broker
            .ok_or_else(|| DeliveryError::Rejected("broker is required".to_string()))?;

        let topic = self
            .topic
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DeliveryError::Rejected("topic is required".to_string()))?;

        let (host, port) = parse_mqtt_url(&broker)?;

        // PID + counter avoids clashes between restarts sharing a broker
        let client_id = self.client_id.unwrap_or_else(|| {
            let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("alarm_watcher_{}_{}", std::process::id(), counter)
        });

        let mut mqtt_options = MqttOptions::new(&client_id, host, port);
        mqtt_options.set_keep_alive(self.keep_alive.unwrap_or(Duration::from_secs(30)));
        mqtt_options.set_clean_session(true);

        if let (Some(username), Some(password)) = (self.username, self.password) {
            mqtt_options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);
        let (link_tx, link_rx) = watch::channel(Link::Connecting);
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();

        tokio::spawn(handle_mqtt_events(event_loop, link_tx, delivery_tx));

        tracing::info!(broker = %broker, topic = %topic, "MQTT queue channel ready");

        Ok(MqttQueue::from_parts(
            client,
            topic,
            self.timeout.unwrap_or(MqttQueue::DEFAULT_TIMEOUT),
            link_rx,
            delivery_rx,
        ))
    }
}
