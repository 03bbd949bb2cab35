//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for
//! [`DeviceEvent`]s. It is designed to be shared via `Arc<EventBus>`
//! across the application.

use chrono::{DateTime, Utc};
use labrack_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// DeviceEvent
// ---------------------------------------------------------------------------

/// A reservation lifecycle event for one device.
///
/// Constructed via [`DeviceEvent::new`] and enriched with the builder
/// methods [`notify`](DeviceEvent::notify),
/// [`with_message`](DeviceEvent::with_message), and
/// [`with_payload`](DeviceEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEvent {
    /// Unique event id.
    pub id: Uuid,

    /// Dot-separated event name from [`crate::kinds`].
    pub event_type: String,

    /// The device the event concerns.
    pub device_id: DbId,

    /// Display name of the device, for notification text.
    pub device_name: String,

    /// Identity the notification is addressed to, if any.
    pub recipient: Option<String>,

    /// Human-readable notification text.
    pub message: String,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl DeviceEvent {
    /// Create a new event with the required fields.
    pub fn new(event_type: impl Into<String>, device_id: DbId, device_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            device_id,
            device_name: device_name.into(),
            recipient: None,
            message: String::new(),
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Address the event's notification to an identity.
    pub fn notify(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Set the notification text.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`DeviceEvent`].
pub struct EventBus {
    sender: broadcast::Sender<DeviceEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are
    /// dropped and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// notification delivery is fire-and-forget by design.
    pub fn publish(&self, event: DeviceEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = DeviceEvent::new(kinds::DEVICE_RELEASED, 42, "rig-07")
            .notify("a11111111")
            .with_message("rig-07 released")
            .with_payload(serde_json::json!({"next_holder": null}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, kinds::DEVICE_RELEASED);
        assert_eq!(received.device_id, 42);
        assert_eq!(received.recipient.as_deref(), Some("a11111111"));
        assert_eq!(received.payload["next_holder"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(DeviceEvent::new(kinds::DEVICE_PREEMPTED, 1, "rig-01"));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.id, e2.id);
        assert_eq!(e1.event_type, kinds::DEVICE_PREEMPTED);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(DeviceEvent::new(kinds::DEVICE_RECLAIMED, 9, "rig-09"));
    }
}
