//! Notification delivery service.
//!
//! [`Notifier`] subscribes to the event bus and delivers each event as a
//! notification: a structured log line always, plus a webhook POST when
//! a URL is configured. Delivery failures are logged and never ripple
//! back to the operation that published the event.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::DeviceEvent;
use crate::webhook::WebhookDelivery;

/// Background service that turns bus events into notifications.
pub struct Notifier {
    webhook: Option<WebhookDelivery>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook: webhook_url.map(WebhookDelivery::new),
        }
    }

    /// Consume events until the bus closes or the token is cancelled.
    pub async fn run(
        self,
        mut rx: broadcast::Receiver<DeviceEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!(webhook = self.webhook.is_some(), "Notifier started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notifier stopping");
                    break;
                }
                received = rx.recv() => match received {
                    Ok(event) => self.deliver(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Notifier lagged; skipped events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed; notifier stopping");
                        break;
                    }
                },
            }
        }
    }

    async fn deliver(&self, event: &DeviceEvent) {
        tracing::info!(
            event_type = %event.event_type,
            device_id = event.device_id,
            device = %event.device_name,
            recipient = event.recipient.as_deref().unwrap_or("-"),
            message = %event.message,
            "Device notification"
        );

        if let Some(webhook) = &self.webhook {
            if let Err(e) = webhook.deliver(event).await {
                tracing::error!(error = %e, "Webhook notification failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::kinds;
    use std::time::Duration;

    #[tokio::test]
    async fn notifier_exits_when_bus_closes() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(Notifier::new(None).run(rx, cancel));

        bus.publish(DeviceEvent::new(kinds::DEVICE_RELEASED, 1, "rig-01"));
        drop(bus);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("notifier should stop when the bus closes")
            .unwrap();
    }

    #[tokio::test]
    async fn notifier_exits_on_cancellation() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(Notifier::new(None).run(rx, cancel.clone()));
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("notifier should stop on cancel")
            .unwrap();
    }
}
