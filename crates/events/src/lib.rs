//! Event bus and notification infrastructure.
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`DeviceEvent`] — the canonical event envelope for reservation
//!   lifecycle changes.
//! - [`kinds`] — the closed set of event type names.
//! - [`Notifier`] — background subscriber that delivers notifications
//!   (structured log always, webhook POST when configured);
//!   fire-and-forget, failures never reach the operation that
//!   triggered the event.

pub mod bus;
pub mod kinds;
pub mod notifier;
pub mod webhook;

pub use bus::{DeviceEvent, EventBus};
pub use notifier::Notifier;
pub use webhook::WebhookDelivery;
