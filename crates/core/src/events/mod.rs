//! Upload-confirmed events and the at-least-once transport that carries them.

mod bus;
mod types;

pub use bus::{create_event_bus, EventPublisher, EventSubscription};
pub use types::{Delivery, UploadConfirmedEvent};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("event bus is closed")]
    Closed,

    #[error("event queue is full")]
    QueueFull,

    #[error("invalid event: {0}")]
    InvalidEvent(String),
}
