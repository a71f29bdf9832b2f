//! Event feed for comfylink.
//!
//! - [`EventBus`]: a generic publish/subscribe table. Every aggregate
//!   (the client, each feature) owns its own bus by composition.
//! - [`Topic`] / [`Event`]: the channels and payloads of the client bus:
//!   lifecycle events, decoded server messages, previews, log records.
//!
//! Delivery is synchronous and isolated per handler: a handler that
//! panics is logged and skipped, and the publisher never sees it.

mod bus;
mod event;

pub use bus::{EventBus, ListenerId, SubscribeOptions};
pub use event::{ClientBus, Event, LogRecord, Topic};
