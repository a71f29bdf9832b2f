//! Topics and payloads of the client event feed.

use std::fmt;

use comfylink_protocol::{Envelope, PreviewImage};
use serde_json::Value;

use crate::bus::EventBus;

/// The bus owned by a client: keyed by [`Topic`], carrying [`Event`]s.
pub type ClientBus = EventBus<Topic, Event>;

/// A channel on the client bus.
///
/// Reserved lifecycle and routing channels are fixed variants; every other
/// server message `type` gets its own [`Topic::Message`] channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Connected,
    Disconnected,
    Reconnecting,
    Reconnected,
    ConnectionError,
    AuthError,
    AuthSuccess,
    QueueError,
    Log,
    Terminal,
    /// Wildcard channel: every valid JSON envelope, unfiltered.
    All,
    /// Binary preview images.
    Preview,
    /// A server message type, e.g. `status` or `executing`.
    Message(String),
}

impl Topic {
    /// The wire-facing channel name.
    pub fn name(&self) -> &str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::Reconnected => "reconnected",
            Self::ConnectionError => "connection_error",
            Self::AuthError => "auth_error",
            Self::AuthSuccess => "auth_success",
            Self::QueueError => "queue_error",
            Self::Log => "log",
            Self::Terminal => "terminal",
            Self::All => "all",
            Self::Preview => "b_preview",
            Self::Message(kind) => kind,
        }
    }

    /// Resolves a channel name. Reserved names map to their variant,
    /// anything else becomes [`Topic::Message`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "connected" => Self::Connected,
            "disconnected" => Self::Disconnected,
            "reconnecting" => Self::Reconnecting,
            "reconnected" => Self::Reconnected,
            "connection_error" => Self::ConnectionError,
            "auth_error" => Self::AuthError,
            "auth_success" => Self::AuthSuccess,
            "queue_error" => Self::QueueError,
            "log" => Self::Log,
            "terminal" => Self::Terminal,
            "all" => Self::All,
            "b_preview" => Self::Preview,
            other => Self::Message(other.to_string()),
        }
    }

    /// Channel for a server message type.
    pub fn message(kind: impl Into<String>) -> Self {
        Self::Message(kind.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A line the client writes about its own lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Which step produced the line, e.g. `"init"` or `"socket"`.
    pub source: String,
    pub message: String,
}

impl LogRecord {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }
}

/// A payload delivered on the client bus.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected,
    Disconnected,
    Reconnecting,
    Reconnected,
    ConnectionError { reason: String },
    /// The credential test was rejected with this HTTP status.
    AuthError { status: u16 },
    AuthSuccess,
    QueueError { reason: String },
    Log(LogRecord),
    /// First entry of a `logs` envelope, or `None` when it had none.
    Terminal(Option<Value>),
    All(Envelope),
    Preview(PreviewImage),
    /// The `data` object of a server message.
    Message { kind: String, data: Value },
}

impl Event {
    /// The channel this event is delivered on.
    pub fn topic(&self) -> Topic {
        match self {
            Self::Connected => Topic::Connected,
            Self::Disconnected => Topic::Disconnected,
            Self::Reconnecting => Topic::Reconnecting,
            Self::Reconnected => Topic::Reconnected,
            Self::ConnectionError { .. } => Topic::ConnectionError,
            Self::AuthError { .. } => Topic::AuthError,
            Self::AuthSuccess => Topic::AuthSuccess,
            Self::QueueError { .. } => Topic::QueueError,
            Self::Log(_) => Topic::Log,
            Self::Terminal(_) => Topic::Terminal,
            Self::All(_) => Topic::All,
            Self::Preview(_) => Topic::Preview,
            Self::Message { kind, .. } => Topic::message(kind.as_str()),
        }
    }
}

impl EventBus<Topic, Event> {
    /// Publishes `event` on its own topic.
    pub fn emit(&self, event: Event) -> usize {
        let topic = event.topic();
        self.publish(&topic, &event)
    }
}
