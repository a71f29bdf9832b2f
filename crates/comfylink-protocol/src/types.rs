//! Frame types for the realtime channel.
//!
//! The server speaks two dialects over the same socket:
//!
//! - **Text frames** carry a JSON envelope `{ "type": ..., "data": {...} }`
//!   (progress, status, execution results, extension telemetry, ...).
//! - **Binary frames** start with a big-endian `u32` frame type. Only type
//!   `1` (a live preview image) exists today.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Binary frame type of a live preview image.
pub const PREVIEW_IMAGE: u32 = 1;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One successfully decoded unit from the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A JSON envelope from a text frame.
    Json(Envelope),
    /// A binary frame with a recognised frame type.
    Binary(BinaryFrame),
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A JSON message from the server.
///
/// `kind` is the wire `type` field (renamed because `type` is a Rust
/// keyword). The server decides the set of kinds: this client treats them
/// as open-ended strings rather than a closed enum, so extensions can add
/// their own (`crystools.monitor`, ...) without a client release.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// The message type, e.g. `"status"` or `"executing"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The message payload. Always a JSON object.
    pub data: Map<String, Value>,
}

impl Envelope {
    /// Envelope kind carrying terminal log lines.
    pub const LOGS: &'static str = "logs";

    /// Creates an envelope from its parts.
    pub fn new(kind: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// The server-assigned session id, when this payload carries one.
    ///
    /// Only non-empty strings count.
    pub fn sid(&self) -> Option<&str> {
        self.data
            .get("sid")
            .and_then(Value::as_str)
            .filter(|sid| !sid.is_empty())
    }

    /// Whether this is a terminal-log envelope.
    pub fn is_logs(&self) -> bool {
        self.kind == Self::LOGS
    }

    /// The first entry of `data.entries`, if present and not `null`.
    pub fn first_log_entry(&self) -> Option<Value> {
        self.data
            .get("entries")
            .and_then(Value::as_array)
            .and_then(|entries| entries.first())
            .filter(|entry| !entry.is_null())
            .cloned()
    }

    /// The payload as a `serde_json::Value` (an object).
    pub fn data_value(&self) -> Value {
        Value::Object(self.data.clone())
    }
}

// ---------------------------------------------------------------------------
// Binary frames
// ---------------------------------------------------------------------------

/// A binary frame split into its header words and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFrame {
    /// First big-endian `u32` of the frame.
    pub frame_type: u32,
    /// Second big-endian `u32` of the frame.
    pub subtype: u32,
    /// Everything from offset 8 on, untouched.
    pub payload: Vec<u8>,
}

impl BinaryFrame {
    /// Interprets the frame as a preview image, if it is one.
    pub fn into_preview(self) -> Option<PreviewImage> {
        if self.frame_type != PREVIEW_IMAGE {
            return None;
        }
        Some(PreviewImage {
            mime: ImageMime::from_subtype(self.subtype),
            data: self.payload,
        })
    }
}

/// Image encoding of a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageMime {
    /// `image/jpeg`: subtype 1 and every unrecognised subtype.
    Jpeg,
    /// `image/png`: subtype 2.
    Png,
}

impl ImageMime {
    /// Maps a preview subtype to its encoding.
    pub fn from_subtype(subtype: u32) -> Self {
        match subtype {
            2 => Self::Png,
            _ => Self::Jpeg,
        }
    }

    /// The MIME type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live preview image pushed by the server while a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    /// Encoding of `data`.
    pub mime: ImageMime,
    /// Encoded image bytes exactly as received.
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(kind: &str, data: Value) -> Envelope {
        match data {
            Value::Object(map) => Envelope::new(kind, map),
            other => panic!("test data must be an object, got {other}"),
        }
    }

    #[test]
    fn test_image_mime_from_subtype() {
        assert_eq!(ImageMime::from_subtype(1), ImageMime::Jpeg);
        assert_eq!(ImageMime::from_subtype(2), ImageMime::Png);
        assert_eq!(ImageMime::from_subtype(0), ImageMime::Jpeg);
        assert_eq!(ImageMime::from_subtype(77), ImageMime::Jpeg);
        assert_eq!(ImageMime::Png.to_string(), "image/png");
    }

    #[test]
    fn test_sid_requires_non_empty_string() {
        assert_eq!(envelope("status", json!({"sid": "abc"})).sid(), Some("abc"));
        assert_eq!(envelope("status", json!({"sid": ""})).sid(), None);
        assert_eq!(envelope("status", json!({"sid": 12})).sid(), None);
        assert_eq!(envelope("status", json!({})).sid(), None);
    }

    #[test]
    fn test_first_log_entry() {
        let env = envelope("logs", json!({"entries": ["L1", "L2"]}));
        assert!(env.is_logs());
        assert_eq!(env.first_log_entry(), Some(json!("L1")));

        assert_eq!(envelope("logs", json!({})).first_log_entry(), None);
        assert_eq!(envelope("logs", json!({"entries": []})).first_log_entry(), None);
        assert_eq!(envelope("logs", json!({"entries": [null]})).first_log_entry(), None);
    }

    #[test]
    fn test_envelope_serializes_with_type_key() {
        let env = envelope("status", json!({"a": 1}));
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value, json!({"type": "status", "data": {"a": 1}}));
    }

    #[test]
    fn test_into_preview_rejects_other_frame_types() {
        let frame = BinaryFrame {
            frame_type: 3,
            subtype: 2,
            payload: vec![1],
        };
        assert_eq!(frame.into_preview(), None);
    }
}
