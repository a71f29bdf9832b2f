//! Error types for the protocol layer.
//!
//! A `ProtocolError` always concerns exactly one frame. Callers log it and
//! move on to the next frame; it never tears down the connection.

/// Errors that can occur while decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The text frame was not valid JSON.
    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The text frame parsed, but the top level is not an object.
    #[error("JSON frame is not an object")]
    NotAnObject,

    /// A required envelope field is absent or has the wrong shape.
    ///
    /// Envelopes need a non-empty `type` string and a `data` object.
    #[error("envelope field `{0}` missing or invalid")]
    MissingField(&'static str),

    /// The binary frame ended before its header did.
    #[error("binary frame truncated: {len} bytes, need {need}")]
    Truncated { len: usize, need: usize },

    /// The binary frame carries a type this client does not understand.
    #[error("unknown binary frame type {0}")]
    UnknownFrameType(u32),
}
