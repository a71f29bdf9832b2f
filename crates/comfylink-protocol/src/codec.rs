//! The frame decoder: raw transport frames in, typed [`Frame`]s out.
//!
//! Anything that is not a well-formed
//! envelope or a known binary frame becomes a [`ProtocolError`], which the
//! caller logs and discards; one bad frame never affects the next one.

use comfylink_transport::RawFrame;
use serde_json::Value;

use crate::{BinaryFrame, Envelope, Frame, ProtocolError, PREVIEW_IMAGE};

/// Size of the binary frame header (`frame_type` + `subtype`).
const BINARY_HEADER_LEN: usize = 8;

/// Classifies and parses raw frames.
///
/// Stateless, so a single value can be shared freely.
///
/// ## Example
///
/// ```rust
/// use comfylink_protocol::{Frame, FrameDecoder, ImageMime};
/// use comfylink_transport::RawFrame;
///
/// let decoder = FrameDecoder;
///
/// let raw = RawFrame::Binary(vec![0, 0, 0, 1, 0, 0, 0, 2, 0xAB]);
/// let Frame::Binary(frame) = decoder.decode(&raw).unwrap() else {
///     panic!("expected a binary frame");
/// };
/// let preview = frame.into_preview().unwrap();
/// assert_eq!(preview.mime, ImageMime::Png);
/// assert_eq!(preview.data, vec![0xAB]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Decodes one raw frame.
    pub fn decode(&self, raw: &RawFrame) -> Result<Frame, ProtocolError> {
        match raw {
            RawFrame::Text(text) => self.decode_text(text).map(Frame::Json),
            RawFrame::Binary(bytes) => self.decode_binary(bytes).map(Frame::Binary),
        }
    }

    /// Parses a text frame into an [`Envelope`].
    ///
    /// # Errors
    /// - [`ProtocolError::Json`]: not JSON at all
    /// - [`ProtocolError::NotAnObject`]: JSON, but not an object
    /// - [`ProtocolError::MissingField`]: no non-empty `type` string or
    ///   no `data` object
    pub fn decode_text(&self, text: &str) -> Result<Envelope, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut object) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let kind = match object.remove("type") {
            Some(Value::String(kind)) if !kind.is_empty() => kind,
            _ => return Err(ProtocolError::MissingField("type")),
        };
        let data = match object.remove("data") {
            Some(Value::Object(data)) => data,
            _ => return Err(ProtocolError::MissingField("data")),
        };

        Ok(Envelope { kind, data })
    }

    /// Parses a binary frame.
    ///
    /// Layout: `u32 frame_type (BE)`, then for previews `u32 subtype (BE)`
    /// and the image bytes from offset 8.
    ///
    /// # Errors
    /// - [`ProtocolError::Truncated`]: shorter than its header
    /// - [`ProtocolError::UnknownFrameType`]: anything but a preview
    pub fn decode_binary(&self, bytes: &[u8]) -> Result<BinaryFrame, ProtocolError> {
        let frame_type = read_u32(bytes, 0)?;
        if frame_type != PREVIEW_IMAGE {
            return Err(ProtocolError::UnknownFrameType(frame_type));
        }
        let subtype = read_u32(bytes, 4)?;

        Ok(BinaryFrame {
            frame_type,
            subtype,
            payload: bytes[BINARY_HEADER_LEN..].to_vec(),
        })
    }
}

/// Reads a big-endian `u32` at `offset`.
fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, ProtocolError> {
    let need = offset + 4;
    bytes
        .get(offset..need)
        .and_then(|word| <[u8; 4]>::try_from(word).ok())
        .map(u32::from_be_bytes)
        .ok_or(ProtocolError::Truncated {
            len: bytes.len(),
            need,
        })
}
