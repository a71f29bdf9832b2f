//! Wire protocol for comfylink.
//!
//! This crate knows how to turn raw transport frames into typed frames:
//!
//! - **Types** ([`Frame`], [`Envelope`], [`BinaryFrame`], [`PreviewImage`]):
//!   what the server sends over the realtime channel.
//! - **Decoder** ([`FrameDecoder`]): classifies a [`RawFrame`] as JSON or
//!   binary and parses it.
//! - **Errors** ([`ProtocolError`]): why a frame was rejected.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the event
//! router. It doesn't know about sessions or subscribers: a frame that
//! fails to decode is simply an error value the caller logs and drops.
//!
//! ```text
//! Transport (RawFrame) → Protocol (Frame) → Router (events)
//! ```
//!
//! [`RawFrame`]: comfylink_transport::RawFrame

mod codec;
mod error;
mod types;

pub use codec::FrameDecoder;
pub use error::ProtocolError;
pub use types::{BinaryFrame, Envelope, Frame, ImageMime, PreviewImage, PREVIEW_IMAGE};
