//! Turns raw frames into events on the client bus.

use std::sync::Arc;

use comfylink_events::{ClientBus, Event};
use comfylink_protocol::{Envelope, Frame, FrameDecoder};
use comfylink_session::Session;
use comfylink_transport::RawFrame;

use crate::ActivityClock;

/// Decodes frames and republishes them as typed events.
///
/// Every successfully decoded frame counts as activity. Undecodable
/// frames are logged and dropped; they never reach the bus and never
/// affect the connection.
#[derive(Debug, Clone)]
pub struct FrameRouter {
    decoder: FrameDecoder,
    session: Arc<Session>,
    bus: ClientBus,
    clock: ActivityClock,
}

impl FrameRouter {
    pub fn new(session: Arc<Session>, bus: ClientBus, clock: ActivityClock) -> Self {
        Self {
            decoder: FrameDecoder,
            session,
            bus,
            clock,
        }
    }

    /// Routes one frame.
    pub fn route(&self, raw: &RawFrame) {
        let frame = match self.decoder.decode(raw) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::debug!(%error, "discarding undecodable frame");
                return;
            }
        };
        self.clock.touch();

        match frame {
            Frame::Binary(binary) => {
                if let Some(preview) = binary.into_preview() {
                    tracing::trace!(mime = %preview.mime, bytes = preview.data.len(), "preview frame");
                    self.bus.emit(Event::Preview(preview));
                }
            }
            Frame::Json(envelope) => self.route_envelope(envelope),
        }
    }

    fn route_envelope(&self, envelope: Envelope) {
        tracing::trace!(kind = %envelope.kind, "message frame");
        let sid = envelope.sid().map(str::to_owned);

        if envelope.is_logs() {
            let entry = envelope.first_log_entry();
            self.bus.emit(Event::All(envelope));
            self.bus.emit(Event::Terminal(entry));
        } else {
            let kind = envelope.kind.clone();
            let data = envelope.data_value();
            self.bus.emit(Event::All(envelope));
            self.bus.emit(Event::Message { kind, data });
        }

        if let Some(sid) = sid {
            self.session.reassign(&sid);
        }
    }
}
