//! # comfylink
//!
//! Realtime client runtime for ComfyUI-style pipeline servers.
//!
//! A [`ComfyClient`] keeps a persistent WebSocket channel to the server,
//! reconnecting on its own, decodes what the server pushes, and exposes it
//! as a typed event feed. Optional server extensions are probed once and
//! gated behind capability checks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use comfylink::prelude::*;
//!
//! # async fn run() -> Result<(), ClientError> {
//! let client = ComfyClient::new("http://127.0.0.1:8188", ClientOptions::default())?;
//! client.on(Topic::message("executing"), |event| println!("{event:?}"));
//! client.init(InitOptions::default());
//! client.wait_for_ready().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod options;

pub use client::ComfyClient;
pub use error::ClientError;
pub use options::{ClientOptions, InitOptions};

pub use comfylink_api as api;
pub use comfylink_events as events;
pub use comfylink_features as features;
pub use comfylink_protocol as protocol;
pub use comfylink_session as session;
pub use comfylink_supervisor as supervisor;
pub use comfylink_transport as transport;

/// Everything a typical application needs.
pub mod prelude {
    pub use crate::{ClientError, ClientOptions, ComfyClient, InitOptions};
    pub use comfylink_api::{QueuePosition, QueuePromptResponse};
    pub use comfylink_events::{Event, ListenerId, LogRecord, SubscribeOptions, Topic};
    pub use comfylink_features::{
        Feature, GpuConfig, MonitorConfig, MonitoringFeature, Support, SystemMonitorSample,
    };
    pub use comfylink_protocol::{Envelope, ImageMime, PreviewImage};
    pub use comfylink_session::Credentials;
    pub use comfylink_supervisor::{ConnectionState, SupervisorConfig};
}
