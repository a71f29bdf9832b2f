//! Connection supervision for comfylink.
//!
//! The realtime channel is owned by a single actor task (the
//! [`ConnectionSupervisor`]). It dials the server, feeds received frames
//! through the [`FrameRouter`], watches the [`ActivityClock`] for silent
//! connections, and runs reconnect episodes with linear backoff.
//!
//! # Key types
//!
//! - [`ConnectionSupervisor`]: handle to the running actor
//! - [`ConnectionState`]: lifecycle state machine
//! - [`SupervisorConfig`] / [`ProbeConfig`]: timing knobs
//! - [`probe_liveness`]: the HTTP reachability loop run before the
//!   supervisor starts
//!
//! # Integration
//!
//! ```ignore
//! let attempts = probe_liveness(api.as_ref(), &ProbeConfig::default()).await?;
//! let supervisor = ConnectionSupervisor::spawn(
//!     Arc::new(WebSocketConnector),
//!     session,
//!     bus.clone(),
//!     SupervisorConfig::default(),
//! );
//! ```

mod activity;
mod config;
mod error;
mod probe;
mod router;
mod supervisor;

pub use activity::ActivityClock;
pub use config::{ConnectionState, ProbeConfig, SupervisorConfig};
pub use error::SupervisorError;
pub use probe::probe_liveness;
pub use router::FrameRouter;
pub use supervisor::{ConnectionSupervisor, SupervisorStatus};
