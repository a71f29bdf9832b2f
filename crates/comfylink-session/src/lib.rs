//! Client identity for comfylink.
//!
//! A [`Session`] is the client's identity across reconnects: the client id
//! the server knows it by, where the server lives, and the headers every
//! request carries. It is created once per client and shared by reference
//! between the connection supervisor (which dials with it) and the frame
//! router (which rewrites the id when the server assigns a new one).
//!
//! # How it fits in the stack
//!
//! ```text
//! Supervisor / Router (above)  ← read and reassign the client id
//!     ↕
//! Session Layer (this crate)   ← identity, host, credential headers
//!     ↕
//! Transport (below)            ← receives a ConnectRequest built here
//! ```

mod auth;
mod error;
mod session;

pub use auth::Credentials;
pub use error::SessionError;
pub use session::{generate_client_id, Session};
