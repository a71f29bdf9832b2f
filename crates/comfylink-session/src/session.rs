//! The session record: who this client is and where it connects.
//!
//! The client id starts out as a random UUID. The server may hand out a
//! different one (`data.sid` on any message); [`Session::reassign`] is the
//! single place that happens, so every reader sees the update.

use std::sync::{PoisonError, RwLock};

use comfylink_transport::ConnectRequest;

use crate::{Credentials, SessionError};

/// Generates a fresh client id (a random UUID v4).
pub fn generate_client_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The client's identity and credential state.
///
/// Shared behind an `Arc` between the supervisor and the frame router.
/// Only the client id is mutable; host and headers are fixed at
/// construction.
#[derive(Debug)]
pub struct Session {
    /// Always defined. Overwritten, never cleared.
    client_id: RwLock<String>,

    /// e.g. `https://comfy.example.com:8188`.
    api_host: String,

    /// `api_host` without its scheme, e.g. `comfy.example.com:8188`.
    api_base: String,

    /// `true` for `https://` hosts; selects `wss://` for the socket.
    secure: bool,

    credential_headers: Vec<(String, String)>,
}

impl Session {
    /// Creates a session with a freshly generated client id.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidHost`] unless `api_host` starts with
    /// `http://` or `https://`.
    pub fn new(
        api_host: impl Into<String>,
        credentials: Option<&Credentials>,
    ) -> Result<Self, SessionError> {
        Self::with_client_id(api_host, generate_client_id(), credentials)
    }

    /// Creates a session that starts with the given client id.
    pub fn with_client_id(
        api_host: impl Into<String>,
        client_id: impl Into<String>,
        credentials: Option<&Credentials>,
    ) -> Result<Self, SessionError> {
        let api_host: String = api_host.into();
        let api_host = api_host.trim_end_matches('/').to_string();
        let (secure, api_base) = if let Some(rest) = api_host.strip_prefix("https://") {
            (true, rest.to_string())
        } else if let Some(rest) = api_host.strip_prefix("http://") {
            (false, rest.to_string())
        } else {
            return Err(SessionError::InvalidHost(api_host));
        };
        if api_base.is_empty() {
            return Err(SessionError::InvalidHost(api_host));
        }

        Ok(Self {
            client_id: RwLock::new(client_id.into()),
            api_host,
            api_base,
            secure,
            credential_headers: credentials.map(Credentials::headers).unwrap_or_default(),
        })
    }

    /// The current client id.
    pub fn client_id(&self) -> String {
        self.client_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adopts a server-assigned id. Returns `true` if the id changed.
    pub fn reassign(&self, sid: &str) -> bool {
        let mut current = self
            .client_id
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if *current == sid {
            return false;
        }
        tracing::debug!(old = %current, new = %sid, "server reassigned client id");
        *current = sid.to_string();
        true
    }

    /// The API host as configured (no trailing slash).
    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    /// The API host without its scheme.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Absolute URL for an API route such as `/prompt`.
    pub fn api_url(&self, route: &str) -> String {
        format!("{}{route}", self.api_host)
    }

    /// The realtime endpoint: `ws(s)://<base>/ws?clientId=<id>`.
    pub fn ws_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}/ws?clientId={}", self.api_base, self.client_id())
    }

    /// Headers derived from the credentials, empty without credentials.
    pub fn credential_headers(&self) -> &[(String, String)] {
        &self.credential_headers
    }

    /// Whether credentials were configured.
    pub fn has_credentials(&self) -> bool {
        !self.credential_headers.is_empty()
    }

    /// A transport dial request for the current identity.
    pub fn connect_request(&self) -> ConnectRequest {
        self.credential_headers
            .iter()
            .fold(ConnectRequest::new(self.ws_url()), |req, (name, value)| {
                req.header(name.as_str(), value.as_str())
            })
    }
}
