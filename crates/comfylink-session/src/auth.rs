//! Credentials attached to every request the client makes.
//!
//! comfylink doesn't authenticate anyone itself: it forwards whatever the
//! server (or the reverse proxy in front of it) expects. [`Credentials`]
//! covers the three shapes seen in practice: HTTP basic auth, a bearer
//! token, or a set of arbitrary headers.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// How the client proves its identity to the server.
///
/// `Debug` never prints secrets.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `Authorization: Basic base64(username:password)`.
    Basic { username: String, password: String },

    /// `Authorization: Bearer <token>`.
    Bearer { token: String },

    /// Headers sent verbatim, e.g. an API-gateway key.
    Custom(Vec<(String, String)>),
}

impl Credentials {
    /// Shorthand for [`Credentials::Basic`].
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Shorthand for [`Credentials::Bearer`].
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// The headers these credentials translate to.
    pub fn headers(&self) -> Vec<(String, String)> {
        match self {
            Self::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                vec![("Authorization".to_string(), format!("Basic {encoded}"))]
            }
            Self::Bearer { token } => {
                vec![("Authorization".to_string(), format!("Bearer {token}"))]
            }
            Self::Custom(headers) => headers.clone(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"<redacted>").finish(),
            Self::Custom(headers) => {
                let names: Vec<&str> = headers.iter().map(|(name, _)| name.as_str()).collect();
                f.debug_tuple("Custom").field(&names).finish()
            }
        }
    }
}
