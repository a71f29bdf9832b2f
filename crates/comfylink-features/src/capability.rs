//! The tri-state support gate.

use std::fmt;
use std::sync::Arc;

use comfylink_api::ServerApi;
use tokio::sync::OnceCell;

/// What is known about a server extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Support {
    /// Not probed yet.
    #[default]
    Unknown,
    Supported,
    /// The server lacks the extension, or the probe itself failed.
    Unsupported,
}

impl Support {
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Supported)
    }
}

impl fmt::Display for Support {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Supported => "supported",
            Self::Unsupported => "unsupported",
        })
    }
}

/// Cached answer to "does the server have node `sentinel`?".
///
/// The introspection call runs at most once per capability. Concurrent
/// probes share the single in-flight call. A probe whose request fails
/// settles as [`Support::Unsupported`] for good.
pub struct Capability {
    sentinel: String,
    api: Arc<dyn ServerApi>,
    settled: OnceCell<Support>,
}

impl Capability {
    pub fn new(sentinel: impl Into<String>, api: Arc<dyn ServerApi>) -> Self {
        Self {
            sentinel: sentinel.into(),
            api,
            settled: OnceCell::new(),
        }
    }

    /// The node definition whose presence signals support.
    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Current knowledge, without probing.
    pub fn support(&self) -> Support {
        self.settled.get().copied().unwrap_or_default()
    }

    pub fn is_supported(&self) -> bool {
        self.support().is_supported()
    }

    /// Whether a probe has completed.
    pub fn is_settled(&self) -> bool {
        self.settled.initialized()
    }

    /// Probes the server on first call; later calls return the cached
    /// answer.
    pub async fn probe(&self) -> Support {
        *self
            .settled
            .get_or_init(|| async {
                let support = match self.api.node_defs(&self.sentinel).await {
                    Ok(Some(_)) => Support::Supported,
                    Ok(None) => Support::Unsupported,
                    Err(error) => {
                        tracing::warn!(sentinel = %self.sentinel, %error, "capability probe failed");
                        Support::Unsupported
                    }
                };
                tracing::debug!(sentinel = %self.sentinel, %support, "capability probed");
                support
            })
            .await
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("sentinel", &self.sentinel)
            .field("support", &self.support())
            .finish()
    }
}
