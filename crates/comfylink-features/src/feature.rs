use async_trait::async_trait;

use crate::Support;

/// An optional, capability-gated server extension.
///
/// Object-safe so the registry can hold heterogeneous features as
/// `Arc<dyn Feature>`.
#[async_trait]
pub trait Feature: Send + Sync + 'static {
    /// Registry key, e.g. `"monitor"`.
    fn name(&self) -> &str;

    fn support(&self) -> Support;

    /// Synchronous gate. Only a confirmed probe counts.
    fn is_supported(&self) -> bool {
        self.support().is_supported()
    }

    /// Probes the server (at most once) and performs any binding that
    /// depends on the answer.
    async fn check_supported(&self) -> bool;

    /// Releases every event registration the feature holds.
    fn destroy(&self);
}
