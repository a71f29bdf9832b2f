use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;

use crate::Feature;

/// The client's features, keyed by name.
#[derive(Default)]
pub struct CapabilityRegistry {
    features: Mutex<Vec<Arc<dyn Feature>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a feature, replacing any feature with the same name.
    pub fn register(&self, feature: Arc<dyn Feature>) {
        let mut features = self.lock();
        features.retain(|f| f.name() != feature.name());
        features.push(feature);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Feature>> {
        self.lock().iter().find(|f| f.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|f| f.name().to_string()).collect()
    }

    /// Name → confirmed support. Unprobed and failed probes read `false`.
    pub fn available(&self) -> BTreeMap<String, bool> {
        self.lock()
            .iter()
            .map(|f| (f.name().to_string(), f.is_supported()))
            .collect()
    }

    /// Probes every feature concurrently and waits for all of them.
    pub async fn probe_all(&self) -> BTreeMap<String, bool> {
        let features = self.lock().clone();
        let results = join_all(features.iter().map(|f| f.check_supported())).await;
        let available: BTreeMap<String, bool> = features
            .iter()
            .zip(results)
            .map(|(f, supported)| (f.name().to_string(), supported))
            .collect();
        tracing::info!(?available, "feature probes settled");
        available
    }

    /// Tears down every feature.
    pub fn destroy_all(&self) {
        for feature in self.lock().iter() {
            feature.destroy();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn Feature>>> {
        self.features.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("available", &self.available())
            .finish()
    }
}
