//! Optional server extensions for comfylink.
//!
//! A server may or may not have a given extension installed. Each
//! [`Feature`] owns a [`Capability`] that asks the server once (by looking
//! up a sentinel node definition) and gates every operation on the
//! answer: until support is confirmed, operations return a falsy value
//! without touching the network.
//!
//! - [`CapabilityRegistry`]: holds the client's features by name
//! - [`MonitoringFeature`]: system telemetry from the Crystools extension

mod capability;
mod feature;
mod monitoring;
mod registry;

pub use capability::{Capability, Support};
pub use feature::Feature;
pub use monitoring::{
    GpuConfig, GpuInfo, GpuSample, MonitorConfig, MonitorTopic, MonitoringFeature,
    SystemMonitorSample, MONITOR_SENTINEL,
};
pub use registry::CapabilityRegistry;
