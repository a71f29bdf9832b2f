//! System telemetry from the Crystools server extension.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use comfylink_api::{ApiError, ApiRequest, ServerApi};
use comfylink_events::{ClientBus, Event, EventBus, ListenerId, SubscribeOptions, Topic};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Capability, Feature, Support};

/// Node definition that only exists when the extension is installed.
pub const MONITOR_SENTINEL: &str = "Primitive boolean [Crystools]";

/// Message type carrying telemetry samples.
const MONITOR_MESSAGE: &str = "crystools.monitor";

const MONITOR_ROUTE: &str = "/api/crystools/monitor";

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// One telemetry sample pushed by the extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemMonitorSample {
    pub cpu_utilization: f64,
    pub ram_total: f64,
    pub ram_used: f64,
    pub ram_used_percent: f64,
    pub hdd_total: f64,
    pub hdd_used: f64,
    pub hdd_used_percent: f64,
    pub device_type: String,
    pub gpus: Vec<GpuSample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuSample {
    pub gpu_utilization: f64,
    pub gpu_temperature: f64,
    pub vram_total: f64,
    pub vram_used: f64,
    pub vram_used_percent: f64,
}

/// Monitor settings. Unset fields are left unchanged on the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorConfig {
    /// Refresh interval in seconds (server default 0.5).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(rename = "switchCPU", skip_serializing_if = "Option::is_none")]
    pub switch_cpu: Option<bool>,
    #[serde(rename = "switchHDD", skip_serializing_if = "Option::is_none")]
    pub switch_hdd: Option<bool>,
    #[serde(rename = "switchRAM", skip_serializing_if = "Option::is_none")]
    pub switch_ram: Option<bool>,
    /// Mount path to report disk usage for; see
    /// [`MonitoringFeature::hdd_list`].
    #[serde(rename = "whichHDD", skip_serializing_if = "Option::is_none")]
    pub which_hdd: Option<String>,
}

/// Per-GPU monitor switches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GpuConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vram: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GpuInfo {
    pub index: u32,
    pub name: String,
}

/// Channels on the feature's own bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorTopic {
    /// A new [`SystemMonitorSample`] arrived.
    SystemMonitor,
}

impl MonitorTopic {
    pub fn name(self) -> &'static str {
        match self {
            Self::SystemMonitor => "system_monitor",
        }
    }
}

// ---------------------------------------------------------------------------
// MonitoringFeature
// ---------------------------------------------------------------------------

/// Live CPU/RAM/disk/GPU telemetry.
///
/// After the first successful probe the feature subscribes once to the
/// client's wildcard channel, keeps the latest `crystools.monitor` sample
/// and republishes it on its own bus.
pub struct MonitoringFeature {
    api: Arc<dyn ServerApi>,
    capability: Capability,
    client_bus: ClientBus,
    bus: EventBus<MonitorTopic, SystemMonitorSample>,
    latest: Arc<Mutex<Option<SystemMonitorSample>>>,
    /// The wildcard registration; `Some` once bound.
    binding: Mutex<Option<ListenerId>>,
}

impl MonitoringFeature {
    pub const NAME: &'static str = "monitor";

    pub fn new(api: Arc<dyn ServerApi>, client_bus: ClientBus) -> Self {
        Self {
            capability: Capability::new(MONITOR_SENTINEL, Arc::clone(&api)),
            api,
            client_bus,
            bus: EventBus::new(),
            latest: Arc::default(),
            binding: Mutex::new(None),
        }
    }

    /// Whether the feature is subscribed to the client bus.
    pub fn is_bound(&self) -> bool {
        self.binding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Subscribes to new samples.
    pub fn on<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&SystemMonitorSample) + Send + Sync + 'static,
    {
        self.bus.subscribe(MonitorTopic::SystemMonitor, handler)
    }

    pub fn on_with<F>(&self, handler: F, options: SubscribeOptions) -> ListenerId
    where
        F: Fn(&SystemMonitorSample) + Send + Sync + 'static,
    {
        self.bus
            .subscribe_with(MonitorTopic::SystemMonitor, handler, options)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.bus.unsubscribe(&MonitorTopic::SystemMonitor, id)
    }

    /// The latest sample. `None` when unsupported or before the first one.
    pub fn monitor_data(&self) -> Option<SystemMonitorSample> {
        if !self.is_supported() {
            return None;
        }
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `PATCH /api/crystools/monitor`. `Ok(false)` when unsupported.
    pub async fn set_config(&self, config: &MonitorConfig) -> Result<bool, ApiError> {
        if !self.is_supported() {
            return Ok(false);
        }
        self.call(ApiRequest::patch(MONITOR_ROUTE, serde_json::to_value(config)?))
            .await
    }

    /// Turns the monitor on or off. `Ok(false)` when unsupported.
    pub async fn switch(&self, active: bool) -> Result<bool, ApiError> {
        if !self.is_supported() {
            return Ok(false);
        }
        let body = serde_json::json!({ "monitor": active });
        self.call(ApiRequest::post(format!("{MONITOR_ROUTE}/switch"), body))
            .await
    }

    /// Disk mount points the monitor can report on.
    pub async fn hdd_list(&self) -> Result<Option<Vec<String>>, ApiError> {
        if !self.is_supported() {
            return Ok(None);
        }
        self.fetch(&format!("{MONITOR_ROUTE}/HDD")).await.map(Some)
    }

    pub async fn gpu_list(&self) -> Result<Option<Vec<GpuInfo>>, ApiError> {
        if !self.is_supported() {
            return Ok(None);
        }
        self.fetch(&format!("{MONITOR_ROUTE}/GPU")).await.map(Some)
    }

    /// Per-GPU switches. `Ok(false)` when unsupported.
    pub async fn set_gpu_config(&self, index: u32, config: &GpuConfig) -> Result<bool, ApiError> {
        if !self.is_supported() {
            return Ok(false);
        }
        let route = format!("{MONITOR_ROUTE}/GPU/{index}");
        self.call(ApiRequest::patch(route, serde_json::to_value(config)?))
            .await
    }

    async fn call(&self, request: ApiRequest) -> Result<bool, ApiError> {
        let route = request.route.clone();
        self.api.send(request).await?.expect_success(&route)?;
        Ok(true)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, route: &str) -> Result<T, ApiError> {
        self.api
            .send(ApiRequest::get(route))
            .await?
            .expect_success(route)?
            .json()
    }

    fn bind(&self) {
        let mut binding = self.binding.lock().unwrap_or_else(PoisonError::into_inner);
        if binding.is_some() {
            return;
        }

        let latest = Arc::clone(&self.latest);
        let bus = self.bus.clone();
        let id = self.client_bus.subscribe(Topic::All, move |event: &Event| {
            let Event::All(envelope) = event else {
                return;
            };
            if envelope.kind != MONITOR_MESSAGE {
                return;
            }
            match serde_json::from_value::<SystemMonitorSample>(Value::Object(envelope.data.clone())) {
                Ok(sample) => {
                    *latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(sample.clone());
                    bus.publish(&MonitorTopic::SystemMonitor, &sample);
                }
                Err(error) => tracing::debug!(%error, "ignoring malformed monitor sample"),
            }
        });
        *binding = Some(id);
        tracing::debug!(%id, "monitor bound to wildcard channel");
    }
}

#[async_trait]
impl Feature for MonitoringFeature {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn support(&self) -> Support {
        self.capability.support()
    }

    async fn check_supported(&self) -> bool {
        let supported = self.capability.probe().await.is_supported();
        if supported {
            self.bind();
        }
        supported
    }

    fn destroy(&self) {
        if let Some(id) = self
            .binding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            self.client_bus.unsubscribe(&Topic::All, id);
        }
        self.bus.remove_all();
    }
}

impl std::fmt::Debug for MonitoringFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringFeature")
            .field("capability", &self.capability)
            .field("bound", &self.is_bound())
            .finish()
    }
}
