//! `ComfyClient`: the public facade.
//!
//! Ties the layers together: session → liveness probe → supervisor (which
//! owns the realtime channel and the frame router) → features. The client
//! itself holds no connection logic; it sequences startup and teardown
//! and forwards the event feed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use comfylink_api::{HttpApi, QueuePosition, QueuePromptResponse, ServerApi};
use comfylink_events::{ClientBus, Event, ListenerId, LogRecord, SubscribeOptions, Topic};
use comfylink_features::{CapabilityRegistry, Feature, MonitoringFeature};
use comfylink_session::Session;
use comfylink_supervisor::{
    probe_liveness, ConnectionState, ConnectionSupervisor, SupervisorConfig,
};
use comfylink_transport::{Connector, WebSocketConnector};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{ClientError, ClientOptions, InitOptions};

/// Timeout of the credential check made at the start of `init`.
const CREDENTIAL_TEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Starts a supervisor for the configured transport.
type Launcher = Box<dyn Fn(Arc<Session>, ClientBus, SupervisorConfig) -> ConnectionSupervisor + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Pending,
    Ready,
    Failed,
}

/// Shared client state.
struct Inner {
    session: Arc<Session>,
    api: Arc<dyn ServerApi>,
    bus: ClientBus,
    registry: CapabilityRegistry,
    monitor: Arc<MonitoringFeature>,
    options: ClientOptions,
    launcher: Launcher,
    /// State before the supervisor exists, and after teardown.
    phase: Mutex<ConnectionState>,
    supervisor: Mutex<Option<ConnectionSupervisor>>,
    readiness: watch::Sender<Readiness>,
    os_type: Mutex<Option<String>>,
    listen_terminal: AtomicBool,
    init_task: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

/// A client for one pipeline server.
///
/// Cheap to clone; clones share the same connection, listeners and
/// features.
///
/// # Example
///
/// ```rust,ignore
/// let client = ComfyClient::new("http://127.0.0.1:8188", ClientOptions::default())?;
/// client.on(Topic::Preview, |event| { /* ... */ });
/// client.init(InitOptions::default());
/// client.wait_for_ready().await?;
/// let queued = client.append_prompt(workflow).await?;
/// ```
#[derive(Clone)]
pub struct ComfyClient {
    inner: Arc<Inner>,
}

impl ComfyClient {
    /// Creates a client for `host` (`http://` or `https://`) with a fresh
    /// client id, talking HTTP through `reqwest` and realtime over
    /// WebSocket.
    ///
    /// # Errors
    /// [`ClientError::Session`] for a malformed host,
    /// [`ClientError::Api`] if the HTTP client cannot be built.
    pub fn new(host: impl Into<String>, options: ClientOptions) -> Result<Self, ClientError> {
        let session = Session::new(host, options.credentials.as_ref())?;
        Self::from_session(session, options)
    }

    /// Like [`new`](Self::new), but resumes an existing client id.
    pub fn with_client_id(
        host: impl Into<String>,
        client_id: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let session = Session::with_client_id(host, client_id, options.credentials.as_ref())?;
        Self::from_session(session, options)
    }

    fn from_session(session: Session, options: ClientOptions) -> Result<Self, ClientError> {
        let session = Arc::new(session);
        let api = Arc::new(HttpApi::new(Arc::clone(&session))?);
        Ok(Self::with_parts(session, api, WebSocketConnector, options))
    }

    /// Assembles a client from explicit parts, e.g. an in-memory
    /// transport or a custom HTTP layer.
    pub fn with_parts<C: Connector>(
        session: Arc<Session>,
        api: Arc<dyn ServerApi>,
        connector: C,
        options: ClientOptions,
    ) -> Self {
        let options = options.validated();
        let bus = ClientBus::new();
        let monitor = Arc::new(MonitoringFeature::new(Arc::clone(&api), bus.clone()));
        let registry = CapabilityRegistry::new();
        registry.register(monitor.clone());

        let connector = Arc::new(connector);
        let launcher: Launcher = Box::new(move |session, bus, config| {
            ConnectionSupervisor::spawn(Arc::clone(&connector), session, bus, config)
        });

        tracing::debug!(
            host = %session.api_host(),
            client_id = %session.client_id(),
            credentials = session.has_credentials(),
            "client created"
        );

        let (readiness, _) = watch::channel(Readiness::Pending);
        Self {
            inner: Arc::new(Inner {
                session,
                api,
                bus,
                registry,
                monitor,
                listen_terminal: AtomicBool::new(options.listen_terminal),
                options,
                launcher,
                phase: Mutex::new(ConnectionState::Idle),
                supervisor: Mutex::new(None),
                readiness,
                os_type: Mutex::new(None),
                init_task: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Starts the client in the background and returns immediately.
    ///
    /// Checks credentials (if any), probes liveness, opens the realtime
    /// channel, probes features (after which the client is ready), sets
    /// the terminal subscription and fetches the server OS. Failures are
    /// reported on the event feed, never returned. Calling `init` again
    /// is a no-op.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn init(&self, options: InitOptions) -> &Self {
        let mut task = lock(&self.inner.init_task);
        if task.is_some() || self.inner.destroyed.load(Ordering::SeqCst) {
            tracing::debug!("init already started");
            return self;
        }
        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(inner.run_init(options)));
        self
    }

    /// Resolves once feature probing has settled.
    ///
    /// # Errors
    /// [`ClientError::Closed`] if the server was unreachable or the
    /// client was destroyed first.
    pub async fn wait_for_ready(&self) -> Result<(), ClientError> {
        let mut rx = self.inner.readiness.subscribe();
        let readiness = *rx
            .wait_for(|r| *r != Readiness::Pending)
            .await
            .map_err(|_| ClientError::Closed)?;
        match readiness {
            Readiness::Ready => Ok(()),
            _ => Err(ClientError::Closed),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.readiness.borrow() == Readiness::Ready
    }

    /// Where the realtime channel is in its lifecycle.
    pub fn state(&self) -> ConnectionState {
        let phase = *lock(&self.inner.phase);
        if phase.is_terminal() {
            return phase;
        }
        lock(&self.inner.supervisor)
            .as_ref()
            .map_or(phase, ConnectionSupervisor::state)
    }

    /// Stops everything: init, the realtime channel, features and all
    /// listeners. Terminal.
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.log("destroy", "destroying client");

        if let Some(task) = lock(&self.inner.init_task).take() {
            task.abort();
        }
        let supervisor = lock(&self.inner.supervisor).take();
        if let Some(supervisor) = supervisor {
            if let Err(error) = supervisor.shutdown().await {
                tracing::debug!(%error, "supervisor already stopped");
            }
        }
        self.inner.registry.destroy_all();
        *lock(&self.inner.phase) = ConnectionState::Closed;
        self.inner.readiness.send_if_modified(|r| {
            let pending = *r == Readiness::Pending;
            if pending {
                *r = Readiness::Failed;
            }
            pending
        });
        self.inner.bus.remove_all();
        tracing::info!("client destroyed");
    }

    // -----------------------------------------------------------------------
    // Identity and features
    // -----------------------------------------------------------------------

    /// The current client id. Changes when the server assigns one.
    pub fn id(&self) -> String {
        self.inner.session.client_id()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    /// The server's OS (`system.os` of `/system_stats`), once fetched.
    pub fn os_type(&self) -> Option<String> {
        lock(&self.inner.os_type).clone()
    }

    /// Feature name → confirmed support.
    pub fn available_features(&self) -> BTreeMap<String, bool> {
        self.inner.registry.available()
    }

    pub fn feature(&self, name: &str) -> Option<Arc<dyn Feature>> {
        self.inner.registry.get(name)
    }

    /// The system monitoring feature.
    pub fn monitor(&self) -> &MonitoringFeature {
        &self.inner.monitor
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Subscribes `handler` to `topic`.
    ///
    /// Realtime events are delivered on the supervisor task, one frame at
    /// a time and in arrival order. A handler that blocks holds up later
    /// frames and the idle heartbeat, so long work belongs in a spawned
    /// task or behind a channel.
    pub fn on<F>(&self, topic: Topic, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(topic, handler)
    }

    pub fn on_with<F>(&self, topic: Topic, handler: F, options: SubscribeOptions) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe_with(topic, handler, options)
    }

    /// Removes a subscription. `false` if it was not registered.
    pub fn off(&self, topic: &Topic, id: ListenerId) -> bool {
        self.inner.bus.unsubscribe(topic, id)
    }

    pub fn remove_all_listeners(&self) {
        self.inner.bus.remove_all();
    }

    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.inner.bus.listener_count(topic)
    }

    // -----------------------------------------------------------------------
    // Server calls
    // -----------------------------------------------------------------------

    /// Turns streaming of server terminal output on or off.
    pub async fn set_terminal_subscription(&self, enabled: bool) -> Result<(), ClientError> {
        self.inner.listen_terminal.store(enabled, Ordering::SeqCst);
        self.inner
            .api
            .set_terminal_subscription(&self.id(), enabled)
            .await?;
        Ok(())
    }

    /// Queues `workflow` at `position`.
    pub async fn queue_prompt(
        &self,
        position: QueuePosition,
        workflow: Value,
    ) -> Result<QueuePromptResponse, ClientError> {
        match self.inner.api.queue_prompt(&self.id(), position, workflow).await {
            Ok(response) => Ok(response),
            Err(error) => {
                self.inner.log("queue_prompt", format!("can't queue prompt: {error}"));
                Err(error.into())
            }
        }
    }

    /// Queues `workflow` at the back of the queue. On failure also
    /// publishes `queue_error`.
    pub async fn append_prompt(&self, workflow: Value) -> Result<QueuePromptResponse, ClientError> {
        self.queue_prompt(QueuePosition::Back, workflow)
            .await
            .inspect_err(|error| {
                self.inner.bus.emit(Event::QueueError {
                    reason: error.to_string(),
                });
            })
    }
}

impl std::fmt::Debug for ComfyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComfyClient")
            .field("host", &self.inner.session.api_host())
            .field("id", &self.id())
            .field("state", &self.state())
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl Inner {
    async fn run_init(self: Arc<Self>, options: InitOptions) {
        self.log("init", "initializing");

        if self.session.has_credentials() {
            self.test_credentials().await;
        }

        *lock(&self.phase) = ConnectionState::Probing;
        let probe = options.probe_config(self.options.probe_timeout);
        if let Err(error) = probe_liveness(self.api.as_ref(), &probe).await {
            self.log("init", format!("failed: {error}"));
            *lock(&self.phase) = ConnectionState::Closed;
            self.readiness.send_replace(Readiness::Failed);
            self.bus.emit(Event::ConnectionError {
                reason: error.to_string(),
            });
            return;
        }

        {
            let mut slot = lock(&self.supervisor);
            if self.destroyed.load(Ordering::SeqCst) {
                return;
            }
            *slot = Some((self.launcher)(
                Arc::clone(&self.session),
                self.bus.clone(),
                self.options.supervisor.clone(),
            ));
        }

        let features = async {
            let available = self.registry.probe_all().await;
            self.readiness.send_replace(Readiness::Ready);
            self.log("init", format!("ready, features: {available:?}"));
        };
        tokio::join!(features, self.sync_terminal_subscription(), self.pull_os_type());
    }

    async fn test_credentials(&self) {
        match self.api.poll_status(CREDENTIAL_TEST_TIMEOUT).await {
            Ok(_) => {
                self.bus.emit(Event::AuthSuccess);
            }
            Err(error) if error.is_unauthorized() => {
                self.log("credentials", "rejected by server");
                self.bus.emit(Event::AuthError { status: 401 });
            }
            Err(error) => {
                self.log("credentials", format!("check failed: {error}"));
                self.bus.emit(Event::ConnectionError {
                    reason: error.to_string(),
                });
            }
        }
    }

    async fn sync_terminal_subscription(&self) {
        let enabled = self.listen_terminal.load(Ordering::SeqCst);
        let client_id = self.session.client_id();
        if let Err(error) = self.api.set_terminal_subscription(&client_id, enabled).await {
            self.log("terminal", format!("subscription failed: {error}"));
        }
    }

    async fn pull_os_type(&self) {
        match self.api.system_stats().await {
            Ok(stats) => *lock(&self.os_type) = Some(stats.system.os),
            Err(error) => self.log("system_stats", format!("failed: {error}")),
        }
    }

    /// Writes a lifecycle line to tracing and to the `log` topic.
    fn log(&self, source: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(source, %message);
        self.bus.emit(Event::Log(LogRecord::new(source, message)));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
