//! Supervisor actor: an isolated Tokio task that owns the realtime channel.
//!
//! The actor owns the live transport, the heartbeat interval and the
//! reconnect deadline. Each transport is driven by its own reader task
//! which reports back over a channel, tagged with the generation it was
//! dialled under; reports from a discarded generation are ignored, so a
//! stale transport can never disturb the current one.
//!
//! Frames are routed inside the actor's turn, so bus handlers run on this
//! task in arrival order and a slow handler delays the next frame and the
//! heartbeat.

use std::future;
use std::pin::Pin;
use std::sync::Arc;

use comfylink_events::{ClientBus, Event};
use comfylink_session::Session;
use comfylink_transport::{Connection, Connector, RawFrame};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior, Sleep};

use crate::{ActivityClock, ConnectionState, FrameRouter, SupervisorConfig, SupervisorError};

/// A snapshot of the supervisor's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorStatus {
    pub state: ConnectionState,
    /// Reconnect attempts in the current episode. Zero while open.
    pub attempt: u32,
}

enum Command {
    Shutdown,
}

/// Handle to a running supervisor actor.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) also
/// stops the actor, at its next turn.
#[derive(Debug)]
pub struct ConnectionSupervisor {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SupervisorStatus>,
    clock: ActivityClock,
    task: JoinHandle<()>,
}

impl ConnectionSupervisor {
    /// Spawns the actor, which immediately dials its first transport.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<C: Connector>(
        connector: Arc<C>,
        session: Arc<Session>,
        bus: ClientBus,
        config: SupervisorConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let initial = SupervisorStatus {
            state: ConnectionState::Probing,
            attempt: 0,
        };
        let (status_tx, status_rx) = watch::channel(initial);
        let clock = ActivityClock::new();

        let actor = SupervisorActor {
            connector,
            router: FrameRouter::new(Arc::clone(&session), bus.clone(), clock.clone()),
            session,
            bus,
            clock: clock.clone(),
            config: config.validated(),
            state: ConnectionState::Probing,
            attempt: 0,
            generation: 0,
            link: None,
            reconnect_check: None,
            commands: cmd_rx,
            events_tx: event_tx,
            events: event_rx,
            status: status_tx,
        };
        let task = tokio::spawn(actor.run());

        Self {
            commands: cmd_tx,
            status: status_rx,
            clock,
            task,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.status.borrow().attempt
    }

    pub fn status(&self) -> SupervisorStatus {
        *self.status.borrow()
    }

    /// A receiver that observes every status change.
    pub fn watch(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.clone()
    }

    pub fn last_activity(&self) -> Instant {
        self.clock.last()
    }

    /// Stops the actor and waits for it to finish. Terminal.
    ///
    /// # Errors
    /// [`SupervisorError::Stopped`] if the actor had already exited.
    pub async fn shutdown(self) -> Result<(), SupervisorError> {
        self.commands
            .send(Command::Shutdown)
            .map_err(|_| SupervisorError::Stopped)?;
        self.task.await.map_err(|_| SupervisorError::Stopped)
    }
}

/// What a reader task reports about its transport.
enum LinkReport<T> {
    Opened(Arc<T>),
    Frame(RawFrame),
    Closed,
    Failed(String),
}

struct LinkEvent<T> {
    generation: u64,
    report: LinkReport<T>,
}

/// The transport currently owned by the actor.
struct Link<T> {
    generation: u64,
    /// Dialled as part of a reconnect episode.
    reconnect: bool,
    reader: JoinHandle<()>,
    connection: Option<Arc<T>>,
}

/// One turn of the actor loop.
enum Turn<T> {
    Command(Option<Command>),
    Link(LinkEvent<T>),
    Heartbeat,
    ReconnectCheck,
}

/// The internal supervisor state. Runs inside a Tokio task.
struct SupervisorActor<C: Connector> {
    connector: Arc<C>,
    session: Arc<Session>,
    router: FrameRouter,
    bus: ClientBus,
    clock: ActivityClock,
    config: SupervisorConfig,
    state: ConnectionState,
    attempt: u32,
    generation: u64,
    link: Option<Link<C::Connection>>,
    reconnect_check: Option<Pin<Box<Sleep>>>,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<LinkEvent<C::Connection>>,
    events: mpsc::UnboundedReceiver<LinkEvent<C::Connection>>,
    status: watch::Sender<SupervisorStatus>,
}

impl<C: Connector> SupervisorActor<C> {
    async fn run(mut self) {
        tracing::info!(client_id = %self.session.client_id(), "supervisor started");
        self.open_link(false);

        let period = self.config.heartbeat_period();
        let mut heartbeat = time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let turn = tokio::select! {
                cmd = self.commands.recv() => Turn::Command(cmd),
                Some(event) = self.events.recv() => Turn::Link(event),
                _ = heartbeat.tick() => Turn::Heartbeat,
                () = deadline(&mut self.reconnect_check) => Turn::ReconnectCheck,
            };

            match turn {
                Turn::Command(Some(Command::Shutdown)) | Turn::Command(None) => {
                    self.shutdown();
                    break;
                }
                Turn::Link(event) => self.on_link_event(event),
                Turn::Heartbeat => self.on_heartbeat(),
                Turn::ReconnectCheck => self.on_reconnect_check(),
            }
        }

        tracing::info!("supervisor stopped");
    }

    fn on_link_event(&mut self, event: LinkEvent<C::Connection>) {
        let current = self
            .link
            .as_mut()
            .filter(|link| link.generation == event.generation);

        let Some(link) = current else {
            if let LinkReport::Opened(connection) = event.report {
                tracing::debug!(generation = event.generation, "closing stale transport");
                close_in_background(connection);
            }
            return;
        };

        match event.report {
            LinkReport::Opened(connection) => {
                link.connection = Some(connection);
                let reconnect = link.reconnect;
                self.on_open(reconnect);
            }
            // Handlers run inline; see the module docs.
            LinkReport::Frame(raw) => self.router.route(&raw),
            LinkReport::Closed => self.on_link_down("closed by server"),
            LinkReport::Failed(reason) => self.on_link_down(&reason),
        }
    }

    fn on_open(&mut self, reconnect: bool) {
        self.clock.touch();
        self.attempt = 0;
        self.reconnect_check = None;
        self.set_state(ConnectionState::Open);
        tracing::info!(reconnect, client_id = %self.session.client_id(), "realtime channel open");
        if reconnect {
            self.bus.emit(Event::Reconnected);
        } else {
            self.bus.emit(Event::Connected);
        }
    }

    fn on_link_down(&mut self, reason: &str) {
        if self.state.can_begin_episode() {
            self.begin_episode(reason);
        } else {
            tracing::debug!(state = %self.state, reason, "transport down, left to the reconnect check");
        }
    }

    fn on_heartbeat(&mut self) {
        if !self.state.can_begin_episode() {
            return;
        }
        let idle = self.clock.idle_for();
        if idle > self.config.idle_timeout {
            tracing::warn!(?idle, timeout = ?self.config.idle_timeout, "realtime channel idle");
            self.begin_episode("idle timeout");
        }
    }

    fn on_reconnect_check(&mut self) {
        self.reconnect_check = None;
        if self.state == ConnectionState::Reconnecting {
            tracing::debug!(attempt = self.attempt, "reconnect attempt did not open, retrying");
            self.reconnect_step();
        }
    }

    /// Starts a reconnect episode. The state field is the guard: a second
    /// trigger while reconnecting is a no-op.
    fn begin_episode(&mut self, reason: &str) {
        if !self.state.can_begin_episode() {
            return;
        }
        tracing::info!(reason, "connection lost, reconnecting");
        self.set_state(ConnectionState::Reconnecting);
        self.bus.emit(Event::Disconnected);
        self.bus.emit(Event::Reconnecting);
        self.reconnect_step();
    }

    fn reconnect_step(&mut self) {
        self.discard_link();
        self.attempt += 1;
        self.publish_status();
        self.open_link(true);

        let delay = self.config.backoff(self.attempt);
        tracing::debug!(attempt = self.attempt, ?delay, "reconnect attempt dialled");
        self.reconnect_check = Some(Box::pin(time::sleep(delay)));
    }

    /// Dials a new transport unless one is already live.
    fn open_link(&mut self, reconnect: bool) {
        if self.link.is_some() {
            tracing::debug!("transport already exists, not dialling");
            return;
        }
        self.generation += 1;
        let generation = self.generation;
        let request = self.session.connect_request();
        tracing::debug!(generation, url = %request.url, reconnect, "dialling");

        let connector = Arc::clone(&self.connector);
        let events = self.events_tx.clone();
        let reader = tokio::spawn(async move {
            let send = |report| events.send(LinkEvent { generation, report }).is_ok();

            let connection = match connector.connect(&request).await {
                Ok(connection) => Arc::new(connection),
                Err(error) => {
                    send(LinkReport::Failed(error.to_string()));
                    return;
                }
            };
            if !send(LinkReport::Opened(Arc::clone(&connection))) {
                return;
            }
            loop {
                let delivered = match connection.recv().await {
                    Ok(Some(frame)) => send(LinkReport::Frame(frame)),
                    Ok(None) => {
                        send(LinkReport::Closed);
                        break;
                    }
                    Err(error) => {
                        send(LinkReport::Failed(error.to_string()));
                        break;
                    }
                };
                if !delivered {
                    break;
                }
            }
        });

        self.link = Some(Link {
            generation,
            reconnect,
            reader,
            connection: None,
        });
    }

    /// Drops the current transport: its reader stops and the connection
    /// is closed in the background.
    fn discard_link(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        link.reader.abort();
        if let Some(connection) = link.connection {
            close_in_background(connection);
        }
    }

    fn shutdown(&mut self) {
        self.reconnect_check = None;
        self.discard_link();
        self.set_state(ConnectionState::Closed);
        tracing::info!("supervisor shutting down");
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.publish_status();
    }

    fn publish_status(&self) {
        self.status.send_replace(SupervisorStatus {
            state: self.state,
            attempt: self.attempt,
        });
    }
}

/// Resolves when the armed deadline fires; pends forever when unarmed.
async fn deadline(check: &mut Option<Pin<Box<Sleep>>>) {
    match check {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}

fn close_in_background<T: Connection>(connection: Arc<T>) {
    tokio::spawn(async move {
        if let Err(error) = connection.close().await {
            tracing::debug!(id = %connection.id(), %error, "error closing transport");
        }
    });
}
