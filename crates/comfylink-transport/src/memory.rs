//! In-process transport: every dial creates a [`MemoryLink`] the caller
//! can use to play the server side.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::{ConnectRequest, Connection, ConnectionId, Connector, RawFrame, TransportError};

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1);

/// How the next dial should behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dial {
    /// The connection opens immediately.
    Open,
    /// The dial fails with [`TransportError::ConnectFailed`].
    Refuse,
    /// The dial never completes.
    Hang,
}

enum Feed {
    Frame(RawFrame),
    Close,
    Error(String),
}

/// A [`Connector`] backed by channels instead of sockets.
///
/// Dials follow the queued [`Dial`] plan and default to [`Dial::Open`] once
/// it runs out.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    plan: VecDeque<Dial>,
    links: Vec<MemoryLink>,
}

impl MemoryConnector {
    /// Creates a connector whose dials all open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome of a future dial.
    pub fn plan(&self, dial: Dial) {
        self.state().plan.push_back(dial);
    }

    /// Every dial made so far, oldest first.
    pub fn links(&self) -> Vec<MemoryLink> {
        self.state().links.clone()
    }

    /// The most recent dial, if any.
    pub fn last_link(&self) -> Option<MemoryLink> {
        self.state().links.last().cloned()
    }

    /// Number of dials made so far.
    pub fn dial_count(&self) -> usize {
        self.state().links.len()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    fn connect(
        &self,
        request: &ConnectRequest,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let dial = {
            let mut state = self.state();
            state.links.push(MemoryLink {
                request: request.clone(),
                feed: tx,
                closed: Arc::clone(&closed),
            });
            state.plan.pop_front().unwrap_or(Dial::Open)
        };
        let id = ConnectionId::new(NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed));

        async move {
            match dial {
                Dial::Open => Ok(MemoryConnection {
                    id,
                    feed: tokio::sync::Mutex::new(rx),
                    closed,
                }),
                Dial::Refuse => Err(TransportError::ConnectFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "memory dial refused",
                ))),
                Dial::Hang => std::future::pending().await,
            }
        }
    }
}

/// The server end of one dial.
#[derive(Clone)]
pub struct MemoryLink {
    request: ConnectRequest,
    feed: mpsc::UnboundedSender<Feed>,
    closed: Arc<AtomicBool>,
}

impl MemoryLink {
    /// The request the client dialled with.
    pub fn request(&self) -> &ConnectRequest {
        &self.request
    }

    /// Delivers a text frame. Returns `false` if the client side is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.feed.send(Feed::Frame(RawFrame::Text(text.into()))).is_ok()
    }

    /// Delivers a binary frame. Returns `false` if the client side is gone.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> bool {
        self.feed.send(Feed::Frame(RawFrame::Binary(data.into()))).is_ok()
    }

    /// Closes the connection cleanly from the server side.
    pub fn hang_up(&self) {
        let _ = self.feed.send(Feed::Close);
    }

    /// Breaks the connection with a receive error.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.feed.send(Feed::Error(reason.into()));
    }

    /// Whether the client called [`Connection::close`] on this link.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// The client end of one dial.
pub struct MemoryConnection {
    id: ConnectionId,
    feed: tokio::sync::Mutex<mpsc::UnboundedReceiver<Feed>>,
    closed: Arc<AtomicBool>,
}

impl Connection for MemoryConnection {
    async fn recv(&self) -> Result<Option<RawFrame>, TransportError> {
        match self.feed.lock().await.recv().await {
            Some(Feed::Frame(frame)) => Ok(Some(frame)),
            Some(Feed::Close) | None => Ok(None),
            Some(Feed::Error(reason)) => Err(TransportError::ReceiveFailed(
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, reason),
            )),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dial_follows_plan_then_defaults_to_open() {
        let connector = MemoryConnector::new();
        connector.plan(Dial::Refuse);
        let req = ConnectRequest::new("ws://memory/ws?clientId=a");

        assert!(connector.connect(&req).await.is_err());
        assert!(connector.connect(&req).await.is_ok());
        assert_eq!(connector.dial_count(), 2);
    }

    #[tokio::test]
    async fn test_link_feeds_frames_and_close() {
        let connector = MemoryConnector::new();
        let conn = connector
            .connect(&ConnectRequest::new("ws://memory/ws"))
            .await
            .unwrap();
        let link = connector.last_link().unwrap();

        link.send_text("{}");
        link.send_binary(vec![1, 2]);
        link.hang_up();

        assert_eq!(conn.recv().await.unwrap(), Some(RawFrame::Text("{}".into())));
        assert_eq!(conn.recv().await.unwrap(), Some(RawFrame::Binary(vec![1, 2])));
        assert_eq!(conn.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_close_is_visible_on_link() {
        let connector = MemoryConnector::new();
        let conn = connector
            .connect(&ConnectRequest::new("ws://memory/ws"))
            .await
            .unwrap();
        let link = connector.last_link().unwrap();

        assert!(!link.is_closed());
        conn.close().await.unwrap();
        assert!(link.is_closed());
    }
}
