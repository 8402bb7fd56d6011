//! Client-side reconnection agent
//!
//! Wraps a [`Transport`] with a send queue and automatic reconnection. Sends
//! while disconnected are queued FIFO and flushed, in order, once a
//! connection is established; new sends observe the state lock and therefore
//! cannot jump the backlog. A failed connection schedules exactly one retry
//! after a fixed backoff; `close()` aborts any pending retry and silences the
//! agent for good.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection closed")]
    Closed,
}

/// An established outbound connection
#[async_trait]
pub trait MessageSink: Send {
    async fn send(&mut self, frame: String) -> Result<(), ClientError>;
    async fn close(&mut self);
}

/// Connection factory for the agent
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn MessageSink>, ClientError>;
}

/// Agent behavior configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Delay before the single retry that follows a failed connection
    pub reconnect_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

struct AgentInner {
    state: LinkState,
    queue: VecDeque<String>,
    sink: Option<Box<dyn MessageSink>>,
    retry: Option<JoinHandle<()>>,
}

/// A send handle that survives connection loss
pub struct ReconnectingClient {
    transport: Arc<dyn Transport>,
    config: AgentConfig,
    inner: Arc<Mutex<AgentInner>>,
}

impl ReconnectingClient {
    pub fn new(transport: Arc<dyn Transport>, config: AgentConfig) -> Self {
        Self {
            transport,
            config,
            inner: Arc::new(Mutex::new(AgentInner {
                state: LinkState::Disconnected,
                queue: VecDeque::new(),
                sink: None,
                retry: None,
            })),
        }
    }

    /// Start connecting if the agent is idle. Safe to call repeatedly.
    pub async fn connect(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == LinkState::Disconnected {
            inner.state = LinkState::Connecting;
            drop(inner);
            self.spawn_connect();
        }
    }

    /// Send a frame, queueing it if no connection is available.
    ///
    /// Never fails from the caller's perspective: frames either go out now or
    /// wait in the FIFO backlog. After `close()` frames are queued silently
    /// and never sent.
    pub async fn send(&self, frame: String) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            LinkState::Connected => {
                let Some(mut sink) = inner.sink.take() else {
                    inner.queue.push_back(frame);
                    return;
                };
                match sink.send(frame.clone()).await {
                    Ok(()) => inner.sink = Some(sink),
                    Err(e) => {
                        warn!(error = %e, "Send failed, scheduling reconnect");
                        inner.queue.push_back(frame);
                        inner.state = LinkState::Connecting;
                        self.schedule_retry(&mut inner);
                    }
                }
            }
            LinkState::Connecting | LinkState::Closed => {
                inner.queue.push_back(frame);
            }
            LinkState::Disconnected => {
                inner.queue.push_back(frame);
                inner.state = LinkState::Connecting;
                drop(inner);
                self.spawn_connect();
            }
        }
    }

    /// Close for good: abort any pending retry, close the live connection,
    /// and suppress all future reconnects.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = LinkState::Closed;
        if let Some(handle) = inner.retry.take() {
            handle.abort();
        }
        if let Some(mut sink) = inner.sink.take() {
            sink.close().await;
        }
        info!("Client closed");
    }

    pub async fn queued_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.state == LinkState::Connected
    }

    fn spawn_connect(&self) {
        let inner = Arc::clone(&self.inner);
        let transport = Arc::clone(&self.transport);
        let delay = self.config.reconnect_delay;
        tokio::spawn(run_connect(inner, transport, delay));
    }

    fn schedule_retry(&self, inner: &mut AgentInner) {
        let handle = spawn_retry(
            Arc::clone(&self.inner),
            Arc::clone(&self.transport),
            self.config.reconnect_delay,
        );
        inner.retry = Some(handle);
    }
}

fn spawn_retry(
    inner: Arc<Mutex<AgentInner>>,
    transport: Arc<dyn Transport>,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        run_connect(inner, transport, delay).await;
    })
}

/// Attempt one connection; on success flush the backlog in order while
/// holding the state lock, on failure schedule a single delayed retry.
fn run_connect(
    inner: Arc<Mutex<AgentInner>>,
    transport: Arc<dyn Transport>,
    delay: Duration,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        match transport.connect().await {
            Ok(mut sink) => {
                let mut guard = inner.lock().await;
                if guard.state == LinkState::Closed {
                    sink.close().await;
                    return;
                }
                while let Some(frame) = guard.queue.pop_front() {
                    if let Err(e) = sink.send(frame.clone()).await {
                        warn!(error = %e, "Backlog flush failed, scheduling reconnect");
                        guard.queue.push_front(frame);
                        guard.state = LinkState::Connecting;
                        let handle = spawn_retry(Arc::clone(&inner), transport, delay);
                        guard.retry = Some(handle);
                        return;
                    }
                }
                debug!("Connection established, backlog flushed");
                guard.sink = Some(sink);
                guard.state = LinkState::Connected;
            }
            Err(e) => {
                let mut guard = inner.lock().await;
                if guard.state == LinkState::Closed {
                    return;
                }
                warn!(error = %e, delay_ms = delay.as_millis() as u64, "Connect failed, retrying");
                guard.state = LinkState::Connecting;
                let handle = spawn_retry(Arc::clone(&inner), transport, delay);
                guard.retry = Some(handle);
            }
        }
    })
}
