//! Client-side TCP transport.
//!
//! Owns one outbound connection and a FIFO queue of pending requests. A
//! driver task serializes every state change on a single select loop:
//! caller commands, connect results, socket reads, request timeouts, and
//! reconnect timers all arrive as events on one logical timeline, so the
//! queue and the connection state never race.
//!
//! Socket writes go through a per-connection writer task fed over a
//! channel, never inline in the driver loop: a peer that stops reading
//! can park a write indefinitely, and timers, new requests, and shutdown
//! must keep being served while it does. The writer preserves hand-off
//! order, which is what order-based correlation requires.
//!
//! # Policy
//!
//! - Requests are admitted into a FIFO queue and written immediately when
//!   connected; otherwise they wait for the next successful connect, which
//!   replays the whole queue in submission order.
//! - The connection is retried indefinitely after a failure, promptly and
//!   without backoff, until [`TcpClientTransport::shutdown`] is called.
//! - Each request carries its own timeout; firing resolves that request
//!   with [`RpcError::RequestTimedOut`] and touches nothing else.
//! - With `stop_buffering_after` configured, requests admitted after the
//!   connection has been down for that long fail immediately with
//!   [`RpcError::ConnectionUnavailable`] instead of queueing.
//!
//! # Correlation
//!
//! Responses are matched to requests strictly by arrival order: the peer
//! is assumed to reply in the order messages were written on a given
//! connection, so each inbound frame resolves the oldest written,
//! unresolved request. No correlation identifier is inspected. A response
//! that arrives after its request timed out is discarded when the queue is
//! empty - and can otherwise be matched to the next queued request, which
//! is an accepted tradeoff of the order-based protocol.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::codec::{frame, FrameBuffer, JsonCodec};
use crate::error::{Result, RpcError};
use crate::transport::{BoxFuture, Transport};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between reconnect attempts.
const RECONNECT_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on a single connect attempt.
const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Command channel capacity.
const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Socket read buffer size.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Configuration for [`TcpClientTransport`].
#[derive(Debug, Clone)]
pub struct TcpClientConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Stop queueing new requests after this long disconnected.
    /// `None` disables the circuit breaker.
    pub stop_buffering_after: Option<Duration>,
}

impl TcpClientConfig {
    /// Configuration with default timeout and no circuit breaker.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            stop_buffering_after: None,
        }
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable the circuit breaker with the given threshold.
    pub fn stop_buffering_after(mut self, threshold: Duration) -> Self {
        self.stop_buffering_after = Some(threshold);
        self
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Caller-facing handle to the driver task.
///
/// Cheaply cloneable; all clones feed the same connection and queue.
#[derive(Clone)]
pub struct TcpClientTransport {
    tx: mpsc::Sender<Command>,
}

impl TcpClientTransport {
    /// Spawn the driver task and begin connecting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: TcpClientConfig) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        tokio::spawn(Driver::new(config, rx).run());
        Self { tx }
    }

    /// Send one payload and resolve with the peer's reply.
    ///
    /// Resolves exactly once: with the matched response, a timeout, a
    /// circuit-breaker rejection, or a shutdown notice.
    pub async fn request(&self, payload: Value) -> Result<Value> {
        send_request(self.tx.clone(), payload).await
    }

    /// Close the connection, cancel all pending timers and retries, and
    /// resolve once the driver task has stopped.
    pub async fn shutdown(&self) -> Result<()> {
        send_shutdown(self.tx.clone()).await
    }
}

impl Transport for TcpClientTransport {
    fn request(&self, payload: Value) -> BoxFuture<'static, Result<Value>> {
        let tx = self.tx.clone();
        Box::pin(send_request(tx, payload))
    }

    fn shutdown(&self) -> BoxFuture<'static, Result<()>> {
        let tx = self.tx.clone();
        Box::pin(send_shutdown(tx))
    }
}

async fn send_request(tx: mpsc::Sender<Command>, payload: Value) -> Result<Value> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(Command::Request {
        payload,
        reply: reply_tx,
    })
    .await
    .map_err(|_| RpcError::TransportClosed)?;

    reply_rx.await.map_err(|_| RpcError::TransportClosed)?
}

async fn send_shutdown(tx: mpsc::Sender<Command>) -> Result<()> {
    let (done_tx, done_rx) = oneshot::channel();
    if tx.send(Command::Shutdown { done: done_tx }).await.is_err() {
        // Driver already gone; shutdown is idempotent.
        return Ok(());
    }
    let _ = done_rx.await;
    Ok(())
}

/// Commands from transport handles to the driver task.
enum Command {
    Request {
        payload: Value,
        reply: oneshot::Sender<Result<Value>>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// A queued request awaiting its response or timeout.
struct Pending {
    /// Encoded wire bytes, kept so the request can be replayed across
    /// reconnects.
    frame: Bytes,
    reply: oneshot::Sender<Result<Value>>,
    deadline: Instant,
}

/// Connection state.
///
/// `since` tracks the start of the current disconnection period; it is
/// carried through failed connect attempts and cleared only by a
/// successful connect.
enum Link {
    Down {
        since: Instant,
        retry_at: Instant,
    },
    Connecting {
        since: Instant,
        attempt: JoinHandle<std::io::Result<TcpStream>>,
    },
    Up {
        reader: OwnedReadHalf,
        /// Frames queued here are written in order by the writer task.
        /// Dropping the sender ends that task.
        write_tx: mpsc::UnboundedSender<Bytes>,
    },
}

/// Writer task for one connection. Exits when the channel closes or the
/// socket rejects a write; the driver notices the latter through the read
/// side of the same socket.
async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Bytes>) {
    while let Some(frame) = rx.recv().await {
        if let Err(err) = writer.write_all(&frame).await {
            tracing::debug!("write error: {}", err);
            return;
        }
    }
}

/// Link-driven events for the driver select loop.
enum LinkEvent {
    Read(std::io::Result<usize>),
    Connected(std::io::Result<TcpStream>),
    RetryDue,
}

/// Wait for whichever event the current link state can produce.
async fn link_event(link: &mut Link, buf: &mut [u8]) -> LinkEvent {
    match link {
        Link::Up { reader, .. } => LinkEvent::Read(reader.read(buf).await),
        Link::Connecting { attempt, .. } => LinkEvent::Connected(match attempt.await {
            Ok(res) => res,
            Err(join_err) => Err(std::io::Error::other(join_err)),
        }),
        Link::Down { retry_at, .. } => {
            tokio::time::sleep_until(*retry_at).await;
            LinkEvent::RetryDue
        }
    }
}

/// The driver task: sole owner of the connection and the pending queue.
struct Driver {
    config: TcpClientConfig,
    rx: mpsc::Receiver<Command>,
    link: Link,
    /// FIFO of unresolved requests, oldest first. While the link is up,
    /// every queued request has been handed to the writer in order, so
    /// the front of the queue is always the oldest sent-and-unresolved
    /// request.
    queue: VecDeque<Pending>,
    frames: FrameBuffer,
}

impl Driver {
    fn new(config: TcpClientConfig, rx: mpsc::Receiver<Command>) -> Self {
        let now = Instant::now();
        Self {
            config,
            rx,
            link: Link::Down {
                since: now,
                retry_at: now,
            },
            queue: VecDeque::new(),
            frames: FrameBuffer::new(),
        }
    }

    async fn run(mut self) {
        let mut read_buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            // Timeouts are uniform per transport, so deadline order equals
            // queue order and the front holds the earliest deadline.
            let deadline = self.queue.front().map(|p| p.deadline);

            let Driver { rx, link, .. } = &mut self;
            enum Event {
                Cmd(Option<Command>),
                Link(LinkEvent),
                Deadline,
            }

            let event = tokio::select! {
                cmd = rx.recv() => Event::Cmd(cmd),
                ev = link_event(link, &mut read_buf) => Event::Link(ev),
                _ = tokio::time::sleep_until(
                    deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400))
                ), if deadline.is_some() => Event::Deadline,
            };

            match event {
                Event::Cmd(Some(Command::Request { payload, reply })) => {
                    self.admit(payload, reply);
                }
                Event::Cmd(Some(Command::Shutdown { done })) => {
                    self.stop();
                    let _ = done.send(());
                    return;
                }
                Event::Cmd(None) => {
                    // Every handle dropped; nothing left to serve.
                    self.stop();
                    return;
                }
                Event::Link(LinkEvent::Read(Ok(0))) => {
                    tracing::debug!("connection closed by peer");
                    self.on_disconnect();
                }
                Event::Link(LinkEvent::Read(Ok(n))) => {
                    self.on_read(&read_buf[..n]);
                }
                Event::Link(LinkEvent::Read(Err(err))) => {
                    tracing::debug!("read error: {}", err);
                    self.on_disconnect();
                }
                Event::Link(LinkEvent::Connected(Ok(stream))) => {
                    self.on_connected(stream);
                }
                Event::Link(LinkEvent::Connected(Err(err))) => {
                    tracing::debug!("connect to {} failed: {}", self.config.addr(), err);
                    self.on_connect_failed();
                }
                Event::Link(LinkEvent::RetryDue) => {
                    self.start_connect();
                }
                Event::Deadline => {
                    self.expire();
                }
            }
        }
    }

    /// Admit one request: circuit breaker first, then enqueue, then hand
    /// to the writer when connected.
    fn admit(&mut self, payload: Value, reply: oneshot::Sender<Result<Value>>) {
        if let Some(threshold) = self.config.stop_buffering_after {
            if let Link::Down { since, .. } | Link::Connecting { since, .. } = &self.link {
                if since.elapsed() >= threshold {
                    let _ = reply.send(Err(RpcError::ConnectionUnavailable));
                    return;
                }
            }
        }

        let frame = match frame::encode(&payload) {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) => {
                let _ = reply.send(Err(err));
                return;
            }
        };

        self.queue.push_back(Pending {
            frame: frame.clone(),
            reply,
            deadline: Instant::now() + self.config.timeout,
        });

        let write_failed = match &self.link {
            Link::Up { write_tx, .. } => write_tx.send(frame).is_err(),
            _ => false,
        };
        if write_failed {
            tracing::debug!("writer task gone, treating as disconnect");
            self.on_disconnect();
        }
    }

    /// Successful connect: replay the whole queue in submission order.
    fn on_connected(&mut self, stream: TcpStream) {
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();

        let (write_tx, write_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(writer, write_rx));

        self.frames.clear();
        tracing::debug!("connected to {}", self.config.addr());

        for pending in &self.queue {
            if write_tx.send(pending.frame.clone()).is_err() {
                break;
            }
        }

        self.link = Link::Up { reader, write_tx };
    }

    fn on_connect_failed(&mut self) {
        let since = match &self.link {
            Link::Connecting { since, .. } => *since,
            Link::Down { since, .. } => *since,
            Link::Up { .. } => Instant::now(),
        };
        self.link = Link::Down {
            since,
            retry_at: Instant::now() + RECONNECT_INTERVAL,
        };
    }

    /// Connection lost while up: keep the queue, schedule a reconnect.
    fn on_disconnect(&mut self) {
        self.frames.clear();
        self.link = Link::Down {
            since: Instant::now(),
            retry_at: Instant::now() + RECONNECT_INTERVAL,
        };
    }

    fn start_connect(&mut self) {
        let since = match &self.link {
            Link::Down { since, .. } => *since,
            _ => return,
        };

        let addr = self.config.addr();
        let attempt = tokio::spawn(async move {
            match tokio::time::timeout(CONNECT_ATTEMPT_TIMEOUT, TcpStream::connect(&addr)).await {
                Ok(res) => res,
                Err(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect attempt timed out",
                )),
            }
        });

        self.link = Link::Connecting { since, attempt };
    }

    /// Inbound bytes: slice off complete frames and resolve the queue
    /// front for each, oldest first.
    fn on_read(&mut self, data: &[u8]) {
        let payloads = match self.frames.push(data) {
            Ok(payloads) => payloads,
            Err(err) => {
                tracing::warn!("frame error from peer: {}", err);
                self.on_disconnect();
                return;
            }
        };

        for payload in payloads {
            let value: Value = match JsonCodec::decode(&payload) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!("undecodable response frame: {}", err);
                    self.on_disconnect();
                    return;
                }
            };

            match self.queue.pop_front() {
                Some(pending) => {
                    let _ = pending.reply.send(Ok(value));
                }
                None => {
                    tracing::warn!("discarding response with no pending request");
                }
            }
        }
    }

    /// Resolve every request whose timer has elapsed.
    fn expire(&mut self) {
        let now = Instant::now();
        while let Some(front) = self.queue.front() {
            if front.deadline > now {
                break;
            }
            if let Some(pending) = self.queue.pop_front() {
                let _ = pending.reply.send(Err(RpcError::RequestTimedOut));
            }
        }
    }

    /// Terminal shutdown: cancel the connect attempt, close the socket,
    /// and fail every still-pending request.
    fn stop(&mut self) {
        if let Link::Connecting { attempt, .. } = &self.link {
            attempt.abort();
        }
        self.link = Link::Down {
            since: Instant::now(),
            retry_at: Instant::now(),
        };

        for pending in self.queue.drain(..) {
            let _ = pending.reply.send(Err(RpcError::TransportClosed));
        }
    }
}
