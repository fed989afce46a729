//! Server-side TCP transport.
//!
//! Accepts connections and runs one read loop per connection. Inbound
//! bytes go through a [`FrameBuffer`], and every complete frame is handed
//! to the dispatcher. Dispatch is pipelined: handlers for later frames may
//! run while earlier ones are still in flight, but responses are written
//! back in frame arrival order, which is what order-correlating clients
//! depend on.
//!
//! A frame whose payload is not decodable JSON is dispatched as `null`
//! instead of being dropped, so the dispatcher still owes the peer an
//! invalid-request response for it.

use std::net::SocketAddr;
use std::sync::Mutex;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

use crate::codec::{frame, FrameBuffer, JsonCodec};
use crate::error::Result;
use crate::transport::{BoxFuture, Dispatcher, ServerTransport};

/// Socket read buffer size.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Per-connection bound on dispatched-but-unwritten responses.
const RESPONSE_PIPELINE_DEPTH: usize = 64;

/// TCP listener transport.
pub struct TcpServerTransport {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

impl TcpServerTransport {
    /// Bind the listen socket. Port 0 picks a free port; the resolved
    /// address is available via [`ServerTransport::local_addr`].
    pub async fn bind(addr: impl Into<SocketAddr>) -> Result<Self> {
        let listener = TcpListener::bind(addr.into()).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            stop: Mutex::new(None),
        })
    }
}

impl ServerTransport for TcpServerTransport {
    fn start(&self, dispatch: Dispatcher) {
        let listener = match self.listener.lock().expect("listener lock").take() {
            Some(listener) => listener,
            None => {
                tracing::warn!("tcp server already started");
                return;
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        *self.stop.lock().expect("stop lock") = Some(stop_tx);

        tracing::info!("tcp server listening on {}", self.local_addr);
        tokio::spawn(accept_loop(listener, dispatch, stop_rx));
    }

    fn shutdown(&self) -> BoxFuture<'static, Result<()>> {
        // Dropping the sender is enough either way; send makes intent
        // explicit when the accept loop is still running.
        if let Some(stop) = self.stop.lock().expect("stop lock").take() {
            let _ = stop.send(());
        }
        self.listener.lock().expect("listener lock").take();

        Box::pin(async { Ok(()) })
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }
}

async fn accept_loop(listener: TcpListener, dispatch: Dispatcher, mut stop: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!("accepted connection from {}", peer);
                    tokio::spawn(serve_connection(stream, dispatch.clone()));
                }
                Err(err) => {
                    tracing::warn!("accept error: {}", err);
                }
            },
            _ = &mut stop => {
                tracing::debug!("tcp server accept loop stopping");
                return;
            }
        }
    }
}

/// Read loop for one connection.
///
/// Each complete frame claims a slot in the response pipeline before its
/// handler is spawned, so the writer task emits responses in arrival
/// order no matter how long individual handlers take.
async fn serve_connection(stream: TcpStream, dispatch: Dispatcher) {
    let _ = stream.set_nodelay(true);
    let (mut reader, writer) = stream.into_split();

    let (order_tx, order_rx) =
        mpsc::channel::<oneshot::Receiver<Option<Value>>>(RESPONSE_PIPELINE_DEPTH);
    let writer_task = tokio::spawn(write_responses(writer, order_rx));

    let mut frames = FrameBuffer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                tracing::debug!("connection read error: {}", err);
                break;
            }
        };

        let payloads = match frames.push(&buf[..n]) {
            Ok(payloads) => payloads,
            Err(err) => {
                tracing::warn!("dropping connection on frame error: {}", err);
                break;
            }
        };

        for payload in payloads {
            // Undecodable payloads become null so the dispatcher can
            // answer with an invalid-request error.
            let value = JsonCodec::decode(&payload).unwrap_or(Value::Null);

            let (slot_tx, slot_rx) = oneshot::channel();
            if order_tx.send(slot_rx).await.is_err() {
                // Writer task gone, peer is unreachable.
                return;
            }

            let dispatch = dispatch.clone();
            tokio::spawn(async move {
                let _ = slot_tx.send(dispatch(value).await);
            });
        }
    }

    drop(order_tx);
    let _ = writer_task.await;
}

async fn write_responses(
    mut writer: OwnedWriteHalf,
    mut slots: mpsc::Receiver<oneshot::Receiver<Option<Value>>>,
) {
    while let Some(slot) = slots.recv().await {
        let response = match slot.await {
            Ok(Some(response)) => response,
            // Dispatcher owed nothing, or the handler task died.
            Ok(None) | Err(_) => continue,
        };

        let bytes = match frame::encode(&response) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!("failed to encode response frame: {}", err);
                continue;
            }
        };

        if let Err(err) = writer.write_all(&bytes).await {
            tracing::debug!("connection write error: {}", err);
            return;
        }
    }
}
