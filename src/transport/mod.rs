//! Transport module - the interchangeable message channels.
//!
//! Client side, a [`Transport`] carries one payload to the peer and
//! resolves with the reply; the TCP variant owns a persistent,
//! auto-reconnecting connection while the HTTP variant is stateless.
//! Server side, a [`ServerTransport`] accepts inbound traffic and feeds
//! every decoded payload through a [`Dispatcher`] supplied by the server
//! core, writing back whatever response the core produces.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;

mod http_client;
mod http_server;
mod tcp_client;
mod tcp_server;

pub use http_client::HttpClientTransport;
pub use http_server::HttpServerTransport;
pub use tcp_client::{TcpClientConfig, TcpClientTransport, DEFAULT_REQUEST_TIMEOUT};
pub use tcp_server::TcpServerTransport;

/// Boxed future, used where trait objects need to return async work.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Client-side transport contract.
///
/// `request` resolves exactly once per call - with the peer's reply, a
/// timeout, or a rejection - and never blocks the caller. `shutdown` is
/// terminal: it stops all retry activity and releases the connection.
pub trait Transport: Send + Sync + 'static {
    /// Send one payload and resolve with the peer's reply.
    fn request(&self, payload: Value) -> BoxFuture<'static, Result<Value>>;

    /// Close the transport and stop all background activity.
    fn shutdown(&self) -> BoxFuture<'static, Result<()>>;
}

/// Dispatch callback handed to a server transport by the server core.
///
/// Takes one decoded payload; resolves with the response to write back,
/// or `None` when no response is owed.
pub type Dispatcher = Arc<dyn Fn(Value) -> BoxFuture<'static, Option<Value>> + Send + Sync>;

/// Server-side transport contract.
pub trait ServerTransport: Send + Sync + 'static {
    /// Begin accepting inbound traffic, routing every decoded payload
    /// through `dispatch`.
    fn start(&self, dispatch: Dispatcher);

    /// Stop accepting new connections and release the listener.
    fn shutdown(&self) -> BoxFuture<'static, Result<()>>;

    /// The bound listen address.
    fn local_addr(&self) -> Option<SocketAddr>;
}
