//! # jsonrpc-wire
//!
//! JSON-RPC 2.0 client and server over interchangeable transports.
//!
//! The protocol layer, the dispatch core, and the transports are
//! separate: a client or server binds to any [`Transport`] or
//! [`ServerTransport`] implementation, and the transports never look
//! inside payloads.
//!
//! ## Architecture
//!
//! - **TCP**: persistent connections carrying 4-byte big-endian
//!   length-prefixed JSON frames; the client transport reconnects
//!   automatically, queues requests across outages, and correlates
//!   responses to requests by order
//! - **HTTP**: stateless, one POST per request
//!
//! ## Example
//!
//! ```ignore
//! use jsonrpc_wire::handler::MethodRegistry;
//! use jsonrpc_wire::transport::{TcpClientConfig, TcpClientTransport, TcpServerTransport};
//! use jsonrpc_wire::{RpcClient, RpcServer};
//! use serde_json::{json, Value};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = MethodRegistry::new()
//!         .register("ping", |_params: Vec<Value>| async { Ok(json!("pong")) });
//!
//!     let transport = TcpServerTransport::bind(([127, 0, 0, 1], 4000)).await.unwrap();
//!     let server = RpcServer::new(transport, registry);
//!     server.start();
//!
//!     let client = RpcClient::new(TcpClientTransport::new(
//!         TcpClientConfig::new("127.0.0.1", 4000),
//!     ));
//!     let pong = client.call("ping", vec![]).await.unwrap();
//!     assert_eq!(pong, json!("pong"));
//! }
//! ```

pub mod codec;
pub mod digest;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod transport;

mod client;
mod server;

pub use client::{RemoteMethod, RpcClient};
pub use error::RpcError;
pub use server::{RpcServer, ServerCore};
pub use transport::{ServerTransport, Transport};
