//! Handler module - method implementations and their registry.
//!
//! A handler takes the positional params of one request and produces a
//! result value or a failure message. Handlers are plain async functions
//! or closures; the blanket impl below lifts anything with the right
//! shape into the [`Handler`] trait, so registration reads as
//!
//! ```no_run
//! use jsonrpc_wire::handler::MethodRegistry;
//! use serde_json::{json, Value};
//!
//! let registry = MethodRegistry::new()
//!     .register("ping", |_params: Vec<Value>| async { Ok(json!("pong")) });
//! ```

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

use crate::transport::BoxFuture;

mod registry;

pub use registry::MethodRegistry;

/// A handler's failure, surfaced to the caller as an internal error
/// response carrying this message.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Message forwarded to the remote caller.
    pub message: String,
}

impl HandlerError {
    /// Failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// What a handler resolves with.
pub type HandlerResult = std::result::Result<Value, HandlerError>;

/// A registered method implementation.
pub trait Handler: Send + Sync {
    /// Invoke with the request's positional params.
    fn call(&self, params: Vec<Value>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, params: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(params))
    }
}
