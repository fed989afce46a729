//! Client core - request envelopes over any transport.
//!
//! The client assigns monotonically increasing numeric ids, wraps method
//! calls in request envelopes, and unwraps response envelopes into plain
//! results or [`RpcError::Remote`] failures. Everything about delivery -
//! connection state, retries, timeouts - belongs to the transport
//! underneath.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::{Result, RpcError};
use crate::protocol::{Request, Response};
use crate::transport::Transport;

/// An RPC client bound to one transport.
///
/// Cheap to clone; clones share the transport and the id counter.
pub struct RpcClient<T: Transport> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    transport: T,
    next_id: AtomicU64,
}

impl<T: Transport> RpcClient<T> {
    /// Client sending through the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Call a remote method with positional params.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(json!(id), method, params);
        let payload = serde_json::to_value(&request).map_err(RpcError::Encode)?;

        let reply = self.inner.transport.request(payload).await?;
        unwrap_response(reply)
    }

    /// Bind a method name to a reusable callable.
    pub fn register(&self, method: impl Into<String>) -> RemoteMethod<T> {
        RemoteMethod {
            client: self.clone(),
            method: method.into(),
        }
    }

    /// Shut down the underlying transport.
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.transport.shutdown().await
    }
}

impl<T: Transport> Clone for RpcClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// A remote method bound to a client, callable like a local function.
pub struct RemoteMethod<T: Transport> {
    client: RpcClient<T>,
    method: String,
}

impl<T: Transport> RemoteMethod<T> {
    /// Invoke the bound method.
    pub async fn invoke(&self, params: Vec<Value>) -> Result<Value> {
        self.client.call(&self.method, params).await
    }

    /// The bound method name.
    pub fn name(&self) -> &str {
        &self.method
    }
}

impl<T: Transport> Clone for RemoteMethod<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            method: self.method.clone(),
        }
    }
}

/// Turn a response envelope into the caller's result.
///
/// An `error` member wins over `result`; a response with neither resolves
/// to `null`.
fn unwrap_response(reply: Value) -> Result<Value> {
    let response: Response = serde_json::from_value(reply).map_err(RpcError::Decode)?;

    if let Some(error) = response.error {
        return Err(RpcError::Remote {
            code: error.code,
            message: error.message,
        });
    }

    Ok(response.result.unwrap_or(Value::Null))
}
