//! Server core - transport-independent request dispatch.
//!
//! The core owns the method registry and turns one inbound payload into
//! at most one outbound payload. Transports never interpret payloads;
//! everything protocol-shaped happens here.
//!
//! Dispatch rules, applied to each payload:
//!
//! 1. An array is a batch: each element is dispatched independently and
//!    the replies are collected into an array in the same order.
//! 2. Anything that is not an object with a string `method` earns an
//!    invalid-request error response with a `null` id.
//! 3. A well-formed request resolves through the registry: unknown
//!    methods earn a method-not-found error, handler failures an internal
//!    error carrying the handler's message, and successes a result
//!    response.
//!
//! The `jsonrpc` version tag is mirrored from request to response when
//! the request carried one.

use std::sync::Arc;

use serde_json::Value;

use crate::handler::MethodRegistry;
use crate::protocol::{ErrorObject, Response};
use crate::transport::{Dispatcher, ServerTransport};

/// Transport-independent dispatch engine.
#[derive(Clone)]
pub struct ServerCore {
    registry: Arc<MethodRegistry>,
}

impl ServerCore {
    /// Core serving the given registry.
    pub fn new(registry: MethodRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Dispatch one payload, resolving with the response to send back.
    pub async fn dispatch(&self, payload: Value) -> Option<Value> {
        let response = match payload {
            Value::Array(batch) => {
                let mut replies = Vec::with_capacity(batch.len());
                for entry in batch {
                    let reply = self.dispatch_single(entry).await;
                    replies.push(serde_json::to_value(reply).unwrap_or(Value::Null));
                }
                return Some(Value::Array(replies));
            }
            single => self.dispatch_single(single).await,
        };

        Some(serde_json::to_value(response).unwrap_or(Value::Null))
    }

    /// Dispatch one non-batch payload.
    async fn dispatch_single(&self, payload: Value) -> Response {
        let obj = match payload.as_object() {
            Some(obj) => obj,
            None => return Response::failure(Value::Null, ErrorObject::invalid_request()),
        };

        let method = match obj.get("method").and_then(Value::as_str) {
            Some(method) => method,
            None => return Response::failure(Value::Null, ErrorObject::invalid_request()),
        };

        let id = obj.get("id").cloned().unwrap_or(Value::Null);

        let jsonrpc = obj
            .get("jsonrpc")
            .and_then(Value::as_str)
            .map(str::to_string);

        // Positional params: arrays pass through, a bare value is treated
        // as a single argument, absence as no arguments.
        let params = match obj.get("params") {
            Some(Value::Array(params)) => params.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        };

        let handler = match self.registry.get(method) {
            Some(handler) => handler,
            None => {
                tracing::debug!("method not found: {}", method);
                return Response::failure(id, ErrorObject::method_not_found())
                    .with_version(jsonrpc);
            }
        };

        match handler.call(params).await {
            Ok(result) => Response::success(id, result).with_version(jsonrpc),
            Err(err) => {
                tracing::debug!("handler '{}' failed: {}", method, err);
                Response::failure(id, ErrorObject::internal(err.message)).with_version(jsonrpc)
            }
        }
    }
}

/// An RPC server: a [`ServerCore`] bound to one listening transport.
pub struct RpcServer<T: ServerTransport> {
    transport: T,
    core: ServerCore,
}

impl<T: ServerTransport> RpcServer<T> {
    /// Server exposing the registry's methods over the given transport.
    pub fn new(transport: T, registry: MethodRegistry) -> Self {
        Self {
            transport,
            core: ServerCore::new(registry),
        }
    }

    /// Begin serving.
    pub fn start(&self) {
        let core = self.core.clone();
        let dispatch: Dispatcher = Arc::new(move |payload| {
            let core = core.clone();
            Box::pin(async move { core.dispatch(payload).await })
        });

        self.transport.start(dispatch);
    }

    /// Stop accepting traffic and release the transport.
    pub async fn shutdown(&self) -> crate::error::Result<()> {
        self.transport.shutdown().await
    }

    /// The transport's bound address, when it has one.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.transport.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{INTERNAL_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND};
    use serde_json::json;

    fn core() -> ServerCore {
        let registry = MethodRegistry::new()
            .register("echo", |params: Vec<Value>| async move {
                Ok(Value::Array(params))
            })
            .register("fail", |_: Vec<Value>| async {
                Err(crate::handler::HandlerError::new("it broke"))
            });
        ServerCore::new(registry)
    }

    #[tokio::test]
    async fn test_success_dispatch() {
        let reply = core()
            .dispatch(json!({"id": 1, "method": "echo", "params": ["hi"]}))
            .await
            .unwrap();

        assert_eq!(reply["id"], json!(1));
        assert_eq!(reply["result"], json!(["hi"]));
        assert!(reply.get("error").is_none());
        assert!(reply.get("jsonrpc").is_none());
    }

    #[tokio::test]
    async fn test_method_not_found() {
        let reply = core()
            .dispatch(json!({"id": 7, "method": "nope"}))
            .await
            .unwrap();

        assert_eq!(reply["id"], json!(7));
        assert_eq!(reply["error"]["code"], json!(METHOD_NOT_FOUND));
        assert_eq!(
            reply["error"]["message"],
            json!("Requested method does not exist.")
        );
    }

    #[tokio::test]
    async fn test_handler_failure_is_internal_error() {
        let reply = core()
            .dispatch(json!({"id": 2, "method": "fail"}))
            .await
            .unwrap();

        assert_eq!(reply["error"]["code"], json!(INTERNAL_ERROR));
        assert_eq!(reply["error"]["message"], json!("it broke"));
        assert!(reply.get("result").is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload_gets_null_id() {
        let reply = core().dispatch(json!("not an object")).await.unwrap();

        assert_eq!(reply["id"], Value::Null);
        assert_eq!(reply["error"]["code"], json!(INVALID_REQUEST));
        assert_eq!(
            reply["error"]["message"],
            json!("Did not receive valid JSON-RPC data.")
        );
    }

    #[tokio::test]
    async fn test_object_without_method_is_invalid() {
        let reply = core().dispatch(json!({"id": 9, "hello": "world"})).await.unwrap();

        assert_eq!(reply["id"], Value::Null);
        assert_eq!(reply["error"]["code"], json!(INVALID_REQUEST));
    }

    #[tokio::test]
    async fn test_version_tag_is_mirrored() {
        let reply = core()
            .dispatch(json!({"jsonrpc": "2.0", "id": 1, "method": "echo", "params": []}))
            .await
            .unwrap();
        assert_eq!(reply["jsonrpc"], json!("2.0"));

        let reply = core()
            .dispatch(json!({"jsonrpc": "2.0", "id": 2, "method": "nope"}))
            .await
            .unwrap();
        assert_eq!(reply["jsonrpc"], json!("2.0"));
    }

    #[tokio::test]
    async fn test_bare_params_value_becomes_single_argument() {
        let reply = core()
            .dispatch(json!({"id": 1, "method": "echo", "params": "solo"}))
            .await
            .unwrap();

        assert_eq!(reply["result"], json!(["solo"]));
    }

    #[tokio::test]
    async fn test_missing_params_means_no_arguments() {
        let reply = core()
            .dispatch(json!({"id": 1, "method": "echo"}))
            .await
            .unwrap();

        assert_eq!(reply["result"], json!([]));
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let reply = core()
            .dispatch(json!([
                {"id": 1, "method": "echo", "params": ["a"]},
                {"id": 2, "method": "nope"},
                {"id": 3, "method": "echo", "params": ["b"]},
            ]))
            .await
            .unwrap();

        let batch = reply.as_array().unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0]["result"], json!(["a"]));
        assert_eq!(batch[1]["error"]["code"], json!(METHOD_NOT_FOUND));
        assert_eq!(batch[2]["result"], json!(["b"]));
    }

    #[tokio::test]
    async fn test_empty_batch_yields_empty_array() {
        let reply = core().dispatch(json!([])).await.unwrap();
        assert_eq!(reply, json!([]));
    }
}
