//! Protocol module - JSON-RPC envelope types and error codes.
//!
//! A request carries `{ jsonrpc?, id, method, params }`; a response carries
//! `{ jsonrpc?, id, result XOR error }`. The version tag is optional on
//! requests and mirrored onto responses when present. Exactly one of
//! `result` and `error` appears on any response.

mod envelope;

pub use envelope::{ErrorObject, Request, Response};

/// Invalid JSON was received by the server.
pub const PARSE_ERROR: i32 = -32700;
/// The payload is not a valid JSON-RPC request object.
pub const INVALID_REQUEST: i32 = -32600;
/// The requested method is not registered.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameter(s).
pub const INVALID_PARAMS: i32 = -32602;
/// A handler reported a failure.
pub const INTERNAL_ERROR: i32 = -32603;
