//! Codec module - wire framing and payload serialization.
//!
//! The wire format is a 4-byte big-endian unsigned length prefix followed
//! by that many bytes of UTF-8 JSON:
//!
//! ```text
//! ┌──────────────┬────────────────┐
//! │ Length       │ Payload        │
//! │ 4 bytes      │ L bytes        │
//! │ uint32 BE    │ UTF-8 JSON     │
//! └──────────────┴────────────────┘
//! ```
//!
//! [`frame::encode`] builds outbound frames; [`FrameBuffer`] accumulates
//! inbound bytes and slices off complete payloads regardless of how the
//! stream fragments them; [`JsonCodec`] turns payload bytes into values.
//!
//! # Example
//!
//! ```
//! use jsonrpc_wire::codec::{frame, FrameBuffer, JsonCodec};
//! use serde_json::{json, Value};
//!
//! let bytes = frame::encode(&json!({"id": 1})).unwrap();
//!
//! let mut buffer = FrameBuffer::new();
//! let payloads = buffer.push(&bytes).unwrap();
//! assert_eq!(payloads.len(), 1);
//!
//! let value: Value = JsonCodec::decode(&payloads[0]).unwrap();
//! assert_eq!(value, json!({"id": 1}));
//! ```

pub mod frame;
mod json;

pub use frame::{FrameBuffer, DEFAULT_MAX_FRAME_BYTES, LEN_PREFIX_SIZE};
pub use json::JsonCodec;
